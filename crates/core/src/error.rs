use thiserror::Error;

/// Error taxonomy from the engine's design (config / init / transient /
/// EOF / cancellation). Config and most Initialization errors are fatal at
/// startup; Transient and RTSP-initialization errors are logged and the
/// pipeline continues or degrades.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("rtsp sink unavailable, re-broadcast disabled: {0}")]
    RtspDegraded(String),

    #[error("transient I/O failure: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("frame source exhausted")]
    Eof,

    #[error("shutdown requested: {0}")]
    Cancelled(String),
}

impl EngineError {
    pub fn transient<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EngineError::Transient(Box::new(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
