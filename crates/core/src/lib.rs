//! Real-time video analytics engine: detection, persistent multi-identity
//! tracking with appearance re-ID, and three zone-based feature state
//! machines (line crossing, region crowd occupancy, dwell time), producing
//! annotated video, evidence artifacts, and optional RTSP re-broadcast.
pub mod annotate;
pub mod config;
pub mod detection;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod reid;
pub mod shared;
pub mod sink;
pub mod stream;
pub mod tracking;
pub mod video;

pub use config::PipelineConfig;
pub use error::{EngineError, EngineResult};
pub use pipeline::Engine;
