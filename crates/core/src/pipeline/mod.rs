//! Orchestration layer: the per-pipeline Engine loop and the multi-pipeline
//! launcher (spec §4.5, §5).
pub mod engine;
pub mod launcher;
pub mod pipeline_logger;

pub use engine::Engine;
pub use launcher::{run_all, PipelineRunner};
pub use pipeline_logger::{NullPipelineLogger, PipelineLogger, StdoutPipelineLogger};
