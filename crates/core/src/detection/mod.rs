//! Object detection (spec §4.5 step 1), grounded in
//! `original_source/yoi/detection/detector.py`.
pub mod domain;
pub mod infrastructure;

pub use domain::detector::{Detection, Detector};
pub use infrastructure::skip_frame_detector::SkipFrameDetector;
