use crate::detection::domain::detector::{Detection, Detector};
use crate::shared::frame::Frame;

/// Decorator that runs the inner detector every `skip_interval` frames,
/// reusing the last detection set verbatim in between (spec §4.5 step 1).
///
/// Performance-mode warning: callers should log at startup when
/// `skip_interval > 1`, since the tracker then receives stale detections on
/// skipped frames — legal, but worth surfacing (spec §4.5).
pub struct SkipFrameDetector {
    inner: Box<dyn Detector>,
    skip_interval: usize,
    frame_count: usize,
    last_detections: Vec<Detection>,
}

impl SkipFrameDetector {
    pub fn new(inner: Box<dyn Detector>, skip_interval: usize) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            inner,
            skip_interval,
            frame_count: 0,
            last_detections: Vec::new(),
        })
    }
}

impl Detector for SkipFrameDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        if self.frame_count % self.skip_interval == 0 {
            self.last_detections = self.inner.infer(frame)?;
        }
        self.frame_count += 1;
        Ok(self.last_detections.clone())
    }
}
