use crate::shared::frame::Frame;

/// A single per-frame detection, pixel-space and immutable once produced
/// (spec §3). `centroid` is the bbox center; feature-level reference points
/// (head/bottom/mid_centre) are derived from `bbox` downstream, not stored
/// here.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f64,
    /// Pixel-space axis-aligned `(x1, y1, x2, y2)`.
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn new(class_id: u32, class_name: impl Into<String>, confidence: f64, bbox: [f64; 4]) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }

    pub fn centroid(&self) -> (f64, f64) {
        let [x1, y1, x2, y2] = self.bbox;
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }

    /// Returns a copy of this detection with `bbox` divided by frame
    /// dimensions, per spec §4.5 step 4 ("normalized detections").
    pub fn normalized(&self, frame_width: f64, frame_height: f64) -> Self {
        let [x1, y1, x2, y2] = self.bbox;
        Self {
            bbox: [
                x1 / frame_width,
                y1 / frame_height,
                x2 / frame_width,
                y2 / frame_height,
            ],
            ..self.clone()
        }
    }
}

/// Interface-boundary-only contract (spec §1, §6): given a frame, return a
/// list of detections. The model itself — weights, preprocessing,
/// postprocessing internals — is an external collaborator; implementations
/// here only need to honor this shape.
pub trait Detector: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
