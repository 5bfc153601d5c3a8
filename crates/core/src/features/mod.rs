pub mod dwell_time;
pub mod line_cross;
pub mod region_crowd;

pub use dwell_time::DwellTimeFeature;
pub use line_cross::LineCrossFeature;
pub use region_crowd::RegionCrowdFeature;

use serde::{Deserialize, Serialize};

use crate::shared::geometry::Point;

/// A tracked object as seen by a feature, already carrying a normalized
/// reference point (spec §4.5 step 4).
#[derive(Clone, Debug)]
pub struct TrackedDetection {
    pub track_id: u32,
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f64,
    /// Normalized `[x1, y1, x2, y2]`.
    pub bbox: [f64; 4],
    pub reference_point: Point,
}

/// One alert emitted by a feature this frame (spec §4.2/§4.3/§4.4 "Alert
/// policy"). `kind` is the wire-level string (`line_crossing_in`, etc.);
/// `track_id` is `None` for region-level alerts that aren't about one track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: String,
    pub zone_id: String,
    pub frame: usize,
    pub track_id: Option<u32>,
    pub count: Option<u32>,
    pub threshold: Option<f64>,
    pub dwell_seconds: Option<f64>,
}

/// The per-frame output of a feature: opaque metrics (feature-specific
/// shape) plus the alerts raised this frame.
#[derive(Clone, Debug)]
pub struct FeatureResult {
    pub feature_type: &'static str,
    pub metrics: FeatureMetrics,
    pub alerts: Vec<Alert>,
}

/// Feature-specific metrics snapshot (spec §4.2/§4.3/§4.4 "Metrics").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature_type", rename_all = "snake_case")]
pub enum FeatureMetrics {
    LineCross(line_cross::LineCrossMetrics),
    RegionCrowd(region_crowd::RegionCrowdMetrics),
    DwellTime(dwell_time::DwellTimeMetrics),
}

/// One of the three mutually-exclusive per-pipeline features (spec §6).
pub trait Feature: Send {
    fn process(&mut self, detections: &[TrackedDetection], frame_idx: usize, fps: f64) -> FeatureResult;
}
