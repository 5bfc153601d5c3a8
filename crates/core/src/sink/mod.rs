//! Alert / Event Sink (spec §4.6), grounded in
//! `original_source/yoi/components/engine_output_lifecycle.py`.
pub mod file_event_sink;

pub use file_event_sink::FileEventSink;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::features::{Alert, FeatureMetrics};

/// Persisted per-alert evidence record (spec §3). `image_id` is unique per
/// sink instance: `{frame:06d}_{counter:04d}_{feature}_{alert_kind}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub image_id: String,
    pub timestamp: String,
    pub feature: String,
    pub alert_kind: String,
    pub frame_idx: usize,
    pub track_id: Option<u32>,
    pub source_name: String,
    pub cctv_id: String,
    pub alert: Alert,
    pub metrics: FeatureMetrics,
    pub image_path: String,
    pub data_path: String,
}

/// Everything the sink needs to persist one alert (spec §4.6 steps 1-6).
pub struct EventContext<'a> {
    pub feature: &'static str,
    pub alert: &'a Alert,
    pub metrics: &'a FeatureMetrics,
    /// Unannotated frame, pixel-space RGB, for the evidence crop.
    pub frame: &'a crate::shared::frame::Frame,
    /// Annotated frame, used as fallback when the crop is degenerate.
    pub annotated_frame: &'a crate::shared::frame::Frame,
    /// Pixel-space bbox of the implicated track, if any.
    pub track_bbox: Option<[f64; 4]>,
    pub is_live: bool,
}

/// Persists one Event Record's evidence artifacts (spec §4.6).
///
/// Implementations must tolerate individual-file I/O failures: log and
/// continue rather than propagate, since one bad write must not stall the
/// per-frame loop (spec §4.6 "strictly append-only ... must tolerate").
pub trait EventSink: Send {
    fn init(&mut self) -> EngineResult<()>;
    fn record(&mut self, ctx: EventContext<'_>) -> EngineResult<()>;
}
