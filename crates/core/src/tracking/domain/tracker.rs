use crate::detection::domain::detector::Detection;
use crate::shared::frame::Frame;
use crate::tracking::domain::track::Track;

/// Assigns persistent identities to per-frame detections (spec §4.1).
///
/// Implementations own the full lifetime of a track: creation, association,
/// lost-frame bookkeeping, and eviction. `update` is called once per frame,
/// even with an empty detection list, so lost-frame counters still advance.
/// `frame` is passed through for implementations that extract an appearance
/// crop (re-ID); pure bbox/IoU associators ignore it.
pub trait IdentityTracker: Send {
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>, frame_idx: usize) -> Vec<Track>;
}
