//! Default tunables and environment variable names.
//!
//! Defaults mirror the source engine's runtime knobs so that a deployment
//! migrating onto this engine sees identical behavior with no config changes.

/// Max frames a track can be lost before removal from the active set.
pub const DEFAULT_MAX_LOST_FRAMES: usize = 30;

/// ByteTrack high-confidence stage threshold.
pub const DEFAULT_BT_HIGH_THRESH: f64 = 0.5;
/// ByteTrack low-confidence stage threshold.
pub const DEFAULT_BT_LOW_THRESH: f64 = 0.1;
/// Minimum score for an unmatched high-score detection to spawn a new track.
pub const DEFAULT_BT_NEW_TRACK_THRESH: f64 = 0.6;
/// IoU/cost threshold below which a match is rejected.
pub const DEFAULT_BT_MATCH_THRESH: f64 = 0.8;
/// Whether to fuse detection score into the association cost.
pub const DEFAULT_BT_FUSE_SCORE: bool = true;

/// Centroid-fallback tracker's max association distance (normalized coords).
pub const DEFAULT_MAX_DISTANCE: f64 = 0.1;
/// Legacy centroid matcher distance-term weight.
pub const DEFAULT_CENTROID_DISTANCE_WEIGHT: f64 = 0.65;
/// Legacy centroid matcher appearance-term weight.
pub const DEFAULT_CENTROID_REID_WEIGHT: f64 = 0.35;
/// Multiplier applied to `max_distance` when the appearance term is strong.
pub const DEFAULT_CENTROID_REID_GATE_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_REID_ENABLED: bool = false;
pub const DEFAULT_REID_SIMILARITY_THRESH: f64 = 0.82;
pub const DEFAULT_REID_MOMENTUM: f64 = 0.35;

/// HSV histogram embedding bin counts.
pub const HIST_HUE_BINS: usize = 16;
pub const HIST_SAT_BINS: usize = 16;
pub const HIST_VAL_BINS: usize = 16;

pub const DEFAULT_MAX_POSITION_JUMP: f64 = 0.25;
pub const DEFAULT_LINE_LOST_THRESHOLD: usize = 30;
/// Bounded ring size for a track's reference-point history.
pub const LINE_HISTORY_CAP: usize = 10;

pub const DEFAULT_WARNING_THRESHOLD: u32 = 10;
pub const DEFAULT_COOLDOWN_SECONDS: f64 = 5.0;

pub const DEFAULT_MIN_DWELL_SECONDS: f64 = 3.0;
pub const DEFAULT_DWELL_ALERT_THRESHOLD_SECONDS: f64 = 10.0;

pub const DEFAULT_RTSP_RECOVER_COOLDOWN_SECONDS: f64 = 10.0;
pub const DEFAULT_RTSP_DROP_WARN_SECONDS: f64 = 5.0;

/// Environment variable names recognized at process start (see spec §6).
pub mod env {
    pub const INFER_EVERY_N_FRAMES: &str = "YOI_INFER_EVERY_N_FRAMES";
    pub const MAX_INFERENCE_SECONDS: &str = "YOI_MAX_INFERENCE_SECONDS";
    pub const LOOP_FILE_INPUT: &str = "YOI_LOOP_FILE_INPUT";
    pub const RTSP_AUTO_RECOVER: &str = "YOI_RTSP_AUTO_RECOVER";
    pub const RTSP_RECOVER_COOLDOWN_SECONDS: &str = "YOI_RTSP_RECOVER_COOLDOWN_SECONDS";
    pub const RTSP_DROP_WARN_SECONDS: &str = "YOI_RTSP_DROP_WARN_SECONDS";
    pub const REID_ENABLED: &str = "YOI_REID_ENABLED";
    pub const REID_SIMILARITY_THRESH: &str = "YOI_REID_SIMILARITY_THRESH";
    pub const REID_MOMENTUM: &str = "YOI_REID_MOMENTUM";
    pub const BBOX_SMOOTHING: &str = "YOI_BBOX_SMOOTHING";
    pub const BT_TRACK_HIGH_THRESH: &str = "YOI_BT_TRACK_HIGH_THRESH";
    pub const BT_TRACK_LOW_THRESH: &str = "YOI_BT_TRACK_LOW_THRESH";
    pub const BT_NEW_TRACK_THRESH: &str = "YOI_BT_NEW_TRACK_THRESH";
    pub const BT_MATCH_THRESH: &str = "YOI_BT_MATCH_THRESH";
    pub const BT_FUSE_SCORE: &str = "YOI_BT_FUSE_SCORE";
}

/// Reads a `f64` from an environment variable, falling back to `default` when
/// unset or unparsable.
pub fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Reads a `bool` from an environment variable (`"1"`/`"true"` → true, case
/// insensitive), falling back to `default` when unset or unrecognized.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

pub fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_f64_falls_back_when_unset() {
        assert_eq!(env_f64("SENTINEL_TEST_DOES_NOT_EXIST_F64", 1.5), 1.5);
    }

    #[test]
    fn env_bool_recognizes_truthy_values() {
        std::env::set_var("SENTINEL_TEST_BOOL", "true");
        assert!(env_bool("SENTINEL_TEST_BOOL", false));
        std::env::remove_var("SENTINEL_TEST_BOOL");
    }
}
