//! Typed configuration surface.
//!
//! YAML/JSON parsing and schema validation are out of scope (an external
//! collaborator's concern); these types are the validated, in-process
//! result of that parsing. Library consumers build them directly; the
//! `sentinel` CLI builds them from flags.

use std::path::PathBuf;

use crate::shared::geometry::{CentroidMode, LineDirection, LineOrientation, Point};
use crate::shared::{constants, constants::env};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
    Mps,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub name: String,
    pub device: Device,
    pub conf: f64,
    pub iou: f64,
    pub model_type: String,
    pub classes: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
    Video,
    Rtsp,
}

#[derive(Clone, Debug)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug)]
pub struct InputConfig {
    pub source_type: SourceType,
    pub source: String,
    pub max_fps: Option<f64>,
    pub time_allowed: Option<TimeWindow>,
}

#[derive(Clone, Debug)]
pub struct LineZoneConfig {
    pub id: String,
    pub start: Point,
    pub end: Point,
    pub orientation: LineOrientation,
    pub direction: LineDirection,
    pub bidirectional: bool,
}

#[derive(Clone, Debug)]
pub struct RegionZoneConfig {
    pub id: String,
    pub coords: Vec<Point>,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LineCrossConfig {
    pub lines: Vec<LineZoneConfig>,
    pub centroid: CentroidMode,
    pub allow_recounting: bool,
    pub max_position_jump: f64,
    pub lost_threshold: usize,
    pub in_warning_threshold: u32,
    pub out_warning_threshold: u32,
}

#[derive(Clone, Debug)]
pub struct RegionCrowdConfig {
    pub regions: Vec<RegionZoneConfig>,
    pub centroid: CentroidMode,
    pub alert_threshold: u32,
    pub warning_threshold: u32,
    pub critical_threshold: u32,
    pub cooldown_seconds: f64,
}

#[derive(Clone, Debug)]
pub struct DwellTimeConfig {
    pub regions: Vec<RegionZoneConfig>,
    pub centroid: CentroidMode,
    pub min_dwell_seconds: f64,
    pub alert_threshold_seconds: f64,
}

/// Exactly one of these is active per pipeline (spec §6: "Feature: exactly
/// one of line_cross|region_crowd|dwell_time").
#[derive(Clone, Debug)]
pub enum FeatureConfig {
    LineCross(LineCrossConfig),
    RegionCrowd(RegionCrowdConfig),
    DwellTime(DwellTimeConfig),
}

#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub save_video: bool,
    pub save_annotations: bool,
    pub rtsp_url: Option<String>,
    pub rtsp_cooldown_seconds: f64,
    pub log_every_n_frames: usize,
    pub base_dir: PathBuf,
    pub data_folder: String,
    pub image_folder: String,
    pub status_folder: String,
    pub csv_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_video: true,
            save_annotations: true,
            rtsp_url: None,
            rtsp_cooldown_seconds: 5.0,
            log_every_n_frames: 30,
            base_dir: PathBuf::from("./out"),
            data_folder: "data".to_string(),
            image_folder: "image".to_string(),
            status_folder: "status".to_string(),
            csv_file: "data.csv".to_string(),
        }
    }
}

/// Tracker tunables (spec §4.1), with environment-variable overrides
/// resolved once at process start (spec §6).
#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    pub max_lost_frames: usize,
    pub max_distance: f64,
    pub high_thresh: f64,
    pub low_thresh: f64,
    pub new_track_thresh: f64,
    pub match_thresh: f64,
    pub track_buffer: usize,
    pub fuse_score: bool,
    pub reid_enabled: bool,
    pub reid_similarity_thresh: f64,
    pub reid_momentum: f64,
    pub centroid_distance_weight: f64,
    pub centroid_reid_weight: f64,
    pub centroid_reid_gate_multiplier: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_lost_frames: constants::DEFAULT_MAX_LOST_FRAMES,
            max_distance: constants::DEFAULT_MAX_DISTANCE,
            high_thresh: constants::DEFAULT_BT_HIGH_THRESH,
            low_thresh: constants::DEFAULT_BT_LOW_THRESH,
            new_track_thresh: constants::DEFAULT_BT_NEW_TRACK_THRESH,
            match_thresh: constants::DEFAULT_BT_MATCH_THRESH,
            track_buffer: constants::DEFAULT_MAX_LOST_FRAMES,
            fuse_score: constants::DEFAULT_BT_FUSE_SCORE,
            reid_enabled: constants::DEFAULT_REID_ENABLED,
            reid_similarity_thresh: constants::DEFAULT_REID_SIMILARITY_THRESH,
            reid_momentum: constants::DEFAULT_REID_MOMENTUM,
            centroid_distance_weight: constants::DEFAULT_CENTROID_DISTANCE_WEIGHT,
            centroid_reid_weight: constants::DEFAULT_CENTROID_REID_WEIGHT,
            centroid_reid_gate_multiplier: constants::DEFAULT_CENTROID_REID_GATE_MULTIPLIER,
        }
    }
}

impl TrackerConfig {
    /// Applies the `YOI_*` environment overrides on top of defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            high_thresh: constants::env_f64(env::BT_TRACK_HIGH_THRESH, d.high_thresh),
            low_thresh: constants::env_f64(env::BT_TRACK_LOW_THRESH, d.low_thresh),
            new_track_thresh: constants::env_f64(env::BT_NEW_TRACK_THRESH, d.new_track_thresh),
            match_thresh: constants::env_f64(env::BT_MATCH_THRESH, d.match_thresh),
            fuse_score: constants::env_bool(env::BT_FUSE_SCORE, d.fuse_score),
            reid_enabled: constants::env_bool(env::REID_ENABLED, d.reid_enabled),
            reid_similarity_thresh: constants::env_f64(
                env::REID_SIMILARITY_THRESH,
                d.reid_similarity_thresh,
            ),
            reid_momentum: constants::env_f64(env::REID_MOMENTUM, d.reid_momentum),
            ..d
        }
    }
}

/// Process-wide tunables from spec §6, resolved from environment variables.
#[derive(Clone, Copy, Debug)]
pub struct EngineTunables {
    pub infer_every_n_frames: usize,
    pub max_inference_seconds: f64,
    pub loop_file_input: bool,
    pub rtsp_auto_recover: bool,
    pub rtsp_recover_cooldown_seconds: f64,
    pub rtsp_drop_warn_seconds: f64,
    pub bbox_smoothing: bool,
}

impl Default for EngineTunables {
    fn default() -> Self {
        Self {
            infer_every_n_frames: 1,
            max_inference_seconds: 0.0,
            loop_file_input: false,
            rtsp_auto_recover: true,
            rtsp_recover_cooldown_seconds: constants::DEFAULT_RTSP_RECOVER_COOLDOWN_SECONDS,
            rtsp_drop_warn_seconds: constants::DEFAULT_RTSP_DROP_WARN_SECONDS,
            bbox_smoothing: false,
        }
    }
}

impl EngineTunables {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            infer_every_n_frames: constants::env_usize(
                env::INFER_EVERY_N_FRAMES,
                d.infer_every_n_frames,
            )
            .max(1),
            max_inference_seconds: constants::env_f64(
                env::MAX_INFERENCE_SECONDS,
                d.max_inference_seconds,
            ),
            loop_file_input: constants::env_bool(env::LOOP_FILE_INPUT, d.loop_file_input),
            rtsp_auto_recover: constants::env_bool(env::RTSP_AUTO_RECOVER, d.rtsp_auto_recover),
            rtsp_recover_cooldown_seconds: constants::env_f64(
                env::RTSP_RECOVER_COOLDOWN_SECONDS,
                d.rtsp_recover_cooldown_seconds,
            ),
            rtsp_drop_warn_seconds: constants::env_f64(
                env::RTSP_DROP_WARN_SECONDS,
                d.rtsp_drop_warn_seconds,
            ),
            bbox_smoothing: constants::env_bool(env::BBOX_SMOOTHING, d.bbox_smoothing),
        }
    }
}

/// The full, validated configuration for one pipeline (one input source).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Used to namespace the output directory (`<out>/<config_name>/...`).
    pub config_name: String,
    /// Camera identity carried into every Event Record (spec §3).
    pub cctv_id: String,
    pub model: ModelConfig,
    pub input: InputConfig,
    pub feature: FeatureConfig,
    pub tracker: TrackerConfig,
    pub tunables: EngineTunables,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Validates geometry and feature invariants (spec §7 Config error
    /// taxonomy): every line has exactly two points; every region has at
    /// least three.
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        use crate::error::EngineError;
        match &self.feature {
            FeatureConfig::LineCross(cfg) => {
                if cfg.lines.is_empty() {
                    return Err(EngineError::Config(
                        "line_cross feature requires at least one line".into(),
                    ));
                }
                if cfg.in_warning_threshold == 0 && cfg.out_warning_threshold == 0 {
                    return Err(EngineError::Config(
                        "line_cross requires a nonzero in/out threshold".into(),
                    ));
                }
            }
            FeatureConfig::RegionCrowd(cfg) => {
                for r in &cfg.regions {
                    if r.coords.len() < 3 {
                        return Err(EngineError::Config(format!(
                            "region '{}' must have at least 3 vertices",
                            r.id
                        )));
                    }
                }
                if cfg.critical_threshold < cfg.warning_threshold {
                    return Err(EngineError::Config(
                        "critical_threshold must be >= warning_threshold".into(),
                    ));
                }
            }
            FeatureConfig::DwellTime(cfg) => {
                for r in &cfg.regions {
                    if r.coords.len() < 3 {
                        return Err(EngineError::Config(format!(
                            "region '{}' must have at least 3 vertices",
                            r.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
