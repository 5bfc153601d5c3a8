//! Command-line entry point for the `sentinel` analytics engine: parses a
//! single pipeline's configuration from flags, wires concrete detection,
//! tracking, and output adapters, and runs the Engine to completion.
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sentinel_core::config::{
    Device, DwellTimeConfig, EngineTunables, FeatureConfig, InputConfig, LineCrossConfig,
    LineZoneConfig, ModelConfig, OutputConfig, PipelineConfig, RegionCrowdConfig, RegionZoneConfig,
    SourceType, TrackerConfig,
};
use sentinel_core::detection::domain::detector::Detector;
use sentinel_core::detection::infrastructure::onnx_detector::OnnxYoloDetector;
use sentinel_core::features::Feature;
use sentinel_core::reid::histogram_embedder::HistogramEmbedder;
use sentinel_core::shared::geometry::{CentroidMode, LineDirection, LineOrientation, Point};
use sentinel_core::sink::FileEventSink;
use sentinel_core::stream::infrastructure::rtsp_pusher::{FfmpegRtspPusher, RtspPushConfig};
use sentinel_core::stream::RtspHealthTracker;
use sentinel_core::tracking::domain::tracker::IdentityTracker;
use sentinel_core::tracking::infrastructure::{ByteTrackAssociator, CentroidTracker, ReidLayer};
use sentinel_core::video::infrastructure::{FfmpegReader, FfmpegWriter};
use sentinel_core::Engine;

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Real-time video analytics: detection, tracking, and zone alerting")]
struct Cli {
    /// Input video file path, or an rtsp:// URL for a live source.
    #[arg(long)]
    source: String,

    /// Path to the ONNX detection model.
    #[arg(long)]
    model: PathBuf,

    /// Comma-separated class names, in the order the model was trained on.
    #[arg(long, value_delimiter = ',')]
    classes: Vec<String>,

    #[arg(long, default_value_t = 0.5)]
    confidence: f64,

    #[arg(long, default_value_t = 0.45)]
    iou: f64,

    /// Which feature state machine to run: line_cross, region_crowd, or dwell_time.
    #[arg(long)]
    feature: String,

    /// line_cross only: "x1,y1,x2,y2" in normalized [0,1] coordinates, repeatable (separate with ';').
    #[arg(long = "line", value_delimiter = ';')]
    lines: Vec<String>,

    /// region_crowd/dwell_time: "x1,y1;x2,y2;x3,y3;..." normalized polygon, repeatable (separate with '|').
    #[arg(long = "region", value_delimiter = '|')]
    regions: Vec<String>,

    #[arg(long, default_value_t = 5)]
    crowd_warning_threshold: u32,

    #[arg(long, default_value_t = 10)]
    crowd_critical_threshold: u32,

    #[arg(long, default_value_t = 10.0)]
    dwell_alert_seconds: f64,

    /// Name used to namespace this pipeline's output directory.
    #[arg(long, default_value = "pipeline")]
    config_name: String,

    #[arg(long, default_value = "camera_1")]
    cctv_id: String,

    #[arg(long, default_value = "./out")]
    out_dir: PathBuf,

    #[arg(long)]
    no_save_video: bool,

    /// Re-broadcast the annotated stream to this RTSP URL.
    #[arg(long)]
    rtsp_url: Option<String>,

    /// Output resolution/frame rate for the RTSP encoder (must match the
    /// source; the engine does not renegotiate mid-stream).
    #[arg(long, default_value_t = 1920)]
    rtsp_width: u32,
    #[arg(long, default_value_t = 1080)]
    rtsp_height: u32,
    #[arg(long, default_value_t = 25)]
    rtsp_fps: u32,

    /// Enable appearance-based re-identification of dormant tracks.
    #[arg(long)]
    reid: bool,

    /// Use the simple nearest-centroid tracker instead of ByteTrack association.
    #[arg(long)]
    centroid_tracker: bool,

    #[arg(long)]
    infer_every_n_frames: Option<usize>,

    #[arg(long)]
    loop_file_input: bool,

    /// Stop after this many seconds (mainly for smoke-testing a pipeline).
    #[arg(long)]
    max_runtime_seconds: Option<u64>,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    config.validate()?;

    let detector: Box<dyn Detector> = Box::new(OnnxYoloDetector::new(
        &cli.model,
        cli.confidence,
        config.model.classes.clone(),
    )?);

    let tracker = build_tracker(&cli, &config);
    let feature = build_feature(&config.feature);

    let sink = Box::new(FileEventSink::new(
        config.output.base_dir.join(&config.config_name),
        &config.output.image_folder,
        &config.output.data_folder,
        &config.output.status_folder,
        &config.output.csv_file,
        cli.source.clone(),
        config.cctv_id.clone(),
    ));

    let rtsp = cli.rtsp_url.as_ref().map(|url| {
        let pusher = FfmpegRtspPusher::new(RtspPushConfig::new(
            url.clone(),
            cli.rtsp_fps,
            cli.rtsp_width,
            cli.rtsp_height,
        ));
        RtspHealthTracker::new(
            Box::new(pusher),
            config.tunables.rtsp_recover_cooldown_seconds,
            config.tunables.rtsp_drop_warn_seconds,
        )
    });

    let logger = Box::new(sentinel_core::pipeline::StdoutPipelineLogger::default());
    let cancelled = Arc::new(AtomicBool::new(false));

    let mut engine = Engine::new(config.clone(), detector, tracker, feature, sink, rtsp, logger, cancelled);

    let reader: Box<dyn sentinel_core::video::domain::video_reader::VideoReader> =
        Box::new(FfmpegReader::new());
    let writer: Option<Box<dyn sentinel_core::video::domain::video_writer::VideoWriter>> =
        if config.output.save_video {
            Some(Box::new(FfmpegWriter::new()))
        } else {
            None
        };

    let max_runtime = cli.max_runtime_seconds.map(Duration::from_secs);
    engine.run(reader, writer, max_runtime)?;
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.classes.is_empty() {
        return Err("--classes must list at least one class name".into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err("--confidence must be between 0.0 and 1.0".into());
    }
    match cli.feature.as_str() {
        "line_cross" => {
            if cli.lines.is_empty() {
                return Err("--feature line_cross requires at least one --line".into());
            }
        }
        "region_crowd" | "dwell_time" => {
            if cli.regions.is_empty() {
                return Err(format!("--feature {} requires at least one --region", cli.feature).into());
            }
        }
        other => {
            return Err(format!("unknown feature '{other}', expected line_cross|region_crowd|dwell_time").into())
        }
    }
    Ok(())
}

fn parse_point(raw: &str) -> Result<Point, Box<dyn std::error::Error>> {
    let mut parts = raw.split(',');
    let x: f64 = parts.next().ok_or("missing x coordinate")?.trim().parse()?;
    let y: f64 = parts.next().ok_or("missing y coordinate")?.trim().parse()?;
    Ok((x, y))
}

fn parse_line(raw: &str, id: usize) -> Result<LineZoneConfig, Box<dyn std::error::Error>> {
    let mut coords = raw.split(',');
    let x1: f64 = coords.next().ok_or("line missing x1")?.trim().parse()?;
    let y1: f64 = coords.next().ok_or("line missing y1")?.trim().parse()?;
    let x2: f64 = coords.next().ok_or("line missing x2")?.trim().parse()?;
    let y2: f64 = coords.next().ok_or("line missing y2")?.trim().parse()?;
    let orientation = if (x2 - x1).abs() >= (y2 - y1).abs() {
        LineOrientation::Horizontal
    } else {
        LineOrientation::Vertical
    };
    let direction = match orientation {
        LineOrientation::Horizontal => LineDirection::Downward,
        _ => LineDirection::Rightward,
    };
    Ok(LineZoneConfig {
        id: format!("line_{id}"),
        start: (x1, y1),
        end: (x2, y2),
        orientation,
        direction,
        bidirectional: true,
    })
}

fn parse_region(raw: &str, id: usize) -> Result<RegionZoneConfig, Box<dyn std::error::Error>> {
    let coords: Result<Vec<Point>, _> = raw.split(';').map(parse_point).collect();
    Ok(RegionZoneConfig {
        id: format!("region_{id}"),
        coords: coords?,
        name: None,
    })
}

fn build_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let lines: Result<Vec<_>, _> = cli.lines.iter().enumerate().map(|(i, l)| parse_line(l, i)).collect();
    let regions: Result<Vec<_>, _> = cli.regions.iter().enumerate().map(|(i, r)| parse_region(r, i)).collect();

    let feature = match cli.feature.as_str() {
        "line_cross" => FeatureConfig::LineCross(LineCrossConfig {
            lines: lines?,
            centroid: CentroidMode::MidCentre,
            allow_recounting: false,
            max_position_jump: 0.25,
            lost_threshold: 30,
            in_warning_threshold: 1,
            out_warning_threshold: 1,
        }),
        "region_crowd" => FeatureConfig::RegionCrowd(RegionCrowdConfig {
            regions: regions?,
            centroid: CentroidMode::Bottom,
            alert_threshold: cli.crowd_warning_threshold,
            warning_threshold: cli.crowd_warning_threshold,
            critical_threshold: cli.crowd_critical_threshold,
            cooldown_seconds: 5.0,
        }),
        "dwell_time" => FeatureConfig::DwellTime(DwellTimeConfig {
            regions: regions?,
            centroid: CentroidMode::Bottom,
            min_dwell_seconds: 1.0,
            alert_threshold_seconds: cli.dwell_alert_seconds,
        }),
        other => return Err(format!("unknown feature '{other}'").into()),
    };

    let source_type = if cli.source.starts_with("rtsp://") {
        SourceType::Rtsp
    } else {
        SourceType::Video
    };

    let output = OutputConfig {
        base_dir: cli.out_dir.clone(),
        save_video: !cli.no_save_video,
        rtsp_url: cli.rtsp_url.clone(),
        ..OutputConfig::default()
    };

    let mut tunables = EngineTunables::from_env();
    if let Some(n) = cli.infer_every_n_frames {
        tunables.infer_every_n_frames = n.max(1);
    }
    tunables.loop_file_input = cli.loop_file_input || tunables.loop_file_input;

    Ok(PipelineConfig {
        config_name: cli.config_name.clone(),
        cctv_id: cli.cctv_id.clone(),
        model: ModelConfig {
            name: cli.model.to_string_lossy().into_owned(),
            device: Device::Cpu,
            conf: cli.confidence,
            iou: cli.iou,
            model_type: "yolo".to_string(),
            classes: cli.classes.clone(),
        },
        input: InputConfig {
            source_type,
            source: cli.source.clone(),
            max_fps: None,
            time_allowed: None,
        },
        feature,
        tracker: TrackerConfig::from_env(),
        tunables,
        output,
    })
}

fn build_tracker(cli: &Cli, config: &PipelineConfig) -> Box<dyn IdentityTracker> {
    let centroid_mode = match &config.feature {
        FeatureConfig::LineCross(c) => c.centroid,
        FeatureConfig::RegionCrowd(c) => c.centroid,
        FeatureConfig::DwellTime(c) => c.centroid,
    };
    let base: Box<dyn IdentityTracker> = if cli.centroid_tracker {
        Box::new(CentroidTracker::new(config.tracker, centroid_mode))
    } else {
        Box::new(ByteTrackAssociator::new(config.tracker, centroid_mode))
    };
    if cli.reid || config.tracker.reid_enabled {
        Box::new(ReidLayer::new(base, Box::new(HistogramEmbedder::new()), &config.tracker))
    } else {
        base
    }
}

fn build_feature(config: &FeatureConfig) -> Box<dyn Feature> {
    match config {
        FeatureConfig::LineCross(cfg) => {
            Box::new(sentinel_core::features::line_cross::LineCrossFeature::new(cfg.clone()))
        }
        FeatureConfig::RegionCrowd(cfg) => {
            Box::new(sentinel_core::features::region_crowd::RegionCrowdFeature::new(cfg.clone()))
        }
        FeatureConfig::DwellTime(cfg) => {
            Box::new(sentinel_core::features::dwell_time::DwellTimeFeature::new(cfg.clone()))
        }
    }
}
