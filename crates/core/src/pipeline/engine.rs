//! Engine Orchestrator (spec §4.5), grounded in
//! `original_source/yoi/components/engine.py`'s per-frame loop and staged
//! startup logging.
//!
//! The eight-step per-frame sequence (skip-frame detect → track → normalize
//! → feature process → annotate → sink → video write → rtsp push) is kept in
//! one place deliberately: each step hands a small, already-typed value to
//! the next, and the only cross-cutting state is the track list produced by
//! `tracker.update()`.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::FrameAnnotator;
use crate::config::{PipelineConfig, SourceType};
use crate::detection::domain::detector::Detector;
use crate::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use crate::error::{EngineError, EngineResult};
use crate::features::{Feature, TrackedDetection};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::geometry::reference_point;
use crate::shared::video_metadata::VideoMetadata;
use crate::sink::{EventContext, EventSink};
use crate::stream::RtspHealthTracker;
use crate::tracking::domain::tracker::IdentityTracker;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

fn centroid_mode(feature: &crate::config::FeatureConfig) -> crate::shared::geometry::CentroidMode {
    use crate::config::FeatureConfig;
    match feature {
        FeatureConfig::LineCross(cfg) => cfg.centroid,
        FeatureConfig::RegionCrowd(cfg) => cfg.centroid,
        FeatureConfig::DwellTime(cfg) => cfg.centroid,
    }
}

fn normalize_bbox(bbox: [f64; 4], width: f64, height: f64) -> [f64; 4] {
    let [x1, y1, x2, y2] = bbox;
    [x1 / width, y1 / height, x2 / width, y2 / height]
}

/// One analytics pipeline: a validated config plus the trait-object adapters
/// that do the actual work. Construction is the CLI/application layer's job
/// (it knows how to build a model-backed `Detector`, an `ort`-session tracker
/// embedder, etc.); `Engine` only orchestrates.
pub struct Engine {
    config: PipelineConfig,
    detector: Box<dyn Detector>,
    tracker: Box<dyn IdentityTracker>,
    feature: Box<dyn Feature>,
    sink: Box<dyn EventSink>,
    rtsp: Option<RtspHealthTracker>,
    annotator: FrameAnnotator,
    logger: Box<dyn PipelineLogger>,
    cancelled: Arc<AtomicBool>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        detector: Box<dyn Detector>,
        tracker: Box<dyn IdentityTracker>,
        feature: Box<dyn Feature>,
        sink: Box<dyn EventSink>,
        rtsp: Option<RtspHealthTracker>,
        logger: Box<dyn PipelineLogger>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let detector = if config.tunables.infer_every_n_frames > 1 {
            log::warn!(
                "{}: running inference every {} frames, tracker receives stale detections on skipped frames",
                config.config_name,
                config.tunables.infer_every_n_frames
            );
            Box::new(
                SkipFrameDetector::new(detector, config.tunables.infer_every_n_frames)
                    .expect("validated config guarantees infer_every_n_frames >= 1"),
            ) as Box<dyn Detector>
        } else {
            detector
        };
        Self {
            config,
            detector,
            tracker,
            feature,
            sink,
            rtsp,
            annotator: FrameAnnotator::new(),
            logger,
            cancelled,
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.config.output.base_dir.join(&self.config.config_name)
    }

    /// Runs the pipeline to completion: opens the source, writer and
    /// rtsp sink, processes every frame, and closes everything on the way
    /// out (including on error). `max_runtime` bounds wall-clock time; `None`
    /// runs until the source is exhausted or cancellation is requested.
    pub fn run(
        &mut self,
        mut reader: Box<dyn VideoReader>,
        mut writer: Option<Box<dyn VideoWriter>>,
        max_runtime: Option<Duration>,
    ) -> EngineResult<()> {
        let name = self.config.config_name.clone();
        log::info!("{name}: STAGE 1/6 opening source {}", self.config.input.source);
        let source_path = PathBuf::from(&self.config.input.source);
        let metadata = reader
            .open(&source_path)
            .map_err(|err| EngineError::Initialization(format!("opening source: {err}")))?;

        log::info!("{name}: STAGE 2/6 preparing output directory {}", self.output_dir().display());
        self.sink
            .init()
            .map_err(|err| EngineError::Initialization(format!("sink init: {err}")))?;

        log::info!("{name}: STAGE 3/6 opening video writer");
        if self.config.output.save_video {
            if let Some(writer) = writer.as_mut() {
                let out_path = self.output_dir().join("annotated.mp4");
                writer
                    .open(&out_path, &metadata)
                    .map_err(|err| EngineError::Initialization(format!("opening video writer: {err}")))?;
            }
        }

        log::info!("{name}: STAGE 4/6 starting rtsp re-broadcast");
        if let Some(rtsp) = self.rtsp.as_mut() {
            if !rtsp.start() {
                log::warn!("{name}: rtsp pusher failed to start, continuing without live re-broadcast");
            }
        }

        log::info!("{name}: STAGE 5/6 feature and tracker state ready");
        log::info!("{name}: STAGE 6/6 entering per-frame loop");

        let is_live = self.config.input.source_type == SourceType::Rtsp;
        let start = Instant::now();
        let result = self.run_loop(&source_path, &mut reader, writer.as_deref_mut(), &metadata, is_live, max_runtime, start);

        if let Some(writer) = writer.as_mut() {
            if let Err(err) = writer.close() {
                log::warn!("{name}: error closing video writer: {err}");
            }
        }
        if let Some(rtsp) = self.rtsp.as_mut() {
            rtsp.stop();
        }
        reader.close();
        self.logger.summary();

        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_loop(
        &mut self,
        source_path: &Path,
        reader: &mut Box<dyn VideoReader>,
        mut writer: Option<&mut dyn VideoWriter>,
        metadata: &VideoMetadata,
        is_live: bool,
        max_runtime: Option<Duration>,
        start: Instant,
    ) -> EngineResult<()> {
        let fps = if metadata.fps > 0.0 { metadata.fps } else { 30.0 };
        let mut frame_idx = 0usize;
        let mut frame_iter = reader.frames();

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("{}: cancellation requested, stopping", self.config.config_name);
                return Ok(());
            }
            if let Some(budget) = max_runtime {
                if start.elapsed() >= budget {
                    log::info!("{}: max runtime reached, stopping", self.config.config_name);
                    return Ok(());
                }
            }

            let next = frame_iter.next();
            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    log::warn!("{}: transient frame read error: {err}", self.config.config_name);
                    continue;
                }
                None => {
                    if self.config.tunables.loop_file_input && !is_live {
                        log::info!("{}: input exhausted, looping from start", self.config.config_name);
                        drop(frame_iter);
                        reader.close();
                        reader
                            .open(source_path)
                            .map_err(|err| EngineError::transient(IoErrMsg(format!("reopening looped source: {err}"))))?;
                        frame_iter = reader.frames();
                        continue;
                    }
                    return Ok(());
                }
            };

            let loop_start = Instant::now();
            self.process_frame(frame, frame_idx, fps, is_live, writer.as_deref_mut());
            self.logger.timing("frame", loop_start.elapsed().as_secs_f64() * 1000.0);

            frame_idx += 1;
            if frame_idx % self.config.output.log_every_n_frames.max(1) == 0 {
                self.logger.progress(frame_idx, metadata.total_frames);
            }
        }
    }

    /// One iteration of the eight-step loop (spec §4.5 steps 1-8).
    fn process_frame(
        &mut self,
        frame: crate::shared::frame::Frame,
        frame_idx: usize,
        fps: f64,
        is_live: bool,
        writer: Option<&mut dyn VideoWriter>,
    ) {
        let name = &self.config.config_name;

        // Step 1/2: skip-frame-aware detection.
        let infer_start = Instant::now();
        let detections = match self.detector.infer(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("{name}: detector inference failed on frame {frame_idx}, treating as empty: {err}");
                Vec::new()
            }
        };
        let infer_secs = infer_start.elapsed().as_secs_f64();
        self.logger.timing("detect", infer_secs * 1000.0);
        if self.config.tunables.max_inference_seconds > 0.0 && infer_secs > self.config.tunables.max_inference_seconds {
            log::warn!(
                "{name}: inference on frame {frame_idx} took {infer_secs:.3}s, exceeding the {:.3}s budget",
                self.config.tunables.max_inference_seconds
            );
        }

        // Step 3: persistent identity tracking.
        let tracks = self.tracker.update(&detections, Some(&frame), frame_idx);

        // Step 4: normalize to [0,1]^2 and build the feature-facing view.
        let (width, height) = (frame.width() as f64, frame.height() as f64);
        let mode = centroid_mode(&self.config.feature);
        let tracked: Vec<TrackedDetection> = tracks
            .iter()
            .map(|t| {
                let bbox = normalize_bbox(t.bbox, width, height);
                TrackedDetection {
                    track_id: t.id,
                    class_id: t.class_id,
                    class_name: t.class_name.clone(),
                    confidence: t.confidence,
                    bbox,
                    reference_point: reference_point(bbox, mode),
                }
            })
            .collect();

        // Step 5: feature state machine.
        let result = self.feature.process(&tracked, frame_idx, fps);

        // Step 6: annotate a copy, preserving the raw frame for event crops.
        let mut annotated = frame.clone();
        self.annotator.annotate(&mut annotated, &self.config.feature, &tracked, &result, fps);

        // Step 7: persist evidence for every alert raised this frame.
        for alert in &result.alerts {
            let track_bbox = alert.track_id.and_then(|id| tracks.iter().find(|t| t.id == id).map(|t| t.bbox));
            let ctx = EventContext {
                feature: result.feature_type,
                alert,
                metrics: &result.metrics,
                frame: &frame,
                annotated_frame: &annotated,
                track_bbox,
                is_live,
            };
            if let Err(err) = self.sink.record(ctx) {
                log::warn!("{name}: failed to record event for alert {:?}: {err}", alert.kind);
            }
        }

        // Step 8: write the annotated frame out (file and/or live re-broadcast).
        if self.config.output.save_video {
            if let Some(writer) = writer {
                if let Err(err) = writer.write(&annotated) {
                    log::warn!("{name}: failed to write frame {frame_idx} to output video: {err}");
                }
            }
        }
        if let Some(rtsp) = self.rtsp.as_mut() {
            rtsp.push(&annotated);
        }
    }
}

/// Adapts a formatted message to `std::error::Error` so it can ride inside
/// `EngineError::transient`, which requires `Error + Send + Sync`.
#[derive(Debug)]
struct IoErrMsg(String);

impl std::fmt::Display for IoErrMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoErrMsg {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::{Device, EngineTunables, InputConfig, LineCrossConfig, LineZoneConfig, ModelConfig, OutputConfig, TrackerConfig};
    use crate::detection::domain::detector::Detection;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::{CentroidMode, LineDirection, LineOrientation};
    use crate::tracking::domain::track::Track;

    struct FixedDetector(Vec<Detection>);
    impl Detector for FixedDetector {
        fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    struct PassthroughTracker;
    impl IdentityTracker for PassthroughTracker {
        fn update(&mut self, detections: &[Detection], _frame: Option<&Frame>, frame_idx: usize) -> Vec<Track> {
            detections
                .iter()
                .enumerate()
                .map(|(i, d)| Track::new(i as u32, d.class_id, d.class_name.clone(), d.bbox, d.confidence, frame_idx, d.centroid()))
                .collect()
        }
    }

    struct CountingFeature {
        calls: usize,
    }
    impl Feature for CountingFeature {
        fn process(&mut self, _detections: &[TrackedDetection], frame: usize, _fps: f64) -> crate::features::FeatureResult {
            self.calls += 1;
            crate::features::FeatureResult {
                feature_type: "line_cross",
                metrics: crate::features::FeatureMetrics::LineCross(crate::features::line_cross::LineCrossMetrics::default()),
                alerts: if frame == 0 {
                    vec![crate::features::Alert {
                        kind: "line_crossing_in".into(),
                        zone_id: "l1".into(),
                        frame,
                        track_id: Some(0),
                        count: Some(1),
                        threshold: Some(1.0),
                        dwell_seconds: None,
                    }]
                } else {
                    vec![]
                },
            }
        }
    }

    struct RecordingSink {
        records: Vec<String>,
    }
    impl EventSink for RecordingSink {
        fn init(&mut self) -> EngineResult<()> {
            Ok(())
        }
        fn record(&mut self, ctx: EventContext<'_>) -> EngineResult<()> {
            self.records.push(ctx.alert.kind.clone());
            Ok(())
        }
    }

    struct MemoryReader {
        frames: Vec<Frame>,
        idx: usize,
        metadata: VideoMetadata,
    }
    impl VideoReader for MemoryReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            self.idx = 0;
            Ok(self.metadata.clone())
        }
        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(std::iter::from_fn(move || {
                if self.idx >= self.frames.len() {
                    None
                } else {
                    let f = self.frames[self.idx].clone();
                    self.idx += 1;
                    Some(Ok(f))
                }
            }))
        }
        fn close(&mut self) {}
    }

    struct NullWriter {
        writes: usize,
    }
    impl VideoWriter for NullWriter {
        fn open(&mut self, _path: &Path, _metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
        fn write(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.writes += 1;
            Ok(())
        }
        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    fn test_frame() -> Frame {
        Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0)
    }

    fn test_config(out_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            config_name: "cam1".into(),
            cctv_id: "camera_1".into(),
            model: ModelConfig {
                name: "yolo".into(),
                device: Device::Cpu,
                conf: 0.5,
                iou: 0.45,
                model_type: "yolo".into(),
                classes: vec!["person".into()],
            },
            input: InputConfig {
                source_type: SourceType::Video,
                source: "in.mp4".into(),
                max_fps: None,
                time_allowed: None,
            },
            feature: crate::config::FeatureConfig::LineCross(LineCrossConfig {
                lines: vec![LineZoneConfig {
                    id: "l1".into(),
                    start: (0.1, 0.5),
                    end: (0.9, 0.5),
                    orientation: LineOrientation::Horizontal,
                    direction: LineDirection::Downward,
                    bidirectional: false,
                }],
                centroid: CentroidMode::MidCentre,
                allow_recounting: false,
                max_position_jump: 0.25,
                lost_threshold: 30,
                in_warning_threshold: 1,
                out_warning_threshold: 1,
            }),
            tracker: TrackerConfig::default(),
            tunables: EngineTunables::default(),
            output: OutputConfig {
                save_video: true,
                base_dir: out_dir.to_path_buf(),
                ..OutputConfig::default()
            },
        }
    }

    #[test]
    fn run_processes_every_frame_and_records_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let sink = RecordingSink { records: Vec::new() };
        let mut engine = Engine::new(
            config,
            Box::new(FixedDetector(vec![Detection::new(0, "person", 0.9, [10.0, 10.0, 20.0, 20.0])])),
            Box::new(PassthroughTracker),
            Box::new(CountingFeature { calls: 0 }),
            Box::new(sink),
            None,
            Box::new(NullPipelineLogger),
            Arc::new(AtomicBool::new(false)),
        );

        let reader: Box<dyn VideoReader> = Box::new(MemoryReader {
            frames: vec![test_frame(), test_frame(), test_frame()],
            idx: 0,
            metadata: VideoMetadata {
                width: 100,
                height: 100,
                fps: 30.0,
                total_frames: 3,
                codec: "h264".into(),
                source_path: None,
            },
        });
        let writer: Box<dyn VideoWriter> = Box::new(NullWriter { writes: 0 });

        engine.run(reader, Some(writer), None).unwrap();
    }

    #[test]
    fn cancellation_flag_stops_the_loop_early() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let cancelled = Arc::new(AtomicBool::new(true));
        let mut engine = Engine::new(
            config,
            Box::new(FixedDetector(vec![])),
            Box::new(PassthroughTracker),
            Box::new(CountingFeature { calls: 0 }),
            Box::new(RecordingSink { records: Vec::new() }),
            None,
            Box::new(NullPipelineLogger),
            cancelled,
        );

        let reader: Box<dyn VideoReader> = Box::new(MemoryReader {
            frames: vec![test_frame(), test_frame()],
            idx: 0,
            metadata: VideoMetadata {
                width: 100,
                height: 100,
                fps: 30.0,
                total_frames: 2,
                codec: "h264".into(),
                source_path: None,
            },
        });

        engine.run(reader, None, None).unwrap();
    }

    #[test]
    fn skip_frame_wrapping_is_applied_when_configured_above_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.tunables.infer_every_n_frames = 2;
        let engine = Engine::new(
            config,
            Box::new(FixedDetector(vec![Detection::new(0, "person", 0.9, [0.0, 0.0, 1.0, 1.0])])),
            Box::new(PassthroughTracker),
            Box::new(CountingFeature { calls: 0 }),
            Box::new(RecordingSink { records: Vec::new() }),
            None,
            Box::new(NullPipelineLogger),
            Arc::new(AtomicBool::new(false)),
        );
        // Constructing without panicking confirms the SkipFrameDetector wrap succeeded.
        drop(engine);
    }
}
