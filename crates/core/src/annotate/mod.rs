//! Frame annotation (spec §4.5 step 5), grounded in the teacher's direct
//! pixel-buffer idiom from `blurring/infrastructure/cpu_rectangular_blurrer.rs`.
//!
//! No font-rendering crate (imageproc/ab_glyph/rusttype/fontdue) appears
//! anywhere in this stack, so counters and the FPS readout are rendered with
//! a small embedded bitmap digit font in [`primitives`] rather than pulling
//! in a new dependency.
pub mod primitives;

use std::collections::HashMap;

use crate::config::FeatureConfig;
use crate::features::{FeatureMetrics, FeatureResult, TrackedDetection};
use crate::shared::frame::Frame;
use primitives::{draw_line, draw_number, draw_polygon, draw_rect, fill_rect, Color};

const COLOR_IN: Color = (0, 200, 0);
const COLOR_OUT: Color = (200, 0, 0);
const COLOR_DWELL_ALERT: Color = (255, 0, 0);
const COLOR_NEUTRAL: Color = (0, 160, 255);
const COLOR_ZONE_NORMAL: Color = (0, 220, 220);
const COLOR_ZONE_WARNING: Color = (255, 191, 0);
const COLOR_ZONE_CRITICAL: Color = (220, 20, 20);
const COLOR_TEXT: Color = (255, 255, 255);

/// Draws zones, identity-tagged bboxes, counters, and the current FPS onto a
/// frame in place. Tracks a sticky per-track badge color: once a track
/// triggers an alert it keeps that color for the rest of its life, it never
/// reverts to neutral (spec §4.5 step 8, SPEC_FULL §9 Open Question (c)).
pub struct FrameAnnotator {
    track_colors: HashMap<u32, Color>,
}

impl FrameAnnotator {
    pub fn new() -> Self {
        Self {
            track_colors: HashMap::new(),
        }
    }

    pub fn annotate(
        &mut self,
        frame: &mut Frame,
        feature_config: &FeatureConfig,
        detections: &[TrackedDetection],
        result: &FeatureResult,
        fps: f64,
    ) {
        self.update_sticky_state(result);
        self.draw_zones(frame, feature_config, &result.metrics);
        self.draw_detections(frame, detections);
        self.draw_counters(frame, &result.metrics);
        self.draw_fps(frame, fps);
    }

    fn update_sticky_state(&mut self, result: &FeatureResult) {
        for alert in &result.alerts {
            let Some(track_id) = alert.track_id else {
                continue;
            };
            let color = match alert.kind.as_str() {
                "line_crossing_in" => COLOR_IN,
                "line_crossing_out" => COLOR_OUT,
                "dwell_time_alert" => COLOR_DWELL_ALERT,
                _ => continue,
            };
            self.track_colors.insert(track_id, color);
        }
    }

    fn bbox_color(&self, track_id: u32) -> Color {
        self.track_colors.get(&track_id).copied().unwrap_or(COLOR_NEUTRAL)
    }

    fn draw_detections(&self, frame: &mut Frame, detections: &[TrackedDetection]) {
        let (w, h) = (frame.width() as f64, frame.height() as f64);
        for det in detections {
            let [x1, y1, x2, y2] = det.bbox;
            let color = self.bbox_color(det.track_id);
            draw_rect(frame, ((x1 * w) as i64, (y1 * h) as i64), ((x2 * w) as i64, (y2 * h) as i64), color, 1);
        }
    }

    fn draw_zones(&self, frame: &mut Frame, feature_config: &FeatureConfig, metrics: &FeatureMetrics) {
        let (w, h) = (frame.width() as f64, frame.height() as f64);
        let to_px = |p: (f64, f64)| ((p.0 * w) as i64, (p.1 * h) as i64);
        match feature_config {
            FeatureConfig::LineCross(cfg) => {
                for line in &cfg.lines {
                    draw_line(frame, to_px(line.start), to_px(line.end), COLOR_ZONE_NORMAL, 1);
                }
            }
            FeatureConfig::RegionCrowd(cfg) => {
                let per_region = match metrics {
                    FeatureMetrics::RegionCrowd(m) => Some(&m.per_region),
                    _ => None,
                };
                for region in &cfg.regions {
                    let color = per_region
                        .and_then(|m| m.get(&region.id))
                        .map(|r| match r.status.as_str() {
                            "critical" => COLOR_ZONE_CRITICAL,
                            "warning" => COLOR_ZONE_WARNING,
                            _ => COLOR_ZONE_NORMAL,
                        })
                        .unwrap_or(COLOR_ZONE_NORMAL);
                    let points: Vec<(i64, i64)> = region.coords.iter().map(|&p| to_px(p)).collect();
                    draw_polygon(frame, &points, color, 1);
                }
            }
            FeatureConfig::DwellTime(cfg) => {
                for region in &cfg.regions {
                    let points: Vec<(i64, i64)> = region.coords.iter().map(|&p| to_px(p)).collect();
                    draw_polygon(frame, &points, COLOR_ZONE_NORMAL, 1);
                }
            }
        }
    }

    fn draw_counters(&self, frame: &mut Frame, metrics: &FeatureMetrics) {
        match metrics {
            FeatureMetrics::LineCross(m) => {
                self.draw_counter_row(frame, 10, COLOR_IN, m.total_in as u64);
                self.draw_counter_row(frame, 26, COLOR_OUT, m.total_out as u64);
            }
            FeatureMetrics::RegionCrowd(m) => {
                self.draw_counter_row(frame, 10, COLOR_ZONE_NORMAL, m.total_current as u64);
                self.draw_counter_row(frame, 26, COLOR_ZONE_CRITICAL, m.total_max as u64);
            }
            FeatureMetrics::DwellTime(m) => {
                self.draw_counter_row(frame, 10, COLOR_DWELL_ALERT, m.alerted_track_ids.len() as u64);
                self.draw_counter_row(frame, 26, COLOR_ZONE_NORMAL, m.inside_track_ids.len() as u64);
            }
        }
    }

    /// A colored swatch (identifying which counter this is) followed by its
    /// value rendered with the embedded bitmap digit font.
    fn draw_counter_row(&self, frame: &mut Frame, y: i64, color: Color, value: u64) {
        fill_rect(frame, (10, y), (10, 10), color);
        draw_number(frame, (26, y), value, COLOR_TEXT, 2);
    }

    fn draw_fps(&self, frame: &mut Frame, fps: f64) {
        let y = (frame.height() as i64 - 20).max(0);
        fill_rect(frame, (10, y), (10, 10), COLOR_TEXT);
        draw_number(frame, (26, y), fps.max(0.0).round() as u64, COLOR_TEXT, 2);
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LineCrossConfig, LineZoneConfig, RegionCrowdConfig, RegionZoneConfig};
    use crate::features::line_cross::LineCrossMetrics;
    use crate::features::{Alert, FeatureResult};
    use crate::shared::geometry::{CentroidMode, LineDirection, LineOrientation};

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![0u8; (w * h * 3) as usize], w, h, 3, 0)
    }

    fn line_cross_config() -> FeatureConfig {
        FeatureConfig::LineCross(LineCrossConfig {
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
        })
    }

    fn det(track_id: u32) -> TrackedDetection {
        TrackedDetection {
            track_id,
            class_id: 0,
            class_name: "person".into(),
            confidence: 0.9,
            bbox: [0.2, 0.2, 0.4, 0.4],
            reference_point: (0.3, 0.3),
        }
    }

    #[test]
    fn sticky_color_persists_after_alert_clears() {
        let mut annotator = FrameAnnotator::new();
        let alert_result = FeatureResult {
            feature_type: "line_cross",
            metrics: FeatureMetrics::LineCross(LineCrossMetrics::default()),
            alerts: vec![Alert {
                kind: "line_crossing_in".into(),
                zone_id: "l1".into(),
                frame: 5,
                track_id: Some(9),
                count: Some(1),
                threshold: Some(1.0),
                dwell_seconds: None,
            }],
        };
        annotator.update_sticky_state(&alert_result);
        assert_eq!(annotator.bbox_color(9), COLOR_IN);

        let no_alert_result = FeatureResult {
            feature_type: "line_cross",
            metrics: FeatureMetrics::LineCross(LineCrossMetrics::default()),
            alerts: vec![],
        };
        annotator.update_sticky_state(&no_alert_result);
        assert_eq!(annotator.bbox_color(9), COLOR_IN);
    }

    #[test]
    fn unalerted_track_gets_neutral_color() {
        let annotator = FrameAnnotator::new();
        assert_eq!(annotator.bbox_color(42), COLOR_NEUTRAL);
    }

    #[test]
    fn annotate_draws_into_frame_without_panicking() {
        let mut annotator = FrameAnnotator::new();
        let mut f = frame(200, 100);
        let cfg = line_cross_config();
        let result = FeatureResult {
            feature_type: "line_cross",
            metrics: FeatureMetrics::LineCross(LineCrossMetrics::default()),
            alerts: vec![],
        };
        annotator.annotate(&mut f, &cfg, &[det(1)], &result, 29.7);
        assert!(f.data().iter().any(|&b| b != 0));
    }

    #[test]
    fn region_crowd_zone_tint_follows_status() {
        let mut annotator = FrameAnnotator::new();
        let mut f = frame(100, 100);
        let cfg = FeatureConfig::RegionCrowd(RegionCrowdConfig {
            regions: vec![RegionZoneConfig {
                id: "r1".into(),
                coords: vec![(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)],
                name: None,
            }],
            centroid: CentroidMode::MidCentre,
            alert_threshold: 2,
            warning_threshold: 2,
            critical_threshold: 4,
            cooldown_seconds: 5.0,
        });
        let mut per_region = HashMap::new();
        per_region.insert(
            "r1".to_string(),
            crate::features::region_crowd::RegionMetrics {
                current_count: 4,
                max_count: 4,
                active_tracks: vec![1, 2, 3, 4],
                status: "critical".to_string(),
            },
        );
        let result = FeatureResult {
            feature_type: "region_crowd",
            metrics: FeatureMetrics::RegionCrowd(crate::features::region_crowd::RegionCrowdMetrics {
                total_current: 4,
                total_max: 4,
                warning_threshold: 2,
                critical_threshold: 4,
                inside_track_ids: vec![1, 2, 3, 4],
                per_region,
                alerts_count: 1,
            }),
            alerts: vec![],
        };
        annotator.annotate(&mut f, &cfg, &[], &result, 30.0);
        let top_edge = (10 * 100 + 50) * 3;
        assert_eq!(&f.data()[top_edge..top_edge + 3], &[220, 20, 20]);
    }
}
