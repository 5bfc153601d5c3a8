//! Line-crossing feature (spec §4.2), grounded in
//! `original_source/yoi/features/line_cross.py`.
use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::LineCrossConfig;
use crate::features::{Alert, Feature, FeatureMetrics, FeatureResult, TrackedDetection};
use crate::shared::constants::LINE_HISTORY_CAP;
use crate::shared::geometry::{crossing_sign, distance, segments_intersect, CrossingSign, Point};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineCrossMetrics {
    pub total_in: u32,
    pub total_out: u32,
    pub net_count: i64,
    pub per_line: HashMap<String, LineMetrics>,
    pub active_tracks: usize,
    pub alerts_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMetrics {
    pub in_count: u32,
    pub out_count: u32,
    pub net_count: i64,
}

struct TrackState {
    positions: VecDeque<Point>,
    last_seen: usize,
}

pub struct LineCrossFeature {
    config: LineCrossConfig,
    positions: HashMap<u32, TrackState>,
    crossed: HashMap<String, HashSet<u32>>,
    in_counts: HashMap<String, u32>,
    out_counts: HashMap<String, u32>,
    total_in: u32,
    total_out: u32,
    alerts_emitted: usize,
}

impl LineCrossFeature {
    pub fn new(config: LineCrossConfig) -> Self {
        let mut in_counts = HashMap::new();
        let mut out_counts = HashMap::new();
        let mut crossed = HashMap::new();
        for line in &config.lines {
            in_counts.insert(line.id.clone(), 0);
            out_counts.insert(line.id.clone(), 0);
            crossed.insert(line.id.clone(), HashSet::new());
        }
        Self {
            config,
            positions: HashMap::new(),
            crossed,
            in_counts,
            out_counts,
            total_in: 0,
            total_out: 0,
            alerts_emitted: 0,
        }
    }

    fn metrics(&self) -> LineCrossMetrics {
        let mut per_line = HashMap::new();
        for line in &self.config.lines {
            let in_count = *self.in_counts.get(&line.id).unwrap_or(&0);
            let out_count = *self.out_counts.get(&line.id).unwrap_or(&0);
            per_line.insert(
                line.id.clone(),
                LineMetrics {
                    in_count,
                    out_count,
                    net_count: in_count as i64 - out_count as i64,
                },
            );
        }
        LineCrossMetrics {
            total_in: self.total_in,
            total_out: self.total_out,
            net_count: self.total_in as i64 - self.total_out as i64,
            per_line,
            active_tracks: self.positions.len(),
            alerts_count: self.alerts_emitted,
        }
    }
}

impl Feature for LineCrossFeature {
    fn process(&mut self, detections: &[TrackedDetection], frame_idx: usize, _fps: f64) -> FeatureResult {
        let mut alerts = Vec::new();

        self.positions.retain(|_, state| frame_idx.saturating_sub(state.last_seen) <= self.config.lost_threshold);

        for det in detections {
            let curr = det.reference_point;
            let entry = self.positions.entry(det.track_id).or_insert_with(|| TrackState {
                positions: VecDeque::with_capacity(LINE_HISTORY_CAP),
                last_seen: frame_idx,
            });

            let prev = entry.positions.back().copied();
            let prev = if let Some(p) = prev {
                if distance(p, curr) > self.config.max_position_jump {
                    entry.positions.clear();
                    for set in self.crossed.values_mut() {
                        set.remove(&det.track_id);
                    }
                    None
                } else {
                    Some(p)
                }
            } else {
                None
            };

            if entry.positions.len() >= LINE_HISTORY_CAP {
                entry.positions.pop_front();
            }
            entry.positions.push_back(curr);
            entry.last_seen = frame_idx;

            let Some(prev) = prev else { continue };

            for line in &self.config.lines {
                if !self.config.allow_recounting
                    && self.crossed.get(&line.id).is_some_and(|s| s.contains(&det.track_id))
                {
                    continue;
                }
                if !segments_intersect(prev, curr, line.start, line.end) {
                    continue;
                }
                let Some(sign) =
                    crossing_sign(line.start, line.end, prev, curr, line.orientation, line.direction)
                else {
                    continue;
                };

                self.crossed.entry(line.id.clone()).or_default().insert(det.track_id);

                match sign {
                    CrossingSign::In => {
                        self.total_in += 1;
                        let count = self.in_counts.entry(line.id.clone()).or_insert(0);
                        *count += 1;
                        if *count >= self.config.in_warning_threshold {
                            self.alerts_emitted += 1;
                            alerts.push(Alert {
                                kind: "line_crossing_in".into(),
                                zone_id: line.id.clone(),
                                frame: frame_idx,
                                track_id: Some(det.track_id),
                                count: Some(*count),
                                threshold: Some(self.config.in_warning_threshold as f64),
                                dwell_seconds: None,
                            });
                        }
                    }
                    CrossingSign::Out => {
                        self.total_out += 1;
                        let count = self.out_counts.entry(line.id.clone()).or_insert(0);
                        *count += 1;
                        if *count >= self.config.out_warning_threshold {
                            self.alerts_emitted += 1;
                            alerts.push(Alert {
                                kind: "line_crossing_out".into(),
                                zone_id: line.id.clone(),
                                frame: frame_idx,
                                track_id: Some(det.track_id),
                                count: Some(*count),
                                threshold: Some(self.config.out_warning_threshold as f64),
                                dwell_seconds: None,
                            });
                        }
                    }
                }
            }
        }

        FeatureResult {
            feature_type: "line_cross",
            metrics: FeatureMetrics::LineCross(self.metrics()),
            alerts,
        }
    }
}
