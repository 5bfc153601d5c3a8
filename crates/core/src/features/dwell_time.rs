//! Dwell-time feature (spec §4.4), grounded in
//! `original_source/yoi/features/dwell_time.py`.
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::DwellTimeConfig;
use crate::features::{Alert, Feature, FeatureMetrics, FeatureResult, TrackedDetection};
use crate::shared::geometry::point_in_polygon;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionDwellMetrics {
    pub current_dwelling: usize,
    pub current_dwell_times: Vec<f64>,
    pub total_completed: usize,
    pub avg_dwell_seconds: f64,
    pub max_dwell_seconds: f64,
    pub min_dwell_seconds: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DwellTimeMetrics {
    pub per_region: HashMap<String, RegionDwellMetrics>,
    pub overall_avg_dwell_seconds: f64,
    pub overall_max_dwell_seconds: f64,
    pub total_dwells_recorded: usize,
    pub inside_track_ids: Vec<u32>,
    pub alerted_track_ids: Vec<u32>,
    pub alerts_count: usize,
}

struct Occupancy {
    entry_frame: usize,
    alerted: bool,
}

pub struct DwellTimeFeature {
    config: DwellTimeConfig,
    /// (region_id, track_id) -> occupancy state while inside.
    occupancy: HashMap<(String, u32), Occupancy>,
    completed: HashMap<String, Vec<f64>>,
    fps: f64,
    alerts_emitted: usize,
    alerted_track_ids: HashSet<u32>,
}

impl DwellTimeFeature {
    pub fn new(config: DwellTimeConfig) -> Self {
        let mut completed = HashMap::new();
        for region in &config.regions {
            completed.insert(region.id.clone(), Vec::new());
        }
        Self {
            config,
            occupancy: HashMap::new(),
            completed,
            fps: 30.0,
            alerts_emitted: 0,
            alerted_track_ids: HashSet::new(),
        }
    }

    fn round2(v: f64) -> f64 {
        (v * 100.0).round() / 100.0
    }
}

impl Feature for DwellTimeFeature {
    fn process(&mut self, detections: &[TrackedDetection], frame_idx: usize, fps: f64) -> FeatureResult {
        if fps > 0.0 {
            self.fps = fps;
        }
        let mut alerts = Vec::new();
        let mut inside_track_ids: HashSet<u32> = HashSet::new();

        for region in &self.config.regions {
            let inside: HashSet<u32> = detections
                .iter()
                .filter(|d| point_in_polygon(d.reference_point, &region.coords))
                .map(|d| d.track_id)
                .collect();
            inside_track_ids.extend(inside.iter().copied());

            // Entries: mark occupancy start for newly-inside tracks.
            for track_id in &inside {
                let key = (region.id.clone(), *track_id);
                self.occupancy.entry(key).or_insert_with(|| Occupancy {
                    entry_frame: frame_idx,
                    alerted: false,
                });
            }

            // Dwell-alert check for everyone currently inside.
            for track_id in &inside {
                let key = (region.id.clone(), *track_id);
                if let Some(occ) = self.occupancy.get_mut(&key) {
                    let dwell_frames = frame_idx.saturating_sub(occ.entry_frame);
                    let dwell_seconds = dwell_frames as f64 / self.fps.max(1.0);
                    if !occ.alerted && dwell_seconds >= self.config.alert_threshold_seconds {
                        occ.alerted = true;
                        self.alerted_track_ids.insert(*track_id);
                        self.alerts_emitted += 1;
                        alerts.push(Alert {
                            kind: "dwell_time_alert".into(),
                            zone_id: region.id.clone(),
                            frame: frame_idx,
                            track_id: Some(*track_id),
                            count: None,
                            threshold: Some(self.config.alert_threshold_seconds),
                            dwell_seconds: Some(Self::round2(dwell_seconds)),
                        });
                    }
                }
            }

            // Exits: anyone tracked in this region but no longer inside.
            let exited: Vec<u32> = self
                .occupancy
                .keys()
                .filter(|(r, _)| r == &region.id)
                .filter(|(_, t)| !inside.contains(t))
                .map(|(_, t)| *t)
                .collect();
            for track_id in exited {
                let key = (region.id.clone(), track_id);
                if let Some(occ) = self.occupancy.remove(&key) {
                    let dwell_frames = frame_idx.saturating_sub(occ.entry_frame);
                    let dwell_seconds = dwell_frames as f64 / self.fps.max(1.0);
                    if dwell_seconds >= self.config.min_dwell_seconds {
                        self.completed.entry(region.id.clone()).or_default().push(dwell_seconds);
                    }
                }
            }
        }

        let mut per_region = HashMap::new();
        let mut all_completed: Vec<f64> = Vec::new();
        for region in &self.config.regions {
            let current: Vec<f64> = self
                .occupancy
                .iter()
                .filter(|((r, _), _)| r == &region.id)
                .map(|((_, _), occ)| frame_idx.saturating_sub(occ.entry_frame) as f64 / self.fps.max(1.0))
                .map(Self::round2)
                .collect();
            let completed = self.completed.get(&region.id).cloned().unwrap_or_default();
            all_completed.extend(completed.iter().copied());

            let avg = if completed.is_empty() {
                0.0
            } else {
                completed.iter().sum::<f64>() / completed.len() as f64
            };
            let max = completed.iter().cloned().fold(0.0_f64, f64::max);
            let min = completed.iter().cloned().fold(f64::INFINITY, f64::min);

            per_region.insert(
                region.id.clone(),
                RegionDwellMetrics {
                    current_dwelling: current.len(),
                    current_dwell_times: current,
                    total_completed: completed.len(),
                    avg_dwell_seconds: Self::round2(avg),
                    max_dwell_seconds: Self::round2(max),
                    min_dwell_seconds: if min.is_finite() { Self::round2(min) } else { 0.0 },
                },
            );
        }

        let overall_avg = if all_completed.is_empty() {
            0.0
        } else {
            all_completed.iter().sum::<f64>() / all_completed.len() as f64
        };
        let overall_max = all_completed.iter().cloned().fold(0.0_f64, f64::max);

        let mut inside_track_ids: Vec<u32> = inside_track_ids.into_iter().collect();
        inside_track_ids.sort_unstable();
        let mut alerted_track_ids: Vec<u32> = self.alerted_track_ids.iter().copied().collect();
        alerted_track_ids.sort_unstable();

        FeatureResult {
            feature_type: "dwell_time",
            metrics: FeatureMetrics::DwellTime(DwellTimeMetrics {
                per_region,
                overall_avg_dwell_seconds: Self::round2(overall_avg),
                overall_max_dwell_seconds: Self::round2(overall_max),
                total_dwells_recorded: all_completed.len(),
                inside_track_ids,
                alerted_track_ids,
                alerts_count: self.alerts_emitted,
            }),
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionZoneConfig;
    use crate::shared::geometry::CentroidMode;

    fn feature() -> DwellTimeFeature {
        DwellTimeFeature::new(DwellTimeConfig {
            regions: vec![RegionZoneConfig {
                id: "r1".into(),
                coords: vec![(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)],
                name: None,
            }],
            centroid: CentroidMode::MidCentre,
            min_dwell_seconds: 1.0,
            alert_threshold_seconds: 2.0,
        })
    }

    fn det(track_id: u32, x: f64, y: f64) -> TrackedDetection {
        TrackedDetection {
            track_id,
            class_id: 0,
            class_name: "person".into(),
            confidence: 0.9,
            bbox: [x - 0.01, y - 0.01, x + 0.01, y + 0.01],
            reference_point: (x, y),
        }
    }

    #[test]
    fn dwell_alert_fires_once_past_threshold() {
        let mut f = feature();
        // 30fps, threshold 2s -> 60 frames.
        for frame in 0..59 {
            let r = f.process(&[det(1, 0.5, 0.5)], frame, 30.0);
            assert!(r.alerts.is_empty(), "unexpected alert at frame {frame}");
        }
        let r = f.process(&[det(1, 0.5, 0.5)], 60, 30.0);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].kind, "dwell_time_alert");
        // Alert does not repeat on subsequent frames while still inside.
        let r2 = f.process(&[det(1, 0.5, 0.5)], 61, 30.0);
        assert!(r2.alerts.is_empty());
    }

    #[test]
    fn short_visit_below_min_dwell_is_not_recorded() {
        let mut f = feature();
        f.process(&[det(1, 0.5, 0.5)], 0, 30.0);
        // Exits after 10 frames (~0.33s) < min_dwell_seconds(1.0).
        let r = f.process(&[], 10, 30.0);
        if let FeatureMetrics::DwellTime(m) = r.metrics {
            assert_eq!(m.total_dwells_recorded, 0);
        } else {
            panic!("wrong metrics variant");
        }
    }

    #[test]
    fn completed_dwell_recorded_on_exit_past_min_dwell() {
        let mut f = feature();
        f.process(&[det(1, 0.5, 0.5)], 0, 30.0);
        // Stays 45 frames (1.5s) >= min_dwell_seconds(1.0), then exits.
        let r = f.process(&[], 45, 30.0);
        if let FeatureMetrics::DwellTime(m) = r.metrics {
            assert_eq!(m.total_dwells_recorded, 1);
            assert_eq!(m.per_region["r1"].total_completed, 1);
        } else {
            panic!("wrong metrics variant");
        }
    }
}
