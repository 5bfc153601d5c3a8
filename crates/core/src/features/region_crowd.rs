//! Region-crowd occupancy feature (spec §4.3), grounded in
//! `original_source/yoi/features/region_crowd.py`.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::RegionCrowdConfig;
use crate::features::{Alert, Feature, FeatureMetrics, FeatureResult, TrackedDetection};
use crate::shared::geometry::point_in_polygon;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrowdStatus {
    Normal,
    Warning,
    Critical,
}

impl CrowdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdStatus::Normal => "normal",
            CrowdStatus::Warning => "warning",
            CrowdStatus::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    pub current_count: usize,
    pub max_count: usize,
    pub active_tracks: Vec<u32>,
    pub status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionCrowdMetrics {
    pub total_current: usize,
    pub total_max: usize,
    pub warning_threshold: u32,
    pub critical_threshold: u32,
    pub inside_track_ids: Vec<u32>,
    pub per_region: HashMap<String, RegionMetrics>,
    pub alerts_count: usize,
}

impl Default for RegionMetrics {
    fn default() -> Self {
        Self {
            current_count: 0,
            max_count: 0,
            active_tracks: Vec::new(),
            status: "normal".to_string(),
        }
    }
}

pub struct RegionCrowdFeature {
    config: RegionCrowdConfig,
    max_counts: HashMap<String, usize>,
    last_alert_frame: HashMap<String, usize>,
    fps: f64,
    alerts_emitted: usize,
}

impl RegionCrowdFeature {
    pub fn new(config: RegionCrowdConfig) -> Self {
        let mut max_counts = HashMap::new();
        for region in &config.regions {
            max_counts.insert(region.id.clone(), 0);
        }
        Self {
            config,
            max_counts,
            last_alert_frame: HashMap::new(),
            fps: 30.0,
            alerts_emitted: 0,
        }
    }

    fn status_for(&self, count: usize) -> CrowdStatus {
        if count as u32 >= self.config.critical_threshold {
            CrowdStatus::Critical
        } else if count as u32 >= self.config.warning_threshold {
            CrowdStatus::Warning
        } else {
            CrowdStatus::Normal
        }
    }

    fn cooldown_frames(&self) -> usize {
        (self.config.cooldown_seconds * self.fps.max(1.0)).round() as usize
    }
}

impl Feature for RegionCrowdFeature {
    fn process(&mut self, detections: &[TrackedDetection], frame_idx: usize, fps: f64) -> FeatureResult {
        if fps > 0.0 {
            self.fps = fps;
        }
        let mut alerts = Vec::new();
        let mut per_region: HashMap<String, RegionMetrics> = HashMap::new();
        let mut inside_track_ids: Vec<u32> = Vec::new();

        for region in &self.config.regions {
            let mut active_tracks: Vec<u32> = detections
                .iter()
                .filter(|d| point_in_polygon(d.reference_point, &region.coords))
                .map(|d| d.track_id)
                .collect();
            active_tracks.sort_unstable();
            active_tracks.dedup();
            inside_track_ids.extend(active_tracks.iter().copied());

            let current_count = active_tracks.len();
            let max_count = self.max_counts.entry(region.id.clone()).or_insert(0);
            if current_count > *max_count {
                *max_count = current_count;
            }
            let status = self.status_for(current_count);

            if current_count as u32 >= self.config.alert_threshold {
                let cooldown = self.cooldown_frames();
                let last = self.last_alert_frame.get(&region.id).copied();
                let emit = match last {
                    Some(prev) => frame_idx.saturating_sub(prev) >= cooldown,
                    None => true,
                };
                if emit {
                    self.last_alert_frame.insert(region.id.clone(), frame_idx);
                    self.alerts_emitted += 1;
                    alerts.push(Alert {
                        kind: "region_crowd_alert".into(),
                        zone_id: region.id.clone(),
                        frame: frame_idx,
                        track_id: None,
                        count: Some(current_count as u32),
                        threshold: Some(self.config.alert_threshold as f64),
                        dwell_seconds: None,
                    });
                }
            }

            per_region.insert(
                region.id.clone(),
                RegionMetrics {
                    current_count,
                    max_count: *max_count,
                    active_tracks,
                    status: status.as_str().to_string(),
                },
            );
        }

        inside_track_ids.sort_unstable();
        inside_track_ids.dedup();

        let total_current: usize = per_region.values().map(|m| m.current_count).sum();
        let total_max: usize = self.max_counts.values().copied().sum();

        FeatureResult {
            feature_type: "region_crowd",
            metrics: FeatureMetrics::RegionCrowd(RegionCrowdMetrics {
                total_current,
                total_max,
                warning_threshold: self.config.warning_threshold,
                critical_threshold: self.config.critical_threshold,
                inside_track_ids,
                per_region,
                alerts_count: self.alerts_emitted,
            }),
            alerts,
        }
    }
}
