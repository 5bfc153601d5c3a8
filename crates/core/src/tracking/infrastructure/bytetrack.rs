//! ByteTrack-style two-stage IoU associator (spec §4.1).
//!
//! High-confidence detections are matched first against all active tracks;
//! low-confidence detections are then matched only against tracks that stage
//! one left unmatched (e.g. occluded or blurred subjects still worth keeping
//! alive). Unmatched high-confidence detections above `new_track_thresh`
//! spawn new tracks; low-confidence ones never do.
use std::collections::HashMap;

use crate::config::TrackerConfig;
use crate::detection::domain::detector::Detection;
use crate::detection::infrastructure::math::bbox_iou;
use crate::shared::frame::Frame;
use crate::shared::geometry::{reference_point, CentroidMode};
use crate::tracking::domain::track::Track;
use crate::tracking::domain::tracker::IdentityTracker;

pub struct ByteTrackAssociator {
    tracks: Vec<Track>,
    next_id: u32,
    config: TrackerConfig,
    centroid_mode: CentroidMode,
}

impl ByteTrackAssociator {
    pub fn new(config: TrackerConfig, centroid_mode: CentroidMode) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            config,
            centroid_mode,
        }
    }

    fn cost(&self, track: &Track, det: &Detection) -> f64 {
        let iou = bbox_iou(&track.bbox, &det.bbox);
        if self.config.fuse_score {
            iou * det.confidence
        } else {
            iou
        }
    }
}

impl IdentityTracker for ByteTrackAssociator {
    fn update(&mut self, detections: &[Detection], _frame: Option<&Frame>, frame_idx: usize) -> Vec<Track> {
        let mut high = Vec::new();
        let mut low = Vec::new();
        for (i, det) in detections.iter().enumerate() {
            if det.confidence >= self.config.high_thresh {
                high.push(i);
            } else if det.confidence >= self.config.low_thresh {
                low.push(i);
            }
        }

        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; detections.len()];

        let matches_high = greedy_match(
            &self.tracks,
            &track_matched,
            &high,
            detections,
            self.config.match_thresh,
            |t, d| self.cost(t, d),
        );
        for (ti, di) in matches_high {
            apply_match(&mut self.tracks[ti], &detections[di], frame_idx, self.centroid_mode);
            track_matched[ti] = true;
            det_matched[di] = true;
        }

        let matches_low = greedy_match(
            &self.tracks,
            &track_matched,
            &low,
            detections,
            self.config.match_thresh,
            |t, d| self.cost(t, d),
        );
        for (ti, di) in matches_low {
            apply_match(&mut self.tracks[ti], &detections[di], frame_idx, self.centroid_mode);
            track_matched[ti] = true;
            det_matched[di] = true;
        }

        for &di in &high {
            if !det_matched[di] && detections[di].confidence >= self.config.new_track_thresh {
                let det = &detections[di];
                let rp = reference_point(det.bbox, self.centroid_mode);
                self.tracks.push(Track::new(
                    self.next_id,
                    det.class_id,
                    det.class_name.clone(),
                    det.bbox,
                    det.confidence,
                    frame_idx,
                    rp,
                ));
                self.next_id += 1;
            }
        }

        for (i, matched) in track_matched.iter().enumerate() {
            if !matched {
                self.tracks[i].mark_lost();
            }
        }
        let max_lost = self.config.max_lost_frames.max(self.config.track_buffer);
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        self.tracks.clone()
    }
}

fn apply_match(track: &mut Track, det: &Detection, frame_idx: usize, mode: CentroidMode) {
    let rp = reference_point(det.bbox, mode);
    track.update(det.bbox, det.confidence, frame_idx, rp);
}

/// Greedy highest-cost-first matching between active (unmatched) tracks and
/// a subset of detections, gated by `thresh`.
fn greedy_match(
    tracks: &[Track],
    already_matched: &[bool],
    det_indices: &[usize],
    detections: &[Detection],
    thresh: f64,
    cost_fn: impl Fn(&Track, &Detection) -> f64,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (ti, track) in tracks.iter().enumerate() {
        if already_matched[ti] {
            continue;
        }
        for &di in det_indices {
            let cost = cost_fn(track, &detections[di]);
            if cost >= thresh {
                pairs.push((ti, di, cost));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks: HashMap<usize, bool> = HashMap::new();
    let mut used_dets: HashMap<usize, bool> = HashMap::new();
    let mut matches = Vec::new();
    for (ti, di, _) in pairs {
        if !used_tracks.contains_key(&ti) && !used_dets.contains_key(&di) {
            used_tracks.insert(ti, true);
            used_dets.insert(di, true);
            matches.push((ti, di));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, conf: f64) -> Detection {
        Detection::new(0, "person", conf, [x1, y1, x2, y2])
    }

    fn tracker() -> ByteTrackAssociator {
        let mut cfg = TrackerConfig::default();
        cfg.match_thresh = 0.1;
        ByteTrackAssociator::new(cfg, CentroidMode::MidCentre)
    }

    #[test]
    fn new_high_confidence_detections_spawn_distinct_ids() {
        let mut t = tracker();
        let tracks = t.update(
            &[
                det(0.0, 0.0, 50.0, 50.0, 0.9),
                det(200.0, 200.0, 250.0, 250.0, 0.9),
            ],
            None,
            0,
        );
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].id, tracks[1].id);
    }

    #[test]
    fn low_confidence_does_not_spawn_track() {
        let mut t = tracker();
        let tracks = t.update(&[det(0.0, 0.0, 50.0, 50.0, 0.05)], None, 0);
        assert!(tracks.is_empty());
    }

    #[test]
    fn id_persists_across_frames_on_overlap() {
        let mut t = tracker();
        let t1 = t.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)], None, 0);
        let id = t1[0].id;
        let t2 = t.update(&[det(12.0, 12.0, 62.0, 62.0, 0.9)], None, 1);
        assert_eq!(t2[0].id, id);
    }

    #[test]
    fn low_confidence_detection_matches_existing_track() {
        let mut t = tracker();
        let t1 = t.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)], None, 0);
        let id = t1[0].id;
        let t2 = t.update(&[det(12.0, 12.0, 62.0, 62.0, 0.15)], None, 1);
        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].id, id);
    }

    #[test]
    fn track_evicted_after_max_lost_frames() {
        let mut cfg = TrackerConfig::default();
        cfg.match_thresh = 0.1;
        cfg.max_lost_frames = 2;
        cfg.track_buffer = 2;
        let mut t = ByteTrackAssociator::new(cfg, CentroidMode::MidCentre);
        t.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)], None, 0);
        t.update(&[], None, 1);
        t.update(&[], None, 2);
        let tracks = t.update(&[], None, 3);
        assert!(tracks.is_empty());
    }
}
