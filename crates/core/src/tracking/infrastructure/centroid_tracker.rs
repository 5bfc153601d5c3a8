//! Centroid nearest-neighbor fallback tracker.
//!
//! Used when detections don't carry enough signal for IoU association (small
//! or sparse objects, low frame rate) — matches tracks to detections by
//! reference-point distance, optionally blended with appearance similarity
//! when re-ID is enabled (spec §4.1, grounded in the centroid-matching path
//! of `original_source/yoi/tracking/object_tracker.py::_update_with_centroid`).
//! Weighted match score:
//! `0.65 * (1 - norm_dist) + 0.35 * appearance_similarity`, gated at
//! `max_distance`; the gate widens to `max_distance * reid_gate_multiplier`
//! only when the appearance similarity alone already clears
//! `reid_similarity_thresh`, so a strong re-ID match can survive a bigger
//! jump than position alone would allow.
use crate::config::TrackerConfig;
use crate::detection::domain::detector::Detection;
use crate::reid::{cosine_similarity, AppearanceEmbedder, Embedding};
use crate::shared::frame::Frame;
use crate::shared::geometry::{distance, reference_point, CentroidMode};
use crate::tracking::domain::track::Track;
use crate::tracking::domain::tracker::IdentityTracker;

pub struct CentroidTracker {
    tracks: Vec<Track>,
    next_id: u32,
    config: TrackerConfig,
    centroid_mode: CentroidMode,
    embedder: Option<Box<dyn AppearanceEmbedder>>,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig, centroid_mode: CentroidMode) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            config,
            centroid_mode,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Box<dyn AppearanceEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn embed(&self, frame: Option<&Frame>, bbox: [f64; 4]) -> Option<Embedding> {
        let embedder = self.embedder.as_ref()?;
        let frame = frame?;
        let (rgb, w, h) = crop(frame, bbox)?;
        Some(embedder.embed(&rgb, w, h))
    }
}

impl IdentityTracker for CentroidTracker {
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>, frame_idx: usize) -> Vec<Track> {
        let det_points: Vec<_> = detections
            .iter()
            .map(|d| reference_point(d.bbox, self.centroid_mode))
            .collect();
        let det_embeddings: Vec<Option<Embedding>> =
            detections.iter().map(|d| self.embed(frame, d.bbox)).collect();

        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; detections.len()];

        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            let track_point = track
                .history
                .back()
                .copied()
                .unwrap_or(reference_point(track.bbox, self.centroid_mode));
            for (di, det) in detections.iter().enumerate() {
                if det.class_id != track.class_id {
                    continue;
                }
                let dist = distance(track_point, det_points[di]);

                let reid_score = match (&track.appearance_embedding, &det_embeddings[di]) {
                    (Some(track_emb), Some(det_emb)) => cosine_similarity(track_emb, det_emb),
                    _ => 0.0,
                };

                let within_gate = dist <= self.config.max_distance
                    || (reid_score >= self.config.reid_similarity_thresh
                        && dist <= self.config.max_distance * self.config.centroid_reid_gate_multiplier);
                if !within_gate {
                    continue;
                }

                let norm_dist = (dist / self.config.max_distance.max(f64::EPSILON)).min(1.0);
                let distance_score = 1.0 - norm_dist;
                let score = self.config.centroid_distance_weight * distance_score
                    + self.config.centroid_reid_weight * reid_score;
                candidates.push((ti, di, score));
            }
        }
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        for (ti, di, _) in candidates {
            if track_matched[ti] || det_matched[di] {
                continue;
            }
            track_matched[ti] = true;
            det_matched[di] = true;
            let det = &detections[di];
            let rp = reference_point(det.bbox, self.centroid_mode);
            self.tracks[ti].update(det.bbox, det.confidence, frame_idx, rp);
            if let Some(new_emb) = &det_embeddings[di] {
                self.tracks[ti].appearance_embedding =
                    Some(match &self.tracks[ti].appearance_embedding {
                        Some(prev) => ema_update(prev, new_emb, self.config.reid_momentum),
                        None => new_emb.clone(),
                    });
            }
        }

        for (di, det) in detections.iter().enumerate() {
            if !det_matched[di] {
                let rp = reference_point(det.bbox, self.centroid_mode);
                let mut track = Track::new(
                    self.next_id,
                    det.class_id,
                    det.class_name.clone(),
                    det.bbox,
                    det.confidence,
                    frame_idx,
                    rp,
                );
                track.appearance_embedding = det_embeddings[di].clone();
                self.next_id += 1;
                self.tracks.push(track);
            }
        }

        for (i, matched) in track_matched.iter().enumerate() {
            if !matched {
                self.tracks[i].mark_lost();
            }
        }
        let max_lost = self.config.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        self.tracks.clone()
    }
}

/// Clips `bbox` (pixel-space `[x1,y1,x2,y2]`) to frame bounds and copies the
/// RGB sub-rectangle out. Returns `None` for a degenerate (empty) crop, per
/// spec §4.1.
fn crop(frame: &Frame, bbox: [f64; 4]) -> Option<(Vec<u8>, u32, u32)> {
    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let x1 = (bbox[0].floor() as i64).clamp(0, fw);
    let y1 = (bbox[1].floor() as i64).clamp(0, fh);
    let x2 = (bbox[2].ceil() as i64).clamp(0, fw);
    let y2 = (bbox[3].ceil() as i64).clamp(0, fh);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    let w = (x2 - x1) as u32;
    let h = (y2 - y1) as u32;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;
    let data = frame.data();

    let mut out = Vec::with_capacity((w as usize) * (h as usize) * 3);
    for y in y1..y2 {
        for x in x1..x2 {
            let offset = ((y as usize) * src_w + (x as usize)) * channels;
            if offset + 2 >= data.len() {
                return None;
            }
            out.push(data[offset]);
            out.push(data[offset + 1]);
            out.push(data[offset + 2]);
        }
    }
    Some((out, w, h))
}

fn ema_update(prev: &[f64], current: &[f64], momentum: f64) -> Vec<f64> {
    if prev.len() != current.len() || current.is_empty() {
        return prev.to_vec();
    }
    let blended: Vec<f64> = prev
        .iter()
        .zip(current.iter())
        .map(|(p, c)| (1.0 - momentum) * p + momentum * c)
        .collect();
    let norm: f64 = blended.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        blended.iter().map(|v| v / norm).collect()
    } else {
        blended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reid::HistogramEmbedder;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(0, "person", 0.9, [x1, y1, x2, y2])
    }

    fn tracker() -> CentroidTracker {
        let mut cfg = TrackerConfig::default();
        cfg.max_distance = 0.5;
        CentroidTracker::new(cfg, CentroidMode::MidCentre)
    }

    #[test]
    fn first_frame_spawns_new_tracks() {
        let mut t = tracker();
        let tracks = t.update(&[det(0.0, 0.0, 0.1, 0.1), det(0.8, 0.8, 0.9, 0.9)], None, 0);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn nearby_detection_keeps_same_id() {
        let mut t = tracker();
        let t1 = t.update(&[det(0.0, 0.0, 0.1, 0.1)], None, 0);
        let id = t1[0].id;
        let t2 = t.update(&[det(0.01, 0.01, 0.11, 0.11)], None, 1);
        assert_eq!(t2[0].id, id);
    }

    #[test]
    fn far_detection_spawns_new_track_without_reid() {
        let mut t = tracker();
        let t1 = t.update(&[det(0.0, 0.0, 0.1, 0.1)], None, 0);
        let id = t1[0].id;
        let t2 = t.update(&[det(0.9, 0.9, 1.0, 1.0)], None, 1);
        assert_ne!(t2[0].id, id);
    }

    #[test]
    fn crop_clips_to_frame_bounds() {
        let data = vec![7u8; 10 * 10 * 3];
        let frame = Frame::new(data, 10, 10, 3, 0);
        let (rgb, w, h) = crop(&frame, [-5.0, -5.0, 5.0, 5.0]).unwrap();
        assert_eq!((w, h), (5, 5));
        assert_eq!(rgb.len(), 5 * 5 * 3);
    }

    #[test]
    fn degenerate_crop_is_none() {
        let data = vec![0u8; 10 * 10 * 3];
        let frame = Frame::new(data, 10, 10, 3, 0);
        assert!(crop(&frame, [3.0, 3.0, 3.0, 10.0]).is_none());
    }

    #[test]
    fn ema_update_blends_and_renormalizes() {
        let prev = vec![1.0, 0.0];
        let cur = vec![0.0, 1.0];
        let updated = ema_update(&prev, &cur, 0.5);
        let norm: f64 = updated.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reid_allows_wider_gate_on_strong_appearance_match() {
        let mut cfg = TrackerConfig::default();
        cfg.max_distance = 0.05;
        cfg.reid_similarity_thresh = 0.5;
        cfg.centroid_reid_gate_multiplier = 20.0;
        let mut t = CentroidTracker::new(cfg, CentroidMode::MidCentre).with_embedder(Box::new(HistogramEmbedder::new()));

        let data = vec![200u8; 100 * 100 * 3];
        let frame = Frame::new(data, 100, 100, 3, 0);

        let t1 = t.update(&[det(0.0, 0.0, 0.2, 0.2)], Some(&frame), 0);
        let id = t1[0].id;
        // Detection jumps far (normalized), but the crop is identical in
        // color, so appearance similarity should allow re-matching.
        let t2 = t.update(&[det(0.5, 0.5, 0.7, 0.7)], Some(&frame), 1);
        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].id, id);
    }
}
