//! Re-ID stabilization layer (spec §4.1 "Re-ID layer (optional, wraps either
//! implementation)").
//!
//! Wraps an inner [`IdentityTracker`] (typically [`super::bytetrack::ByteTrackAssociator`])
//! whose raw ids are not guaranteed stable across an occlusion long enough to
//! evict the track: when the inner tracker spawns a raw id this layer hasn't
//! seen before, it is checked against recently-dormant stable tracks of the
//! same class by appearance cosine similarity before a fresh stable id is
//! minted. Grounded in
//! `original_source/yoi/tracking/object_tracker.py::_assign_stable_track_id`.
use std::collections::HashMap;

use crate::config::TrackerConfig;
use crate::detection::domain::detector::Detection;
use crate::reid::{cosine_similarity, AppearanceEmbedder, Embedding};
use crate::shared::frame::Frame;
use crate::tracking::domain::track::Track;
use crate::tracking::domain::tracker::IdentityTracker;

struct DormantEntry {
    stable_id: u32,
    class_id: u32,
    embedding: Embedding,
    last_frame_idx: usize,
}

pub struct ReidLayer {
    inner: Box<dyn IdentityTracker>,
    embedder: Box<dyn AppearanceEmbedder>,
    similarity_thresh: f64,
    momentum: f64,
    /// Raw (inner-tracker) id -> stable id, for raw ids currently mapped.
    raw_to_stable: HashMap<u32, u32>,
    /// Running embedding per stable id.
    embeddings: HashMap<u32, Embedding>,
    /// Class id last observed for each stable id, for dormant-archive lookup.
    stable_class: HashMap<u32, u32>,
    /// Stable tracks evicted by the inner tracker this run, kept around for
    /// re-identification until `dormant_horizon` frames have passed.
    dormant: Vec<DormantEntry>,
    dormant_horizon: usize,
    next_stable_id: u32,
}

impl ReidLayer {
    pub fn new(inner: Box<dyn IdentityTracker>, embedder: Box<dyn AppearanceEmbedder>, config: &TrackerConfig) -> Self {
        Self {
            inner,
            embedder,
            similarity_thresh: config.reid_similarity_thresh,
            momentum: config.reid_momentum,
            raw_to_stable: HashMap::new(),
            embeddings: HashMap::new(),
            stable_class: HashMap::new(),
            dormant: Vec::new(),
            dormant_horizon: config.max_lost_frames.max(config.track_buffer) * 4,
            next_stable_id: 1,
        }
    }

    fn embed(&self, frame: Option<&Frame>, bbox: [f64; 4]) -> Option<Embedding> {
        let frame = frame?;
        let (rgb, w, h) = crop(frame, bbox)?;
        Some(self.embedder.embed(&rgb, w, h))
    }
}

impl IdentityTracker for ReidLayer {
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>, frame_idx: usize) -> Vec<Track> {
        let raw_tracks = self.inner.update(detections, frame, frame_idx);
        let raw_ids_this_frame: Vec<u32> = raw_tracks.iter().map(|t| t.id).collect();

        let mut stable_tracks = Vec::with_capacity(raw_tracks.len());

        for raw in raw_tracks {
            let embedding = self.embed(frame, raw.bbox);

            let stable_id = if let Some(&sid) = self.raw_to_stable.get(&raw.id) {
                sid
            } else {
                let best = embedding.as_ref().and_then(|emb| {
                    self.dormant
                        .iter()
                        .filter(|d| d.class_id == raw.class_id)
                        .map(|d| (d.stable_id, cosine_similarity(emb, &d.embedding)))
                        .filter(|(_, sim)| *sim >= self.similarity_thresh)
                        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                });

                let sid = match best {
                    Some((stable_id, _)) => {
                        self.dormant.retain(|d| d.stable_id != stable_id);
                        stable_id
                    }
                    None => {
                        let sid = self.next_stable_id;
                        self.next_stable_id += 1;
                        sid
                    }
                };
                self.raw_to_stable.insert(raw.id, sid);
                sid
            };

            if let Some(new_emb) = &embedding {
                let updated = match self.embeddings.get(&stable_id) {
                    Some(prev) => ema_update(prev, new_emb, self.momentum),
                    None => new_emb.clone(),
                };
                self.embeddings.insert(stable_id, updated);
            }
            self.stable_class.insert(stable_id, raw.class_id);

            let mut stable = raw;
            stable.id = stable_id;
            stable.appearance_embedding = self.embeddings.get(&stable_id).cloned();
            stable_tracks.push(stable);
        }

        // Any raw id no longer reported by the inner tracker has been
        // evicted there; archive its stable identity as dormant so a
        // reappearance can still be re-identified.
        self.raw_to_stable.retain(|raw_id, stable_id| {
            if raw_ids_this_frame.contains(raw_id) {
                true
            } else {
                if let Some(embedding) = self.embeddings.get(stable_id) {
                    let class_id = self.stable_class.get(stable_id).copied().unwrap_or(0);
                    self.dormant.push(DormantEntry {
                        stable_id: *stable_id,
                        class_id,
                        embedding: embedding.clone(),
                        last_frame_idx: frame_idx,
                    });
                }
                false
            }
        });
        self.dormant.retain(|d| frame_idx.saturating_sub(d.last_frame_idx) <= self.dormant_horizon);

        stable_tracks
    }
}

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
