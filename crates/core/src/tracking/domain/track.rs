use std::collections::VecDeque;

use crate::reid::Embedding;
use crate::shared::constants::LINE_HISTORY_CAP;
use crate::shared::geometry::Point;

/// A persistent tracked identity (spec §3).
///
/// `history` is a bounded ring of reference points (capped at
/// [`LINE_HISTORY_CAP`]) used by the line-crossing feature to detect a
/// segment intersection against the track's most recent motion, not its
/// entire lifetime.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: u32,
    pub class_id: u32,
    pub class_name: String,
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub frames_lost: usize,
    pub last_frame_idx: usize,
    pub history: VecDeque<Point>,
    pub confidence_history: VecDeque<f64>,
    pub appearance_embedding: Option<Embedding>,
}

impl Track {
    pub fn new(
        id: u32,
        class_id: u32,
        class_name: impl Into<String>,
        bbox: [f64; 4],
        confidence: f64,
        frame_idx: usize,
        reference_point: Point,
    ) -> Self {
        let mut history = VecDeque::with_capacity(LINE_HISTORY_CAP);
        history.push_back(reference_point);
        let mut confidence_history = VecDeque::with_capacity(LINE_HISTORY_CAP);
        confidence_history.push_back(confidence);
        Self {
            id,
            class_id,
            class_name: class_name.into(),
            bbox,
            confidence,
            frames_lost: 0,
            last_frame_idx: frame_idx,
            history,
            confidence_history,
            appearance_embedding: None,
        }
    }

    /// Updates the track with a fresh match, pushing a new reference point
    /// and dropping the oldest once the history cap is exceeded.
    pub fn update(&mut self, bbox: [f64; 4], confidence: f64, frame_idx: usize, reference_point: Point) {
        self.bbox = bbox;
        self.confidence = confidence;
        self.frames_lost = 0;
        self.last_frame_idx = frame_idx;
        push_capped(&mut self.history, reference_point);
        push_capped(&mut self.confidence_history, confidence);
    }

    pub fn mark_lost(&mut self) {
        self.frames_lost += 1;
    }

    /// Two most recent reference points, used to test line-segment crossing.
    pub fn last_motion(&self) -> Option<(Point, Point)> {
        if self.history.len() < 2 {
            return None;
        }
        let n = self.history.len();
        Some((self.history[n - 2], self.history[n - 1]))
    }
}

fn push_capped<T>(deque: &mut VecDeque<T>, value: T) {
    if deque.len() >= LINE_HISTORY_CAP {
        deque.pop_front();
    }
    deque.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_track_seeds_single_history_point() {
        let t = Track::new(1, 0, "person", [0.0, 0.0, 10.0, 10.0], 0.9, 0, (5.0, 5.0));
        assert_eq!(t.history.len(), 1);
        assert_eq!(t.frames_lost, 0);
    }

    #[test]
    fn update_resets_lost_counter_and_appends_history() {
        let mut t = Track::new(1, 0, "person", [0.0, 0.0, 10.0, 10.0], 0.9, 0, (5.0, 5.0));
        t.mark_lost();
        t.mark_lost();
        t.update([1.0, 1.0, 11.0, 11.0], 0.95, 1, (6.0, 6.0));
        assert_eq!(t.frames_lost, 0);
        assert_eq!(t.history.len(), 2);
    }

    #[test]
    fn history_is_capped() {
        let mut t = Track::new(1, 0, "person", [0.0, 0.0, 10.0, 10.0], 0.9, 0, (0.0, 0.0));
        for i in 1..20 {
            t.update([0.0, 0.0, 10.0, 10.0], 0.9, i, (i as f64, i as f64));
        }
        assert_eq!(t.history.len(), LINE_HISTORY_CAP);
        assert_eq!(*t.history.back().unwrap(), (19.0, 19.0));
    }

    #[test]
    fn last_motion_requires_two_points() {
        let t = Track::new(1, 0, "person", [0.0, 0.0, 10.0, 10.0], 0.9, 0, (0.0, 0.0));
        assert!(t.last_motion().is_none());
    }
}
