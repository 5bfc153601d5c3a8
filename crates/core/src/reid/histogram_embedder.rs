//! HSV histogram appearance embedder.
//!
//! A fast, model-free re-ID descriptor: bucket each pixel of a track's crop
//! into a 16×16×16 Hue/Saturation/Value histogram, flatten and L2-normalize
//! it. No ML weights required — useful when a dedicated re-ID network isn't
//! configured (spec §4.1, Open Question (a)), at the cost of being fooled by
//! similarly-colored but distinct subjects.
use crate::reid::{AppearanceEmbedder, Embedding};
use crate::shared::constants::{HIST_HUE_BINS, HIST_SAT_BINS, HIST_VAL_BINS};

pub struct HistogramEmbedder;

impl HistogramEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppearanceEmbedder for HistogramEmbedder {
    fn embed(&self, rgb_data: &[u8], width: u32, height: u32) -> Embedding {
        compute_histogram(rgb_data, width, height)
    }
}

fn compute_histogram(rgb_data: &[u8], width: u32, height: u32) -> Embedding {
    let num_pixels = (width as usize) * (height as usize);
    let mut hist = vec![0.0f64; HIST_HUE_BINS * HIST_SAT_BINS * HIST_VAL_BINS];
    let mut count = 0usize;

    for i in 0..num_pixels {
        let offset = i * 3;
        if offset + 2 >= rgb_data.len() {
            break;
        }
        let r = rgb_data[offset] as f64 / 255.0;
        let g = rgb_data[offset + 1] as f64 / 255.0;
        let b = rgb_data[offset + 2] as f64 / 255.0;

        let (h, s, v) = rgb_to_hsv(r, g, b);

        let h_bin = ((h / 360.0) * HIST_HUE_BINS as f64).min(HIST_HUE_BINS as f64 - 1.0) as usize;
        let s_bin = (s * HIST_SAT_BINS as f64).min(HIST_SAT_BINS as f64 - 1.0) as usize;
        let v_bin = (v * HIST_VAL_BINS as f64).min(HIST_VAL_BINS as f64 - 1.0) as usize;

        hist[(h_bin * HIST_SAT_BINS + s_bin) * HIST_VAL_BINS + v_bin] += 1.0;
        count += 1;
    }

    if count == 0 {
        return hist;
    }

    let norm: f64 = hist.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for v in &mut hist {
            *v /= norm;
        }
    }
    hist
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if (max - r).abs() < f64::EPSILON {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}
