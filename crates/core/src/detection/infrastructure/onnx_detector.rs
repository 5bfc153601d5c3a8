//! ONNX Runtime–backed detector (interface boundary only, per spec §1/§6).
//!
//! This is the one adapter in the workspace where the underlying model
//! topology (preprocessing, output layout, NMS) is a genuine engineering
//! detail rather than core analytics logic — the Identity Tracker and
//! Feature state machines downstream only ever see the `Detector` trait's
//! `Vec<Detection>` output.
use std::path::Path;

use crate::detection::domain::detector::{Detection, Detector};
use crate::shared::frame::Frame;

const DEFAULT_INPUT_SIZE: u32 = 640;
const NMS_IOU_THRESH: f64 = 0.45;

/// Generic multi-class YOLO-family detector over an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    class_names: Vec<String>,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads a YOLO-family ONNX model. `class_names` indexes detections'
    /// class ids to names; input resolution is read from the model's input
    /// shape (NCHW), falling back to 640 when dynamic.
    pub fn new(
        model_path: &Path,
        confidence: f64,
        class_names: Vec<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            class_names,
            input_size,
        })
    }

    fn class_name(&self, class_id: u32) -> String {
        self.class_names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

impl Detector for OnnxYoloDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.is_empty() {
            return Err("detector model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // YOLO output is [1, num_features, num_dets] (transposed) or
        // [1, num_dets, num_features].
        let (num_dets, num_feats) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1])
            } else {
                (shape[1], shape[2])
            }
        } else {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        };
        let transposed = shape.len() == 3 && shape[1] < shape[2];
        let data = tensor.as_slice().ok_or("cannot get tensor slice")?;

        let mut raw = Vec::new();
        for i in 0..num_dets {
            let row = if transposed {
                (0..num_feats)
                    .map(|f| data[f * num_dets + i])
                    .collect::<Vec<f32>>()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            // row: [cx, cy, w, h, class0_score, class1_score, ...]
            if row.len() < 5 {
                continue;
            }
            let (class_id, conf) = row[4..]
                .iter()
                .enumerate()
                .map(|(i, &s)| (i as u32, s as f64))
                .fold((0u32, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            if conf < self.confidence {
                continue;
            }

            let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            let x1 = ((cx - w / 2.0) - pad_x as f64) / scale;
            let y1 = ((cy - h / 2.0) - pad_y as f64) / scale;
            let x2 = ((cx + w / 2.0) - pad_x as f64) / scale;
            let y2 = ((cy + h / 2.0) - pad_y as f64) / scale;

            raw.push(Detection::new(class_id, self.class_name(class_id), conf, [x1, y1, x2, y2]));
        }

        Ok(nms(raw, NMS_IOU_THRESH))
    }
}

fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_w = frame.width() as usize;
    let src_h = frame.height() as usize;
    let src = frame.data();

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            let offset = (src_y * src_w + src_x) * 3;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[offset + c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

fn nms(mut dets: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];
    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if dets[i].class_id == dets[j].class_id
                && super::math::bbox_iou(&dets[i].bbox, &dets[j].bbox) > iou_thresh
            {
                suppressed[j] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_preserves_aspect_ratio() {
        let data = vec![128u8; 200 * 100 * 3];
        let frame = Frame::new(data, 200, 100, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn nms_suppresses_same_class_overlap() {
        let dets = vec![
            Detection::new(0, "person", 0.9, [0.0, 0.0, 100.0, 100.0]),
            Detection::new(0, "person", 0.8, [5.0, 5.0, 105.0, 105.0]),
        ];
        let kept = nms(dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn nms_keeps_different_classes() {
        let dets = vec![
            Detection::new(0, "person", 0.9, [0.0, 0.0, 100.0, 100.0]),
            Detection::new(1, "car", 0.8, [5.0, 5.0, 105.0, 105.0]),
        ];
        let kept = nms(dets, 0.3);
        assert_eq!(kept.len(), 2);
    }
}
