//! SCRFD face detector via ONNX Runtime.
//!
//! Decodes the 3-stride anchor-free SCRFD outputs into bounding boxes
//! with five-point landmarks, then applies NMS. The decode floor is
//! deliberately low: quality gating against the confidence threshold
//! happens in the scan procedure, not here.

use crate::raster;
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DET_INPUT_SIZE: usize = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
/// Minimum score decoded at all; weak detections still surface so the
/// caller can apply its own confidence threshold.
const DET_SCORE_FLOOR: f32 = 0.1;
const DET_NMS_THRESHOLD: f32 = 0.4;
const DET_STRIDES: [usize; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied by the letterbox resize, kept so decoded
/// coordinates can be mapped back to the original frame.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score, bbox, kps).
type StrideSlots = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
    /// Per-stride output slots for strides [8, 16, 32], discovered by
    /// tensor name at load time with a positional fallback.
    stride_slots: [StrideSlots; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_slots = map_output_slots(&output_names);
        tracing::debug!(?stride_slots, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_size: DET_INPUT_SIZE,
            stride_slots,
        })
    }

    /// Detect faces in a grayscale frame, sorted by confidence descending.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = self.preprocess(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (pos, &stride) in DET_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_slots[pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                self.input_size,
                &letterbox,
                &mut detections,
            );
        }

        let mut kept = nms(detections, DET_NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(kept)
    }

    /// Single-face view: the highest-confidence detection, if any.
    pub fn detect_best(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<BoundingBox>, DetectorError> {
        Ok(self.detect(frame, width, height)?.into_iter().next())
    }

    /// Letterbox-resize a grayscale frame into a normalized NCHW tensor.
    fn preprocess(&self, frame: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
        let size = self.input_size;
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (size - new_w) as f32 / 2.0;
        let pad_y = (size - new_h) as f32 / 2.0;

        let resized = raster::resize(frame, width, height, new_w, new_h);

        let x_start = pad_x.floor() as usize;
        let y_start = pad_y.floor() as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let inside = y >= y_start && y < y_start + new_h && x >= x_start && x < x_start + new_w;
                let pixel = if inside {
                    resized[(y - y_start) * new_w + (x - x_start)] as f32
                } else {
                    DET_MEAN // padding normalizes to 0.0
                };
                let normalized = (pixel - DET_MEAN) / DET_STD;
                // Grayscale replicated across the three input channels.
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        (tensor, Letterbox { scale, pad_x, pad_y })
    }
}

/// Map output tensors to stride slots by name ("score_8", "bbox_16",
/// "kps_32", ...). Models exporting generic numeric names fall back to
/// the standard positional layout: [0-2]=scores, [3-5]=bboxes, [6-8]=kps.
fn map_output_slots(names: &[String]) -> [StrideSlots; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let all_named = DET_STRIDES.iter().all(|&stride| {
        find("score", stride).is_some()
            && find("bbox", stride).is_some()
            && find("kps", stride).is_some()
    });

    if all_named {
        std::array::from_fn(|i| {
            let stride = DET_STRIDES[i];
            (
                find("score", stride).unwrap(),
                find("bbox", stride).unwrap(),
                find("kps", stride).unwrap(),
            )
        })
    } else {
        tracing::info!(?names, "SCRFD output names not recognized, using positional mapping");
        [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
    }
}

/// Decode one stride level's anchors into `out`, mapping coordinates
/// back through the letterbox into original-frame space.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    out: &mut Vec<BoundingBox>,
) {
    let grid = input_size / stride;
    let num_anchors = grid * grid * DET_ANCHORS_PER_CELL;

    let unmap = |v: f32, pad: f32| (v - pad) / letterbox.scale;

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= DET_SCORE_FLOOR {
            continue;
        }

        let cell = idx / DET_ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        // bbox offsets are [left, top, right, bottom] distances in stride units
        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let x1 = unmap(anchor_cx - bboxes[off] * stride as f32, letterbox.pad_x);
        let y1 = unmap(anchor_cy - bboxes[off + 1] * stride as f32, letterbox.pad_y);
        let x2 = unmap(anchor_cx + bboxes[off + 2] * stride as f32, letterbox.pad_x);
        let y2 = unmap(anchor_cy + bboxes[off + 3] * stride as f32, letterbox.pad_y);

        let kps_off = idx * 10;
        let landmarks = if kps_off + 9 < kps.len() {
            let mut points = [(0.0f32, 0.0f32); 5];
            for (i, point) in points.iter_mut().enumerate() {
                let lx = anchor_cx + kps[kps_off + i * 2] * stride as f32;
                let ly = anchor_cy + kps[kps_off + i * 2 + 1] * stride as f32;
                *point = (unmap(lx, letterbox.pad_x), unmap(ly, letterbox.pad_y));
            }
            Some(points)
        } else {
            None
        };

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-maximum suppression over IoU.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
            landmarks: None,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_bbox(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_bbox(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_bbox(5.0, 0.0, 10.0, 10.0, 1.0);
        // intersection 50, union 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_bbox(0.0, 0.0, 100.0, 100.0, 0.9),
            make_bbox(5.0, 5.0, 100.0, 100.0, 0.8),
            make_bbox(200.0, 200.0, 50.0, 50.0, 0.7),
        ];
        let kept = nms(detections, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_disjoint() {
        let detections = vec![
            make_bbox(0.0, 0.0, 10.0, 10.0, 0.9),
            make_bbox(50.0, 50.0, 10.0, 10.0, 0.8),
        ];
        assert_eq!(nms(detections, 0.4).len(), 2);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let (width, height) = (320.0f32, 240.0f32);
        let scale = (640.0 / width).min(640.0 / height);
        let pad_x = (640.0 - (width * scale).round()) / 2.0;
        let pad_y = (640.0 - (height * scale).round()) / 2.0;
        let lb = Letterbox { scale, pad_x, pad_y };

        let (orig_x, orig_y) = (100.0f32, 50.0f32);
        let boxed_x = orig_x * scale + pad_x;
        let boxed_y = orig_y * scale + pad_y;

        let back_x = (boxed_x - lb.pad_x) / lb.scale;
        let back_y = (boxed_y - lb.pad_y) / lb.scale;
        assert!((back_x - orig_x).abs() < 0.1);
        assert!((back_y - orig_y).abs() < 0.1);
    }

    #[test]
    fn test_map_output_slots_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8", "kps_16",
            "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let slots = map_output_slots(&names);
        assert_eq!(slots[0], (0, 3, 6));
        assert_eq!(slots[1], (1, 4, 7));
        assert_eq!(slots[2], (2, 5, 8));
    }

    #[test]
    fn test_map_output_slots_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let slots = map_output_slots(&names);
        assert_eq!(slots[0], (2, 0, 1));
        assert_eq!(slots[1], (5, 3, 4));
        assert_eq!(slots[2], (8, 6, 7));
    }

    #[test]
    fn test_map_output_slots_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(map_output_slots(&names), [(0, 3, 6), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn test_decode_stride_scales_and_unmaps() {
        // One anchor above the floor at stride 8, grid cell (1, 1),
        // identity letterbox.
        let grid = 640 / 8;
        let num = grid * grid * DET_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; num];
        let mut bboxes = vec![0.0f32; num * 4];
        let kps = vec![0.0f32; num * 10];

        let idx = (grid + 1) * DET_ANCHORS_PER_CELL; // cell (x=1, y=1), anchor 0
        scores[idx] = 0.8;
        // offsets of 1 stride unit in every direction → 16x16 box
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let mut out = Vec::new();
        decode_stride(&scores, &bboxes, &kps, 8, 640, &lb, &mut out);

        assert_eq!(out.len(), 1);
        let det = &out[0];
        assert!((det.x - 0.0).abs() < 1e-4);
        assert!((det.y - 0.0).abs() < 1e-4);
        assert!((det.width - 16.0).abs() < 1e-4);
        assert!((det.height - 16.0).abs() < 1e-4);
        assert!((det.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_stride_ignores_floor_scores() {
        let grid = 640 / 32;
        let num = grid * grid * DET_ANCHORS_PER_CELL;
        let scores = vec![DET_SCORE_FLOOR; num]; // at the floor, not above
        let bboxes = vec![1.0f32; num * 4];
        let kps = vec![0.0f32; num * 10];

        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let mut out = Vec::new();
        decode_stride(&scores, &bboxes, &kps, 32, 640, &lb, &mut out);
        assert!(out.is_empty());
    }
}
