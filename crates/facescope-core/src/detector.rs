//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the SCRFD (Sample and Computation Redistribution for Efficient Face
//! Detection) model over a letterboxed RGB image, decodes the three anchor-free
//! stride heads, and suppresses overlaps with NMS.

use crate::session;
use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}: download det_10g.onnx from insightface and place it in the models directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("image has zero area")]
    EmptyImage,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Letterbox resize parameters, used to map detections back to image space.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = session::build_session(model_path, intra_threads)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::info!(path = %model_path.display(), ?stride_indices, "loaded SCRFD model");

        Ok(Self { session, stride_indices })
    }

    /// Detect faces in an RGB image, returning bounding boxes sorted by confidence.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::EmptyImage);
        }

        let (input, letterbox) = preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[slot];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let heads = StrideHeads {
                scores: extract(score_idx, "scores")?,
                bboxes: extract(bbox_idx, "bboxes")?,
                kps: extract(kps_idx, "kps")?,
            };
            candidates.extend(decode_stride(&heads, stride, &letterbox, SCRFD_CONFIDENCE_THRESHOLD));
        }

        let faces = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(count = faces.len(), "SCRFD detections");
        Ok(faces)
    }
}

/// Letterbox an RGB image into a normalized `[1, 3, 640, 640]` tensor.
///
/// Padding is filled with the mean so it normalizes to 0.0.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(image.width(), image.height(), SCRFD_INPUT_SIZE);
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).max(1);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).max(1);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = SCRFD_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (off_x, off_y) = (letterbox.pad_x as u32, letterbox.pad_y as u32);

    for y in 0..SCRFD_INPUT_SIZE {
        for x in 0..SCRFD_INPUT_SIZE {
            let inside = x >= off_x && x < off_x + new_w && y >= off_y && y < off_y + new_h;
            for c in 0..3 {
                let value = if inside {
                    resized.get_pixel(x - off_x, y - off_y)[c] as f32
                } else {
                    SCRFD_MEAN
                };
                tensor[[0, c, y as usize, x as usize]] = (value - SCRFD_MEAN) / SCRFD_STD;
            }
        }
    }

    (tensor, letterbox)
}

/// Map output tensors to stride slots.
///
/// Exports either name their outputs `score_8`, `bbox_16`, `kps_32`, ... or use
/// generic numeric names, in which case the standard positional layout
/// `[scores 8/16/32, bboxes 8/16/32, kps 8/16/32]` applies.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?, find("kps", stride)?)))
        .collect();

    match named {
        Some(found) => [found[0], found[1], found[2]],
        None => {
            tracing::debug!(?names, "SCRFD output names not recognized, using positional mapping");
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Raw head outputs for one stride.
struct StrideHeads<'a> {
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

/// Decode detections for a single stride level into image coordinates.
fn decode_stride(
    heads: &StrideHeads<'_>,
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<BoundingBox> {
    let grid = SCRFD_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = heads.scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }
        let Some(dist) = heads.bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid) as f32 * step;
        let anchor_y = (cell / grid) as f32 * step;

        let (x1, y1) = letterbox.unmap(anchor_x - dist[0] * step, anchor_y - dist[1] * step);
        let (x2, y2) = letterbox.unmap(anchor_x + dist[2] * step, anchor_y + dist[3] * step);

        let landmarks = heads.kps.get(idx * 10..idx * 10 + 10).map(|k| {
            std::array::from_fn(|i| {
                letterbox.unmap(anchor_x + k[i * 2] * step, anchor_y + k[i * 2 + 1] * step)
            })
        });

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }

    detections
}

/// Non-Maximum Suppression. Output is sorted by descending confidence.
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

/// Intersection-over-Union between two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}
