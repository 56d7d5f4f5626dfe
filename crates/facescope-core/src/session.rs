//! Shared ONNX Runtime session setup and tensor helpers.

use image::{GrayImage, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use std::path::Path;

/// Build an inference session for `model_path` with a fixed intra-op thread count.
pub(crate) fn build_session(model_path: &Path, intra_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;

    tracing::debug!(
        path = %model_path.display(),
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "session created"
    );

    Ok(session)
}

/// Numerically stable softmax.
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_val = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|v| (v - max_val).exp()).collect();
    let sum: f32 = exp.iter().sum();
    if sum > 0.0 {
        exp.iter().map(|v| v / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

/// Index and value of the largest element. `None` for an empty slice.
pub(crate) fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// RGB image into a `[1, H, W, 3]` tensor scaled to [0, 1].
pub(crate) fn rgb_to_nhwc_unit(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, h as usize, w as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Grayscale image into a `[1, H, W, 1]` tensor scaled to [0, 1].
pub(crate) fn gray_to_nhwc_unit(image: &GrayImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, h as usize, w as usize, 1));
    for (x, y, pixel) in image.enumerate_pixels() {
        tensor[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
    }
    tensor
}
