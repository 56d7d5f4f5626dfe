//! 68-point facial landmark model via ONNX Runtime.
//!
//! Fits the iBUG 68-point layout inside a face box of a grayscale frame:
//!
//! - 0-16: jaw outline
//! - 17-26: eyebrows
//! - 27-35: nose
//! - 36-47: eyes
//! - 48-67: lips

use crate::session;
use crate::types::FaceLocation;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

pub const LANDMARK_COUNT: usize = 68;
const LANDMARK_INPUT_SIZE: u32 = 112;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("model file not found: {0}: place face_landmarks_68.onnx in the models directory")]
    ModelNotFound(String),
    #[error("face box is empty")]
    EmptyRegion,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// 68 landmark coordinates in frame pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    pub points: [(f32, f32); LANDMARK_COUNT],
}

/// Predicts the 68 landmarks of a face inside a known face box.
pub trait LandmarkDetector {
    fn predict(&mut self, gray: &GrayImage, face: &FaceLocation) -> Result<FaceLandmarks, LandmarkError>;
}

/// ONNX landmark regressor (PFLD-style: 112×112 input, 136 normalized outputs).
pub struct OnnxLandmarkDetector {
    session: Session,
}

impl OnnxLandmarkDetector {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, LandmarkError> {
        if !model_path.exists() {
            return Err(LandmarkError::ModelNotFound(model_path.display().to_string()));
        }
        let session = session::build_session(model_path, intra_threads)?;
        tracing::info!(path = %model_path.display(), "loaded 68-point landmark model");
        Ok(Self { session })
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn predict(&mut self, gray: &GrayImage, face: &FaceLocation) -> Result<FaceLandmarks, LandmarkError> {
        if face.is_empty() {
            return Err(LandmarkError::EmptyRegion);
        }
        let crop = imageops::crop_imm(gray, face.left, face.top, face.width(), face.height()).to_image();
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmark output: {e}")))?;

        decode(raw, face)
    }
}

/// Grayscale crop into a `[1, 3, 112, 112]` tensor in [0, 1], channel-replicated.
fn preprocess(crop: &GrayImage) -> Array4<f32> {
    let resized = imageops::resize(crop, LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE, FilterType::Triangle);
    let size = LANDMARK_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let v = pixel[0] as f32 / 255.0;
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = v;
        }
    }
    tensor
}

/// Map crop-relative `[x0, y0, x1, y1, ...]` outputs into frame coordinates.
fn decode(raw: &[f32], face: &FaceLocation) -> Result<FaceLandmarks, LandmarkError> {
    if raw.len() != LANDMARK_COUNT * 2 {
        return Err(LandmarkError::InferenceFailed(format!(
            "expected {} landmark values, got {}",
            LANDMARK_COUNT * 2,
            raw.len()
        )));
    }
    let (w, h) = (face.width() as f32, face.height() as f32);
    let points = std::array::from_fn(|i| {
        (
            face.left as f32 + raw[i * 2] * w,
            face.top as f32 + raw[i * 2 + 1] * h,
        )
    });
    Ok(FaceLandmarks { points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_decode_maps_into_face_box() {
        let face = FaceLocation { top: 100, right: 300, bottom: 200, left: 200 };
        let mut raw = vec![0.5f32; LANDMARK_COUNT * 2];
        raw[0] = 0.0;
        raw[1] = 1.0;
        let lm = decode(&raw, &face).unwrap();
        assert_eq!(lm.points[0], (200.0, 200.0));
        assert_eq!(lm.points[67], (250.0, 150.0));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let face = FaceLocation { top: 0, right: 10, bottom: 10, left: 0 };
        assert!(matches!(decode(&[0.0; 10], &face), Err(LandmarkError::InferenceFailed(_))));
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let crop = GrayImage::from_pixel(40, 60, Luma([255]));
        let t = preprocess(&crop);
        assert_eq!(t.shape(), &[1, 3, 112, 112]);
        assert!((t[[0, 2, 50, 50]] - 1.0).abs() < 0.01);
    }
}
