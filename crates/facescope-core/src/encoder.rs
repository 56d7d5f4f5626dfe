//! Locate faces and compute their identity encodings in one pass.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{EncodedFace, FaceLocation};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Finds every face in an image and encodes it.
///
/// Faces are returned in detector order; the first one is the detector's most
/// confident face.
pub trait FaceEncoder {
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<EncodedFace>, EncodeError>;
}

/// SCRFD detection followed by ArcFace encoding of each face.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<EncodedFace>, EncodeError> {
        let (width, height) = image.dimensions();
        let boxes = self.detector.detect(image)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let location = FaceLocation::from_bbox(&bbox, width, height);
            if location.is_empty() {
                tracing::debug!(?bbox, "dropping detection outside the image");
                continue;
            }
            let encoding = self.recognizer.extract(image, &bbox)?;
            faces.push(EncodedFace { location, bbox, encoding });
        }
        Ok(faces)
    }
}
