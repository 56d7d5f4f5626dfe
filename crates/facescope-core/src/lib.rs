//! facescope-core: face recognition and attribute analysis engine.
//!
//! SCRFD finds faces, ArcFace encodes them, a 68-point regressor fits
//! landmarks and four classifiers estimate age, gender, emotion and race.
//! All models run on CPU via ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod attributes;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod landmarks;
pub mod matcher;
pub mod overlay;
pub mod realtime;
pub mod recognizer;
mod session;
pub mod types;

pub use analyzer::{AnalyzeError, StaticAnalyzer};
pub use attributes::{AttributeEstimator, AttributeModelPaths, FaceAttributes, OnnxAttributeEstimator};
pub use encoder::{FaceEncoder, OnnxFaceEncoder};
pub use gallery::{EnrollReport, Gallery};
pub use landmarks::{FaceLandmarks, LandmarkDetector, OnnxLandmarkDetector};
pub use matcher::{MatchPolicy, Matcher};
pub use realtime::{FrameReport, RealtimeAnnotator};
pub use types::{AnalysisResult, BoundingBox, Embedding, FaceLocation, KnownFace, UNKNOWN_NAME};

use std::path::{Path, PathBuf};

/// Every model file, resolved against one models directory.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub landmarks: PathBuf,
    pub attributes: AttributeModelPaths,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            detector: dir.join("det_10g.onnx"),
            recognizer: dir.join("w600k_r50.onnx"),
            landmarks: dir.join("face_landmarks_68.onnx"),
            attributes: AttributeModelPaths::in_dir(dir),
        }
    }

    /// Files that do not exist on disk.
    pub fn missing(&self) -> Vec<&Path> {
        [
            &self.detector,
            &self.recognizer,
            &self.landmarks,
            &self.attributes.age,
            &self.attributes.gender,
            &self.attributes.emotion,
            &self.attributes.race,
        ]
        .into_iter()
        .filter(|p| !p.exists())
        .map(PathBuf::as_path)
        .collect()
    }
}
