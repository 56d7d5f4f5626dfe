use serde::{Deserialize, Serialize};

use crate::attributes::FaceAttributes;

/// Name reported for a face that matches no gallery entry.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Integer pixel box in `(top, right, bottom, left)` order.
///
/// `right` and `bottom` are exclusive, so `image[top..bottom, left..right]`
/// is the face region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Round a detector box to pixels and clamp it to a `width × height` image.
    pub fn from_bbox(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        Self {
            top: clamp(bbox.y, height),
            right: clamp(bbox.x + bbox.width, width),
            bottom: clamp(bbox.y + bbox.height, height),
            left: clamp(bbox.x, width),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.top, self.right, self.bottom, self.left)
    }
}

impl std::fmt::Display for FaceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.top, self.right, self.bottom, self.left)
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Euclidean distance between two embeddings.
    ///
    /// Embeddings of different length never compare as close: the result is
    /// `f32::INFINITY`.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownFace {
    pub name: String,
    pub encoding: Embedding,
    /// `None` when attribute estimation failed at enrollment.
    pub attributes: Option<FaceAttributes>,
}

/// A face found by the encoding detector, with its identity encoding.
#[derive(Debug, Clone)]
pub struct EncodedFace {
    pub location: FaceLocation,
    pub bbox: BoundingBox,
    pub encoding: Embedding,
}

/// Per-face output of the static pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub name: String,
    pub location: FaceLocation,
    pub attributes: Option<FaceAttributes>,
}

/// Result of matching a probe encoding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Matched identity name, or [`UNKNOWN_NAME`].
    pub name: String,
    /// Gallery index of the matched entry.
    pub index: Option<usize>,
    /// Euclidean distance to the matched entry.
    pub distance: Option<f32>,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            index: None,
            distance: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.index.is_some()
    }
}
