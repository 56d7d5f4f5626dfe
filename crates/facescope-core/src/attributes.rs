//! Facial attribute estimation: apparent age, gender, emotion, race.
//!
//! Four independent classifiers share one face crop. Age, gender and race
//! models take a 224×224 RGB input scaled to [0, 1]; the emotion model takes a
//! 48×48 grayscale input. All four are Keras exports with NHWC inputs.

use crate::session;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CLASSIFIER_INPUT_SIZE: u32 = 224;
const EMOTION_INPUT_SIZE: u32 = 48;
const AGE_BINS: usize = 101;

#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("face region is empty ({0}×{1})")]
    EmptyRegion(u32, u32),
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Woman,
    Man,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Woman => "Woman",
            Gender::Man => "Man",
        }
    }
}

/// Gender distribution in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenderScores {
    pub woman: f32,
    pub man: f32,
}

impl GenderScores {
    /// Ties resolve to `Woman`, the first class of the model.
    pub fn dominant(&self) -> Gender {
        if self.man > self.woman { Gender::Man } else { Gender::Woman }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Model output order.
    const CLASSES: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::CLASSES.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Race {
    #[serde(rename = "asian")]
    Asian,
    #[serde(rename = "indian")]
    Indian,
    #[serde(rename = "black")]
    Black,
    #[serde(rename = "white")]
    White,
    #[serde(rename = "middle eastern")]
    MiddleEastern,
    #[serde(rename = "latino hispanic")]
    LatinoHispanic,
}

impl Race {
    /// Model output order.
    const CLASSES: [Race; 6] = [
        Race::Asian,
        Race::Indian,
        Race::Black,
        Race::White,
        Race::MiddleEastern,
        Race::LatinoHispanic,
    ];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::CLASSES.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Race::Asian => "asian",
            Race::Indian => "indian",
            Race::Black => "black",
            Race::White => "white",
            Race::MiddleEastern => "middle eastern",
            Race::LatinoHispanic => "latino hispanic",
        }
    }
}

/// Estimated demographic and affective attributes of one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub age: u32,
    pub gender: GenderScores,
    pub dominant_emotion: Emotion,
    pub dominant_race: Race,
}

impl FaceAttributes {
    pub fn dominant_gender(&self) -> Gender {
        self.gender.dominant()
    }
}

impl fmt::Display for FaceAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{age: {}, gender: {{Woman: {:.2}, Man: {:.2}}}, dominant_emotion: {}, dominant_race: {}}}",
            self.age,
            self.gender.woman,
            self.gender.man,
            self.dominant_emotion.as_str(),
            self.dominant_race.as_str()
        )
    }
}

/// Infers [`FaceAttributes`] from a face image or crop.
pub trait AttributeEstimator {
    fn estimate(&mut self, face: &RgbImage) -> Result<FaceAttributes, AttributeError>;
}

/// Run `estimator`, logging and absorbing any failure.
///
/// `context` names the face or file in the warning.
pub fn estimate_or_none(
    estimator: &mut dyn AttributeEstimator,
    face: &RgbImage,
    context: &str,
) -> Option<FaceAttributes> {
    match estimator.estimate(face) {
        Ok(attributes) => Some(attributes),
        Err(e) => {
            tracing::warn!(face = context, error = %e, "attribute estimation failed");
            None
        }
    }
}

/// Model files for the four attribute classifiers.
#[derive(Debug, Clone)]
pub struct AttributeModelPaths {
    pub age: PathBuf,
    pub gender: PathBuf,
    pub emotion: PathBuf,
    pub race: PathBuf,
}

impl AttributeModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            age: dir.join("age.onnx"),
            gender: dir.join("gender.onnx"),
            emotion: dir.join("emotion.onnx"),
            race: dir.join("race.onnx"),
        }
    }
}

/// Attribute estimator backed by four ONNX classifiers.
pub struct OnnxAttributeEstimator {
    age: Session,
    gender: Session,
    emotion: Session,
    race: Session,
}

impl OnnxAttributeEstimator {
    pub fn load(paths: &AttributeModelPaths, intra_threads: usize) -> Result<Self, AttributeError> {
        let open = |path: &Path| -> Result<Session, AttributeError> {
            if !path.exists() {
                return Err(AttributeError::ModelNotFound(path.display().to_string()));
            }
            Ok(session::build_session(path, intra_threads)?)
        };

        let estimator = Self {
            age: open(&paths.age)?,
            gender: open(&paths.gender)?,
            emotion: open(&paths.emotion)?,
            race: open(&paths.race)?,
        };
        tracing::info!(?paths, "loaded attribute models");
        Ok(estimator)
    }
}

impl AttributeEstimator for OnnxAttributeEstimator {
    fn estimate(&mut self, face: &RgbImage) -> Result<FaceAttributes, AttributeError> {
        let (w, h) = face.dimensions();
        if w == 0 || h == 0 {
            return Err(AttributeError::EmptyRegion(w, h));
        }

        let rgb = imageops::resize(face, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE, FilterType::Triangle);
        let rgb_input = session::rgb_to_nhwc_unit(&rgb);

        let gray = imageops::grayscale(face);
        let gray = imageops::resize(&gray, EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE, FilterType::Triangle);
        let gray_input = session::gray_to_nhwc_unit(&gray);

        let age = apparent_age(&run_classifier(&mut self.age, &rgb_input, "age")?)?;
        let gender = gender_scores(&run_classifier(&mut self.gender, &rgb_input, "gender")?)?;
        let dominant_emotion = dominant_class(&run_classifier(&mut self.emotion, &gray_input, "emotion")?, Emotion::from_index, "emotion")?;
        let dominant_race = dominant_class(&run_classifier(&mut self.race, &rgb_input, "race")?, Race::from_index, "race")?;

        let attributes = FaceAttributes { age, gender, dominant_emotion, dominant_race };
        tracing::debug!(%attributes, "estimated attributes");
        Ok(attributes)
    }
}

/// Run one classifier and return its output as a probability distribution.
fn run_classifier(session: &mut Session, input: &Array4<f32>, what: &str) -> Result<Vec<f32>, AttributeError> {
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
    let (_, raw) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| AttributeError::InferenceFailed(format!("{what} output: {e}")))?;
    Ok(as_distribution(raw))
}

/// Pass probabilities through unchanged; softmax anything else (logits).
fn as_distribution(raw: &[f32]) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    let is_probability = raw.iter().all(|p| (0.0..=1.0).contains(p)) && (sum - 1.0).abs() < 1e-3;
    if is_probability {
        raw.to_vec()
    } else {
        session::softmax(raw)
    }
}

/// Expected value over the 0..=100 age bins.
fn apparent_age(probs: &[f32]) -> Result<u32, AttributeError> {
    if probs.len() != AGE_BINS {
        return Err(AttributeError::InferenceFailed(format!(
            "expected {AGE_BINS} age bins, got {}",
            probs.len()
        )));
    }
    let expected: f32 = probs.iter().enumerate().map(|(age, p)| age as f32 * p).sum();
    Ok(expected.round().clamp(0.0, 100.0) as u32)
}

fn gender_scores(probs: &[f32]) -> Result<GenderScores, AttributeError> {
    match probs {
        [woman, man] => Ok(GenderScores { woman: woman * 100.0, man: man * 100.0 }),
        _ => Err(AttributeError::InferenceFailed(format!(
            "expected 2 gender classes, got {}",
            probs.len()
        ))),
    }
}

fn dominant_class<T>(
    probs: &[f32],
    from_index: fn(usize) -> Option<T>,
    what: &str,
) -> Result<T, AttributeError> {
    session::argmax(probs)
        .and_then(|(idx, _)| from_index(idx))
        .ok_or_else(|| AttributeError::InferenceFailed(format!("unexpected {what} output of {} classes", probs.len())))
}
