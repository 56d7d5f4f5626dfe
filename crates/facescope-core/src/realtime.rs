//! Per-frame recognition and annotation for live video.

use crate::attributes::AttributeEstimator;
use crate::encoder::FaceEncoder;
use crate::gallery::{crop_face, Gallery};
use crate::landmarks::LandmarkDetector;
use crate::matcher::Matcher;
use crate::overlay;
use ab_glyph::FontVec;
use image::RgbImage;

/// What happened to one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Faces found by the encoder.
    pub faces: usize,
    /// Faces that received an overlay.
    pub annotated: usize,
    /// Faces skipped because attribute estimation failed.
    pub attribute_failures: usize,
    /// Resolved identity of every face, in detection order.
    pub names: Vec<String>,
}

/// Recognizes, estimates and draws every face of each frame it is given.
///
/// Nothing is cached between frames.
pub struct RealtimeAnnotator<'a> {
    gallery: &'a Gallery,
    matcher: &'a dyn Matcher,
    encoder: &'a mut dyn FaceEncoder,
    landmarks: &'a mut dyn LandmarkDetector,
    estimator: &'a mut dyn AttributeEstimator,
    font: Option<FontVec>,
}

impl<'a> RealtimeAnnotator<'a> {
    pub fn new(
        gallery: &'a Gallery,
        matcher: &'a dyn Matcher,
        encoder: &'a mut dyn FaceEncoder,
        landmarks: &'a mut dyn LandmarkDetector,
        estimator: &'a mut dyn AttributeEstimator,
    ) -> Self {
        Self { gallery, matcher, encoder, landmarks, estimator, font: None }
    }

    /// Labels are only drawn when a font is set.
    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.font = font;
        self
    }

    /// Annotate `frame` in place.
    ///
    /// A frame the encoder cannot process is left untouched.
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> FrameReport {
        let faces = match self.encoder.encode_faces(frame) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "face encoding failed, frame left unannotated");
                return FrameReport::default();
            }
        };
        let mut report = FrameReport { faces: faces.len(), ..FrameReport::default() };
        if faces.is_empty() {
            return report;
        }

        // Inputs are taken from the clean frame before any drawing.
        let gray = image::imageops::grayscale(frame);
        let crops: Vec<RgbImage> = faces.iter().map(|f| crop_face(frame, &f.location)).collect();

        for (face, crop) in faces.iter().zip(&crops) {
            let matched = self.matcher.compare(&face.encoding, self.gallery.faces());
            report.names.push(matched.name.clone());

            let attributes = match self.estimator.estimate(crop) {
                Ok(attributes) => attributes,
                Err(e) => {
                    tracing::warn!(name = %matched.name, location = %face.location, error = %e, "error analyzing face");
                    report.attribute_failures += 1;
                    continue;
                }
            };

            if let Some(font) = &self.font {
                overlay::draw_labels(frame, font, &matched.name, &face.location, &attributes);
            }
            overlay::draw_face_box(frame, &face.location);

            match self.landmarks.predict(&gray, &face.location) {
                Ok(points) => overlay::draw_landmarks(frame, &points),
                Err(e) => tracing::warn!(location = %face.location, error = %e, "landmark prediction failed"),
            }
            report.annotated += 1;
        }

        tracing::trace!(faces = report.faces, annotated = report.annotated, "frame processed");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeError;
    use crate::gallery::tests::{ColourEncoder, CountingEstimator};
    use crate::landmarks::{FaceLandmarks, LandmarkError, LANDMARK_COUNT};
    use crate::matcher::FirstMatch;
    use crate::types::{EncodedFace, FaceLocation, UNKNOWN_NAME};
    use image::{GrayImage, Rgb};
    use std::path::Path;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const GREY: [u8; 3] = [128, 128, 128];
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const LANDMARK_X: f32 = 15.0;

    /// Places every point at `(LANDMARK_X, top)` of the face box.
    struct FixedLandmarks {
        calls: usize,
        fail: bool,
    }

    impl LandmarkDetector for FixedLandmarks {
        fn predict(&mut self, _gray: &GrayImage, face: &FaceLocation) -> Result<FaceLandmarks, LandmarkError> {
            self.calls += 1;
            if self.fail {
                return Err(LandmarkError::InferenceFailed("injected failure".into()));
            }
            Ok(FaceLandmarks { points: [(LANDMARK_X, face.top as f32); LANDMARK_COUNT] })
        }
    }

    struct BrokenEncoder;

    impl FaceEncoder for BrokenEncoder {
        fn encode_faces(&mut self, _image: &RgbImage) -> Result<Vec<EncodedFace>, EncodeError> {
            Err(EncodeError::Recognizer(crate::recognizer::RecognizerError::NoLandmarks))
        }
    }

    /// Faces on rows 0, 4, 8, ... so neighbouring overlays never overlap.
    fn frame(colours: &[[u8; 3]]) -> RgbImage {
        let mut img = RgbImage::new(24, (colours.len() as u32) * 4);
        for (i, c) in colours.iter().enumerate() {
            img.put_pixel(0, i as u32 * 4, Rgb(*c));
        }
        img
    }

    fn gallery_of(dir: &Path, entries: &[(&str, [u8; 3])]) -> Gallery {
        for (name, colour) in entries {
            let mut img = RgbImage::new(4, 1);
            img.put_pixel(0, 0, Rgb(*colour));
            img.save(dir.join(format!("{name}.png"))).unwrap();
        }
        let mut gallery = Gallery::new();
        gallery.enroll(dir, &mut ColourEncoder, &mut CountingEstimator::new()).unwrap();
        gallery
    }

    #[test]
    fn test_faces_annotated_and_named() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = gallery_of(dir.path(), &[("alice", RED)]);
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut encoder = ColourEncoder;
        let mut landmarks = FixedLandmarks { calls: 0, fail: false };
        let mut estimator = CountingEstimator::new();
        let mut annotator =
            RealtimeAnnotator::new(&gallery, &matcher, &mut encoder, &mut landmarks, &mut estimator);

        let mut img = frame(&[RED, GREY]);
        let report = annotator.process_frame(&mut img);

        assert_eq!(report.faces, 2);
        assert_eq!(report.annotated, 2);
        assert_eq!(report.attribute_failures, 0);
        assert_eq!(report.names, vec!["alice".to_string(), UNKNOWN_NAME.to_string()]);
        assert_eq!(*img.get_pixel(1, 0), overlay::BOX_COLOUR);
        assert_eq!(*img.get_pixel(LANDMARK_X as u32, 4), overlay::BOX_COLOUR);
        drop(annotator);
        assert_eq!(landmarks.calls, 2);
    }

    #[test]
    fn test_attribute_failure_skips_only_that_face() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut encoder = ColourEncoder;
        let mut landmarks = FixedLandmarks { calls: 0, fail: false };
        let mut estimator = CountingEstimator::failing_on(BLUE);
        let mut annotator =
            RealtimeAnnotator::new(&gallery, &matcher, &mut encoder, &mut landmarks, &mut estimator);

        let mut img = frame(&[RED, BLUE, GREY]);
        let report = annotator.process_frame(&mut img);

        assert_eq!(report.faces, 3);
        assert_eq!(report.annotated, 2);
        assert_eq!(report.attribute_failures, 1);
        assert_eq!(report.names.len(), 3);
        // No box or landmarks on the failed face.
        assert_eq!(*img.get_pixel(1, 4), BLACK);
        assert_eq!(*img.get_pixel(LANDMARK_X as u32, 4), BLACK);
        assert_eq!(*img.get_pixel(1, 8), overlay::BOX_COLOUR);
        drop(annotator);
        assert_eq!(landmarks.calls, 2);
    }

    #[test]
    fn test_landmark_failure_keeps_box() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut encoder = ColourEncoder;
        let mut landmarks = FixedLandmarks { calls: 0, fail: true };
        let mut estimator = CountingEstimator::new();
        let mut annotator =
            RealtimeAnnotator::new(&gallery, &matcher, &mut encoder, &mut landmarks, &mut estimator);

        let mut img = frame(&[GREY]);
        let report = annotator.process_frame(&mut img);

        assert_eq!(report.annotated, 1);
        assert_eq!(*img.get_pixel(1, 0), overlay::BOX_COLOUR);
        assert_eq!(*img.get_pixel(LANDMARK_X as u32, 0), BLACK);
    }

    #[test]
    fn test_empty_frame_untouched() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut encoder = ColourEncoder;
        let mut landmarks = FixedLandmarks { calls: 0, fail: false };
        let mut estimator = CountingEstimator::new();
        let mut annotator =
            RealtimeAnnotator::new(&gallery, &matcher, &mut encoder, &mut landmarks, &mut estimator);

        let mut img = RgbImage::new(16, 16);
        assert_eq!(annotator.process_frame(&mut img), FrameReport::default());
        assert!(img.pixels().all(|p| *p == BLACK));
        drop(annotator);
        assert_eq!(estimator.calls, 0);
    }

    #[test]
    fn test_encoder_error_leaves_frame_untouched() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut encoder = BrokenEncoder;
        let mut landmarks = FixedLandmarks { calls: 0, fail: false };
        let mut estimator = CountingEstimator::new();
        let mut annotator =
            RealtimeAnnotator::new(&gallery, &matcher, &mut encoder, &mut landmarks, &mut estimator);

        let mut img = frame(&[RED]);
        let before = img.clone();
        assert_eq!(annotator.process_frame(&mut img), FrameReport::default());
        assert_eq!(img, before);
    }
}
