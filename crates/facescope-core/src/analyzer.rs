//! Single-pass recognition and attribute analysis of one still image.

use crate::attributes::{estimate_or_none, AttributeEstimator};
use crate::encoder::{EncodeError, FaceEncoder};
use crate::gallery::{crop_face, Gallery};
use crate::matcher::Matcher;
use crate::types::AnalysisResult;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("face encoding failed: {0}")]
    Encode(#[from] EncodeError),
}

/// Recognizes every face of an image against an enrolled gallery.
///
/// Matched faces reuse the attributes computed at enrollment; unmatched faces,
/// and matches whose gallery entry has no attributes, are estimated from their
/// own crop.
pub struct StaticAnalyzer<'a> {
    gallery: &'a Gallery,
    matcher: &'a dyn Matcher,
    encoder: &'a mut dyn FaceEncoder,
    estimator: &'a mut dyn AttributeEstimator,
}

impl<'a> StaticAnalyzer<'a> {
    pub fn new(
        gallery: &'a Gallery,
        matcher: &'a dyn Matcher,
        encoder: &'a mut dyn FaceEncoder,
        estimator: &'a mut dyn AttributeEstimator,
    ) -> Self {
        Self { gallery, matcher, encoder, estimator }
    }

    pub fn analyze_path(&mut self, path: &Path) -> Result<Vec<AnalysisResult>, AnalyzeError> {
        let image = image::open(path)
            .map_err(|source| AnalyzeError::Decode { path: path.display().to_string(), source })?
            .to_rgb8();
        self.analyze(&image)
    }

    /// One result per detected face, in detection order.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Vec<AnalysisResult>, AnalyzeError> {
        let faces = self.encoder.encode_faces(image)?;
        tracing::debug!(faces = faces.len(), "analyzing image");

        let mut results = Vec::with_capacity(faces.len());
        for face in faces {
            let matched = self.matcher.compare(&face.encoding, self.gallery.faces());
            let reused = matched
                .index
                .and_then(|i| self.gallery.faces()[i].attributes.clone());

            let attributes = match reused {
                Some(attrs) => Some(attrs),
                None => {
                    let crop = crop_face(image, &face.location);
                    estimate_or_none(&mut *self.estimator, &crop, &matched.name)
                }
            };

            tracing::debug!(
                name = %matched.name,
                location = %face.location,
                distance = ?matched.distance,
                has_attributes = attributes.is_some(),
                "face analyzed"
            );
            results.push(AnalysisResult {
                name: matched.name,
                location: face.location,
                attributes,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::tests::{ColourEncoder, CountingEstimator};
    use crate::matcher::FirstMatch;
    use crate::types::{FaceLocation, UNKNOWN_NAME};
    use image::Rgb;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const GREY: [u8; 3] = [128, 128, 128];

    /// Column-0 pixels are faces (see `ColourEncoder`); each face crop is 2 px wide.
    fn group_image(colours: &[[u8; 3]]) -> RgbImage {
        let mut img = RgbImage::new(4, colours.len() as u32);
        for (y, c) in colours.iter().enumerate() {
            img.put_pixel(0, y as u32, Rgb(*c));
        }
        img
    }

    fn enrolled(dir: &Path, entries: &[(&str, [u8; 3])], estimator: &mut CountingEstimator) -> Gallery {
        for (name, colour) in entries {
            group_image(&[*colour]).save(dir.join(format!("{name}.png"))).unwrap();
        }
        let mut gallery = Gallery::new();
        gallery.enroll(dir, &mut ColourEncoder, estimator).unwrap();
        gallery
    }

    #[test]
    fn test_one_result_per_face_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = enrolled(dir.path(), &[("alice", RED), ("bob", BLUE)], &mut CountingEstimator::new());
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::new();
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);

        let results = analyzer.analyze(&group_image(&[BLUE, GREY, RED])).unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["bob", UNKNOWN_NAME, "alice"]);
        assert_eq!(results[1].location, FaceLocation { top: 1, right: 2, bottom: 2, left: 0 });
        assert!(results.iter().all(|r| r.attributes.is_some()));
    }

    #[test]
    fn test_matched_faces_reuse_gallery_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = enrolled(dir.path(), &[("alice", RED)], &mut CountingEstimator::new());
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::new();
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);

        let results = analyzer.analyze(&group_image(&[RED, GREY])).unwrap();

        assert_eq!(results[0].attributes, gallery.faces()[0].attributes);
        drop(analyzer);
        // Only the unknown face needed fresh estimation.
        assert_eq!(estimator.calls, 1);
    }

    #[test]
    fn test_matched_face_without_gallery_attributes_is_estimated() {
        let dir = tempfile::tempdir().unwrap();
        let mut failing = CountingEstimator::failing_on(RED);
        let gallery = enrolled(dir.path(), &[("alice", RED)], &mut failing);
        assert!(gallery.faces()[0].attributes.is_none());

        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::new();
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);

        let results = analyzer.analyze(&group_image(&[RED])).unwrap();
        assert_eq!(results[0].name, "alice");
        assert_eq!(results[0].attributes.as_ref().map(|a| a.age), Some(2));
        drop(analyzer);
        assert_eq!(estimator.calls, 1);
    }

    #[test]
    fn test_estimation_failure_isolated_to_face() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::failing_on(BLUE);
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);

        let results = analyzer.analyze(&group_image(&[RED, BLUE, GREY])).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.name == UNKNOWN_NAME));
        assert!(results[0].attributes.is_some());
        assert!(results[1].attributes.is_none());
        assert!(results[2].attributes.is_some());
        drop(analyzer);
        assert_eq!(estimator.calls, 3);
    }

    #[test]
    fn test_no_faces_yields_empty_results() {
        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::new();
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);
        assert!(analyzer.analyze(&RgbImage::new(8, 8)).unwrap().is_empty());
    }

    #[test]
    fn test_analyze_path_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group.png");
        std::fs::write(&path, b"garbage").unwrap();

        let gallery = Gallery::new();
        let matcher = FirstMatch { tolerance: 0.1 };
        let mut estimator = CountingEstimator::new();
        let mut encoder = ColourEncoder;
        let mut analyzer = StaticAnalyzer::new(&gallery, &matcher, &mut encoder, &mut estimator);
        assert!(matches!(analyzer.analyze_path(&path), Err(AnalyzeError::Decode { .. })));
    }
}
