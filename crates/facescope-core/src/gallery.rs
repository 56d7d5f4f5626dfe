//! Enrollment of known identities from reference photos.

use crate::attributes::{estimate_or_none, AttributeEstimator};
use crate::encoder::FaceEncoder;
use crate::types::{FaceLocation, KnownFace};
use image::{imageops, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name suffixes accepted when enrolling from a directory.
pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpeg", ".jpg", ".png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read enrollment directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Counters from one enrollment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrollReport {
    pub enrolled: usize,
    pub skipped_no_face: usize,
    pub skipped_unreadable: usize,
}

/// The enrolled identities, in insertion order.
///
/// Insertion order matters: first-match resolution picks the earliest entry.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    faces: Vec<KnownFace>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faces(&self) -> &[KnownFace] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Enroll from a directory of images or from a single image file.
    pub fn enroll(
        &mut self,
        path: &Path,
        encoder: &mut dyn FaceEncoder,
        estimator: &mut dyn AttributeEstimator,
    ) -> Result<EnrollReport, GalleryError> {
        let images = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut report = EnrollReport::default();
        for image_path in &images {
            match self.enroll_image(image_path, encoder, estimator) {
                EnrollOutcome::Enrolled => report.enrolled += 1,
                EnrollOutcome::NoFace => report.skipped_no_face += 1,
                EnrollOutcome::Unreadable => report.skipped_unreadable += 1,
            }
        }

        tracing::info!(
            path = %path.display(),
            enrolled = report.enrolled,
            skipped_no_face = report.skipped_no_face,
            skipped_unreadable = report.skipped_unreadable,
            gallery_size = self.faces.len(),
            "enrollment finished"
        );
        Ok(report)
    }

    fn enroll_image(
        &mut self,
        image_path: &Path,
        encoder: &mut dyn FaceEncoder,
        estimator: &mut dyn AttributeEstimator,
    ) -> EnrollOutcome {
        let image = match image::open(image_path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(path = %image_path.display(), error = %e, "cannot decode image, skipping");
                return EnrollOutcome::Unreadable;
            }
        };

        let faces = match encoder.encode_faces(&image) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(path = %image_path.display(), error = %e, "face encoding failed, skipping");
                return EnrollOutcome::NoFace;
            }
        };

        let Some(first) = faces.into_iter().next() else {
            tracing::warn!(path = %image_path.display(), "no face detected, skipping");
            return EnrollOutcome::NoFace;
        };

        let name = name_from_path(image_path);
        let crop = crop_face(&image, &first.location);
        let attributes = estimate_or_none(estimator, &crop, &name);

        match &attributes {
            Some(attrs) => tracing::info!(path = %image_path.display(), %name, %attrs, "enrolled"),
            None => tracing::info!(path = %image_path.display(), %name, "enrolled without attributes"),
        }

        self.faces.push(KnownFace { name, encoding: first.encoding, attributes });
        EnrollOutcome::Enrolled
    }
}

enum EnrollOutcome {
    Enrolled,
    NoFace,
    Unreadable,
}

/// Image files directly inside `dir`, sorted by file name.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let read_err = |source| GalleryError::ReadDir { path: dir.display().to_string(), source };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if path.is_file() && IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Identity name: the file name up to its first `.` (`alice.png` → `alice`).
pub fn name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file_name,
    }
}

/// Copy `image[top..bottom, left..right]`.
pub fn crop_face(image: &RgbImage, location: &FaceLocation) -> RgbImage {
    imageops::crop_imm(image, location.left, location.top, location.width(), location.height()).to_image()
}
