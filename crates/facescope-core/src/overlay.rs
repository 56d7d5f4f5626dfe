//! Frame annotation: labels, face boxes and landmark points.

use crate::attributes::FaceAttributes;
use crate::landmarks::FaceLandmarks;
use crate::types::FaceLocation;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

pub const TEXT_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);
pub const BOX_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LANDMARK_RADIUS: i32 = 2;
const BOX_THICKNESS: u32 = 2;
const TEXT_HEIGHT_PX: f32 = 20.0;

/// Fonts tried when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

/// Load the label font from `configured`, or the first readable system font.
///
/// Returns `None` when nothing loads; labels are then not drawn.
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<PathBuf> = match configured {
        Some(path) => vec![path.to_path_buf()],
        None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
    };

    for path in &candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                tracing::debug!(path = %path.display(), "loaded label font");
                return Some(font);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "invalid font file"),
        }
    }

    tracing::warn!("no usable font found, face labels will not be drawn");
    None
}

/// Four label lines: name, age and gender above the box, emotion below it.
///
/// Offsets are baseline positions relative to the box edges.
pub fn labels(name: &str, location: &FaceLocation, attributes: &FaceAttributes) -> [(String, i32, i32); 4] {
    let left = location.left as i32;
    let top = location.top as i32;
    let bottom = location.bottom as i32;
    [
        (format!("Name: {name}"), left, top - 50),
        (format!("Age: {}", attributes.age), left, top - 30),
        (format!("Gender: {}", attributes.dominant_gender().as_str()), left, top - 10),
        (format!("Emotion: {}", attributes.dominant_emotion.as_str()), left, bottom + 20),
    ]
}

pub fn draw_labels(
    frame: &mut RgbImage,
    font: &FontVec,
    name: &str,
    location: &FaceLocation,
    attributes: &FaceAttributes,
) {
    let scale = PxScale::from(TEXT_HEIGHT_PX);
    for (text, x, baseline) in labels(name, location, attributes) {
        // imageproc positions text by its top edge
        let y = baseline - TEXT_HEIGHT_PX as i32;
        draw_text_mut(frame, TEXT_COLOUR, x, y, scale, font, &text);
    }
}

/// Two-pixel face box; nested one-pixel rectangles grown outwards.
pub fn draw_face_box(frame: &mut RgbImage, location: &FaceLocation) {
    if location.is_empty() {
        return;
    }
    for inset in 0..BOX_THICKNESS {
        let rect = Rect::at(location.left as i32 - inset as i32, location.top as i32 - inset as i32)
            .of_size(location.width() + 2 * inset, location.height() + 2 * inset);
        draw_hollow_rect_mut(frame, rect, BOX_COLOUR);
    }
}

pub fn draw_landmarks(frame: &mut RgbImage, landmarks: &FaceLandmarks) {
    for &(x, y) in &landmarks.points {
        draw_filled_circle_mut(frame, (x.round() as i32, y.round() as i32), LANDMARK_RADIUS, BOX_COLOUR);
    }
}
