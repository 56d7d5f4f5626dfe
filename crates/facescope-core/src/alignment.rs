//! Face alignment via a 4-DOF similarity transform.
//!
//! Maps the five detector landmarks onto the ArcFace reference positions and
//! warps the face into a canonical 112×112 RGB crop.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `dst = [a -b; b a] · src + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Least-squares fit from `src` to `dst` points (closed form).
    fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let n = src.len() as f32;
        let mean = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
            (sx / n, sy / n)
        };
        let (msx, msy) = mean(src);
        let (mdx, mdy) = mean(dst);

        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        let mut var = 0.0f32;
        for (s, d) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (s.0 - msx, s.1 - msy);
            let (dx, dy) = (d.0 - mdx, d.1 - mdy);
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
            var += sx * sx + sy * sy;
        }

        if var < 1e-12 {
            return Self { a: 1.0, b: 0.0, tx: mdx - msx, ty: mdy - msy };
        }

        let a = dot / var;
        let b = cross / var;
        Self {
            a,
            b,
            tx: mdx - (a * msx - b * msy),
            ty: mdy - (b * msx + a * msy),
        }
    }

    /// Map an output pixel back into the source image.
    fn invert_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let (dx, dy) = (x - self.tx, y - self.ty);
        Some(((self.a * dx + self.b * dy) / det, (self.a * dy - self.b * dx) / det))
    }
}

/// Bilinear sample with black outside the image.
fn sample(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (x0, y0) = (x.floor() as i64, y.floor() as i64);
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let px = |xi: i64, yi: i64, c: usize| -> f32 {
        if xi >= 0 && xi < w && yi >= 0 && yi < h {
            image.get_pixel(xi as u32, yi as u32)[c] as f32
        } else {
            0.0
        }
    };

    Rgb(std::array::from_fn(|c| {
        let top = px(x0, y0, c) * (1.0 - fx) + px(x0 + 1, y0, c) * fx;
        let bottom = px(x0, y0 + 1, c) * (1.0 - fx) + px(x0 + 1, y0 + 1, c) * fx;
        (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
    }))
}

/// Align a detected face to a canonical 112×112 crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = Similarity::estimate(landmarks, &REFERENCE_LANDMARKS_112);
    RgbImage::from_fn(ALIGNED_SIZE, ALIGNED_SIZE, |ox, oy| {
        match transform.invert_point(ox as f32, oy as f32) {
            Some((sx, sy)) => sample(image, sx, sy),
            None => Rgb([0, 0, 0]),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = Similarity::estimate(&REFERENCE_LANDMARKS_112, &REFERENCE_LANDMARKS_112);
        assert!((t.a - 1.0).abs() < 1e-4, "a = {}", t.a);
        assert!(t.b.abs() < 1e-4, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-3 && t.ty.abs() < 1e-3);
    }

    #[test]
    fn test_scaled_transform() {
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0 + 10.0, y * 2.0 + 20.0));
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS_112);
        assert!((t.a - 0.5).abs() < 1e-3, "a = {}", t.a);
        assert!(t.b.abs() < 1e-3);
        let (x, y) = t.invert_point(REFERENCE_LANDMARKS_112[0].0, REFERENCE_LANDMARKS_112[0].1).unwrap();
        assert!((x - src[0].0).abs() < 1e-2 && (y - src[0].1).abs() < 1e-2);
    }

    #[test]
    fn test_rotated_transform() {
        // 90° rotation: (x, y) -> (-y, x)
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (y, -x));
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS_112);
        assert!(t.a.abs() < 1e-3, "a = {}", t.a);
        assert!((t.b - 1.0).abs() < 1e-3, "b = {}", t.b);
    }

    #[test]
    fn test_degenerate_landmarks() {
        let src = [(5.0, 5.0); 5];
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS_112);
        assert_eq!((t.a, t.b), (1.0, 0.0));
    }

    #[test]
    fn test_align_face_output_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([128, 128, 128]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS_112);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        assert_eq!(*aligned.get_pixel(56, 56), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_landmark_lands_on_reference() {
        let mut image = RgbImage::new(200, 200);
        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for dy in 0..5 {
            for dx in 0..5 {
                image.put_pixel(78 + dx, 58 + dy, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&image, &src);
        let (rx, ry) = (
            REFERENCE_LANDMARKS_112[0].0.round() as u32,
            REFERENCE_LANDMARKS_112[0].1.round() as u32,
        );
        let brightest = (rx - 1..=rx + 1)
            .flat_map(|x| (ry - 1..=ry + 1).map(move |y| (x, y)))
            .map(|(x, y)| aligned.get_pixel(x, y)[0])
            .max()
            .unwrap_or(0);
        assert!(brightest > 100, "left eye patch not near reference, max={brightest}");
    }
}
