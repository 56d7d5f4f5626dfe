//! Raw capture buffer decoding into RGB frames.

use image::RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("MJPG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength { format: "YUYV", expected, actual: yuyv.len() });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        format: "YUYV",
        expected,
        actual: yuyv.len(),
    })
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as f32 - 16.0) * 1.164;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let clamp = |x: f32| x.round().clamp(0.0, 255.0) as u8;
    [
        clamp(c + 1.596 * e),
        clamp(c - 0.392 * d - 0.813 * e),
        clamp(c + 2.017 * d),
    ]
}

/// Expand 8-bit grayscale into RGB with equal channels.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height) as usize;
    if grey.len() < expected {
        return Err(FrameError::InvalidLength { format: "GREY", expected, actual: grey.len() });
    }
    let rgb: Vec<u8> = grey[..expected].iter().flat_map(|&g| [g, g, g]).collect();
    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        format: "GREY",
        expected,
        actual: grey.len(),
    })
}

/// Decode one Motion-JPEG frame.
pub fn mjpg_to_rgb(jpeg: &[u8]) -> Result<RgbImage, FrameError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuyv_to_rgb_grey_levels() {
        // Neutral chroma: both pixels are achromatic.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_yuyv_to_rgb_red_dominant() {
        // BT.601 encoding of pure red is roughly Y=81 U=90 V=240.
        let yuyv = vec![81, 90, 81, 240];
        let px = *yuyv_to_rgb(&yuyv, 2, 1).unwrap().get_pixel(0, 0);
        assert!(px[0] > 240, "{px:?}");
        assert!(px[1] < 15, "{px:?}");
        assert!(px[2] < 15, "{px:?}");
    }

    #[test]
    fn test_yuyv_to_rgb_dimensions() {
        let yuyv: Vec<u8> = vec![128; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128];
        assert!(matches!(
            yuyv_to_rgb(&yuyv, 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2, .. })
        ));
    }

    #[test]
    fn test_grey_to_rgb() {
        let rgb = grey_to_rgb(&[7, 200], 2, 1).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([7, 7, 7]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([200, 200, 200]));
        assert!(grey_to_rgb(&[1], 2, 1).is_err());
    }

    #[test]
    fn test_mjpg_roundtrip_dimensions() {
        let img = RgbImage::from_pixel(8, 6, Rgb([40, 120, 200]));
        let mut jpeg = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg).unwrap();
        let decoded = mjpg_to_rgb(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn test_mjpg_garbage_is_error() {
        assert!(matches!(mjpg_to_rgb(b"not a jpeg"), Err(FrameError::Decode(_))));
    }
}
