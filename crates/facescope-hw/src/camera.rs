//! V4L2 camera capture via the `v4l` crate.

use crate::frame;
use crate::FrameSource;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("camera already released")]
    Released,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"MJPG" => Some(PixelFormat::Mjpg),
            b"GREY" => Some(PixelFormat::Grey),
            _ => None,
        }
    }
}

/// V4L2 capture device streaming RGB frames.
///
/// The mmap stream is opened once and kept until [`Camera::release`] or drop.
pub struct Camera {
    stream: Option<MmapStream<'static>>,
    device: Option<Device>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0") and start streaming.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; many webcams answer with MJPG at this size instead.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = DEFAULT_WIDTH;
        fmt.height = DEFAULT_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;
        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV, MJPG, or GREY)",
                negotiated.fourcc
            ))
        })?;
        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        Ok(Self {
            stream: Some(stream),
            device: Some(device),
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }

    /// Dequeue one buffer and convert it to RGB.
    pub fn capture_frame(&mut self) -> Result<RgbImage, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::Released)?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        tracing::trace!(seq = meta.sequence, bytes = buf.len(), "dequeued buffer");

        let (width, height) = (self.width, self.height);
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, width, height),
            PixelFormat::Mjpg => frame::mjpg_to_rgb(buf),
        };
        converted.map_err(|e| CameraError::CaptureFailed(format!("frame conversion failed: {e}")))
    }

    /// Stop streaming and close the device. Later calls do nothing.
    pub fn release(&mut self) {
        // The stream must go before the device it was created from.
        let had_stream = self.stream.take().is_some();
        if self.device.take().is_some() || had_stream {
            tracing::info!(device = %self.device_path, "camera released");
        }
    }
}

impl FrameSource for Camera {
    type Error = CameraError;

    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        if self.is_released() {
            return Ok(None);
        }
        self.capture_frame().map(Some)
    }

    fn release(&mut self) {
        Camera::release(self);
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), Some(PixelFormat::Mjpg));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), Some(PixelFormat::Grey));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y16 ")), None);
    }

    #[test]
    fn test_open_missing_device() {
        let result = Camera::open("/dev/facescope-no-such-camera");
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
    }
}
