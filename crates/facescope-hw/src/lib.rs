//! facescope-hw: camera capture and preview display.
//!
//! V4L2 capture through `v4l`, converted to RGB, and a `minifb` window for
//! showing annotated frames. The [`FrameSource`] and [`FrameSink`] traits let
//! the capture loop run against other sources and sinks.

pub mod camera;
pub mod display;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use display::{Display, DisplayError};
pub use frame::FrameError;

use image::RgbImage;

/// Produces RGB frames until exhausted or released.
pub trait FrameSource {
    type Error: std::fmt::Display;

    /// `Ok(None)` once no further frames will arrive.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, Self::Error>;

    /// Give the underlying device back. Must be safe to call more than once.
    fn release(&mut self);
}

/// Presents frames and reports whether the viewer asked to stop.
pub trait FrameSink {
    type Error: std::fmt::Display;

    fn show(&mut self, frame: &RgbImage) -> Result<(), Self::Error>;

    fn quit_requested(&self) -> bool;

    fn close(&mut self);
}
