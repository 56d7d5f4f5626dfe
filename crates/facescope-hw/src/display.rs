//! On-screen preview window via `minifb`.

use crate::FrameSink;
use image::RgbImage;
use minifb::{Key, Window, WindowOptions};
use std::time::Duration;
use thiserror::Error;

/// Refresh cap for the preview window (~60 FPS).
const UPDATE_INTERVAL: Duration = Duration::from_micros(16_600);

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to create window: {0}")]
    Create(String),
    #[error("window update failed: {0}")]
    Update(String),
    #[error("window already closed")]
    Closed,
}

/// A resizable window showing RGB frames.
///
/// `q`, `Escape`, or closing the window requests quit.
pub struct Display {
    window: Option<Window>,
    buffer: Vec<u32>,
    title: String,
}

impl Display {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| DisplayError::Create(e.to_string()))?;
        window.limit_update_rate(Some(UPDATE_INTERVAL));
        tracing::info!(title, width, height, "opened preview window");

        Ok(Self {
            window: Some(window),
            buffer: Vec::new(),
            title: title.to_string(),
        })
    }
}

impl FrameSink for Display {
    type Error = DisplayError;

    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let window = self.window.as_mut().ok_or(DisplayError::Closed)?;
        pack_rgb(frame, &mut self.buffer);
        window
            .update_with_buffer(&self.buffer, frame.width() as usize, frame.height() as usize)
            .map_err(|e| DisplayError::Update(e.to_string()))
    }

    fn quit_requested(&self) -> bool {
        match &self.window {
            Some(window) => {
                !window.is_open() || window.is_key_down(Key::Q) || window.is_key_down(Key::Escape)
            }
            None => true,
        }
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            tracing::info!(title = %self.title, "closed preview window");
        }
    }
}

/// Pack RGB8 pixels into minifb's `0RGB` u32 layout, reusing `buffer`.
pub fn pack_rgb(frame: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(frame.pixels().map(|p| {
        let [r, g, b] = p.0;
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }));
}
