//! Bounded real-time capture, annotate and display loop.

use facescope_core::FrameReport;
use facescope_hw::{FrameSink, FrameSource};
use image::RgbImage;
use std::time::{Duration, Instant};

/// Title of the preview window.
pub const WINDOW_TITLE: &str = "Video";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The session duration elapsed.
    Timeout,
    /// The viewer pressed `q`/`Escape` or closed the window.
    Quit,
    /// The source stopped delivering frames.
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: usize,
    pub annotated_faces: usize,
    pub reason: StopReason,
}

/// Pull frames from `source`, annotate each with `process` and show it on `sink`
/// until `duration` elapses, the viewer quits, or the source runs dry.
///
/// The source is released exactly once and the sink closed, however the loop ends.
pub fn run_session<S, K, F>(source: &mut S, sink: &mut K, duration: Duration, mut process: F) -> SessionSummary
where
    S: FrameSource,
    K: FrameSink,
    F: FnMut(&mut RgbImage) -> FrameReport,
{
    let start = Instant::now();
    let mut frames = 0usize;
    let mut annotated_faces = 0usize;

    let reason = loop {
        if start.elapsed() >= duration {
            break StopReason::Timeout;
        }

        let mut frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("frame source exhausted");
                break StopReason::EndOfStream;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to grab frame");
                break StopReason::EndOfStream;
            }
        };

        let report = process(&mut frame);
        frames += 1;
        annotated_faces += report.annotated;

        if let Err(e) = sink.show(&frame) {
            tracing::warn!(error = %e, "failed to display frame");
            break StopReason::Quit;
        }
        if sink.quit_requested() {
            break StopReason::Quit;
        }
    };

    source.release();
    sink.close();

    tracing::info!(
        frames,
        annotated_faces,
        reason = ?reason,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "video session ended"
    );
    SessionSummary { frames, annotated_faces, reason }
}
