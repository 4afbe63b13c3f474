//! Window discovery and GDI frame capture.
//!
//! This crate locates the target application window from a user-supplied
//! hint string and captures its contents into a fixed-size canvas: an
//! off-screen `PrintWindow` capture with a screen-region `BitBlt` fallback,
//! composited with high-quality scaling. All GDI handles live in move-only
//! RAII wrappers.

mod error;
mod geometry;
mod locator;
#[cfg(windows)]
mod win32;

pub use error::CaptureError;
pub use geometry::{fit_rect, Rect};
pub use locator::{
    parse_hints, pick_best, score_candidate, Hint, HintField, WindowCandidate,
    DEFAULT_WINDOW_HINT,
};
#[cfg(windows)]
pub use locator::find_target_window;
#[cfg(windows)]
pub use win32::bounds::{is_window_alive, window_bounds};
#[cfg(windows)]
pub use win32::capturer::WindowCapturer;
#[cfg(windows)]
pub use win32::enumerate::enumerate_window_candidates;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Bytes per pixel of every capture buffer (32-bit BGRA).
pub const BYTES_PER_PIXEL: usize = 4;

/// A located target window.
#[derive(Debug, Clone)]
pub struct TargetWindow {
    /// OS window handle.
    pub handle: isize,

    /// Window title at locate time.
    pub title: String,

    /// Window bounds at locate time.
    pub bounds: Rect,
}
