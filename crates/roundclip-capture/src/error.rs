//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// No window matched the configured hint.
    #[error("No window matched hint: {0}")]
    WindowNotFound(String),

    /// The target window handle is no longer valid.
    #[error("Target window no longer available")]
    WindowGone,

    /// The window bounds could not be read.
    #[error("Window bounds unavailable")]
    BoundsUnavailable,

    /// Pixel capture failed on both the direct and the fallback path.
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for CaptureError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
