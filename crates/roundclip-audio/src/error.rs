//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// No default render endpoint is available.
    #[error("No default audio render device")]
    NoRenderDevice,

    /// The negotiated mix format cannot be represented.
    #[error("Audio format not supported: {0}")]
    FormatNotSupported(String),

    /// Capture is already running on this instance.
    #[error("Audio capture already started")]
    AlreadyStarted,

    /// The audio device was lost during capture.
    #[error("Audio device lost")]
    DeviceLost,
}

#[cfg(windows)]
impl From<windows::core::Error> for AudioError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
