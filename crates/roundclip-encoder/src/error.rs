//! Error types for the encoder backends.

use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// Container or codec not available on this platform.
    #[error("Encoder not supported: {0}")]
    NotSupported(String),

    /// Encoder construction failed.
    #[error("Encoder initialization failed: {0}")]
    Initialization(String),

    /// A frame did not match the configured geometry.
    #[error("Invalid frame input: {0}")]
    InvalidInput(String),

    /// Container I/O error.
    #[error("Container I/O error")]
    Io(#[from] std::io::Error),

    /// GIF encoding error.
    #[error("GIF encode failed")]
    Gif(#[from] image::ImageError),
}

#[cfg(windows)]
impl From<windows::core::Error> for EncoderError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
