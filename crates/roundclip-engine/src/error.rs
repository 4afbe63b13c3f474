//! Error types for the engine.

use thiserror::Error;

/// Errors that can abort a session start or kill a running session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Window discovery or frame capture failed.
    #[error(transparent)]
    Capture(#[from] roundclip_capture::CaptureError),

    /// Encoder construction or frame write failed.
    #[error(transparent)]
    Encoder(#[from] roundclip_encoder::EncoderError),

    /// Output directory or file problem.
    #[error("Output I/O error")]
    Io(#[from] std::io::Error),

    /// The session thread could not be spawned.
    #[error("Failed to spawn session thread: {0}")]
    Thread(String),
}
