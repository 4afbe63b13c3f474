//! WASAPI system-audio loopback capture.
//!
//! This crate captures the audio being rendered to the default output
//! device in shared, event-driven loopback mode and hands raw PCM packets
//! to a caller-supplied handler. It is a standalone capability: nothing
//! here multiplexes audio into the video containers.

mod error;
mod format;
#[cfg(windows)]
mod loopback;

pub use error::AudioError;
pub use format::MixFormat;
#[cfg(windows)]
pub use loopback::LoopbackCapture;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// How long to wait for the buffer-period event before treating the wake
/// as spurious, in milliseconds.
pub const EVENT_WAIT_TIMEOUT_MS: u32 = 2_000;
