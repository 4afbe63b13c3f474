//! Trigger evaluation and capture-session orchestration.
//!
//! This crate owns the top-level state machine: round-state changes are
//! evaluated against the configured triggers, at most one recording
//! session runs at a time, and each session drives a timed capture loop
//! feeding one frame encoder backend.

#[cfg(windows)]
mod capture_loop;
mod error;
mod pacing;
mod service;
mod session;

#[cfg(windows)]
pub use capture_loop::CaptureSessionFactory;
pub use error::EngineError;
pub use pacing::FramePacer;
pub use service::{RecorderService, RoundSource, SettingsSource};
pub use session::{SessionFactory, SessionRequest, SessionShared};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
