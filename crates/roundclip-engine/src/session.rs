//! Session state shared between the orchestrator and the capture thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use roundclip_types::{CancellationSource, CancellationToken, StopKind};

use crate::EngineResult;

/// State shared between the orchestrator and one capture thread.
pub struct SessionShared {
    /// Human-readable reason recording started.
    pub trigger_description: String,

    /// Where the recording is being written.
    pub output_path: PathBuf,

    stop_reason: Mutex<Option<StopKind>>,
    error: AtomicBool,
    owner_stop: AtomicBool,
}

impl SessionShared {
    pub fn new(trigger_description: String, output_path: PathBuf) -> Self {
        Self {
            trigger_description,
            output_path,
            stop_reason: Mutex::new(None),
            error: AtomicBool::new(false),
            owner_stop: AtomicBool::new(false),
        }
    }

    /// Record why the session ended. The first recorded reason wins; the
    /// error flag follows the reason's severity.
    pub fn record_stop(&self, kind: StopKind) {
        let mut reason = self.stop_reason.lock();
        if reason.is_none() {
            if kind.is_error() {
                self.error.store(true, Ordering::SeqCst);
            }
            *reason = Some(kind);
        }
    }

    /// The recorded stop reason, if any.
    pub fn stop_reason(&self) -> Option<StopKind> {
        self.stop_reason.lock().clone()
    }

    /// Mark that the orchestrator itself initiated the stop.
    pub fn mark_owner_stop(&self) {
        self.owner_stop.store(true, Ordering::SeqCst);
    }

    pub fn owner_stopped(&self) -> bool {
        self.owner_stop.load(Ordering::SeqCst)
    }

    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::SeqCst)
    }
}

/// Everything a session factory needs to construct a capture loop.
///
/// All values are pre-normalized by the orchestrator.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Timestamped output file.
    pub output_path: PathBuf,

    /// Window hint string from the settings.
    pub window_hint: String,

    /// Capture frame rate.
    pub frame_rate: u32,

    /// Normalized output extension.
    pub extension: String,

    /// Normalized codec id.
    pub codec_id: String,

    /// Normalized hardware option id.
    pub hardware_option: String,

    /// Configured video bitrate; 0 picks automatically.
    pub video_bitrate: u32,

    /// Why this session is starting.
    pub trigger_description: String,
}

/// The capture loop, ready to run on its session thread.
pub type SessionBody = Box<dyn FnOnce(CancellationToken, Arc<SessionShared>) + Send>;

/// Resolves a session request into a runnable capture loop.
///
/// `prepare` performs all fallible setup (window location, encoder
/// construction) synchronously, so a failed start never leaves a
/// half-constructed session behind.
pub trait SessionFactory: Send + Sync {
    fn prepare(&self, request: &SessionRequest) -> EngineResult<SessionBody>;
}

/// The single active session slot's contents.
pub(crate) struct ActiveSession {
    pub shared: Arc<SessionShared>,
    pub cancel: CancellationSource,
    pub join: Option<JoinHandle<()>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stop_reason_wins() {
        let shared = SessionShared::new("t".into(), PathBuf::from("x"));
        shared.record_stop(StopKind::WindowLost);
        shared.record_stop(StopKind::NoActiveRound);
        assert_eq!(shared.stop_reason(), Some(StopKind::WindowLost));
    }

    #[test]
    fn test_error_flag_follows_reason() {
        let shared = SessionShared::new("t".into(), PathBuf::from("x"));
        assert!(!shared.has_error());
        shared.record_stop(StopKind::CaptureError {
            message: "boom".into(),
        });
        assert!(shared.has_error());

        let clean = SessionShared::new("t".into(), PathBuf::from("x"));
        clean.record_stop(StopKind::NoActiveRound);
        assert!(!clean.has_error());
    }
}
