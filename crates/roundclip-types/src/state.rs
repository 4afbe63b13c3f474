//! Session stop reasons.

use serde::{Deserialize, Serialize};

/// Why a recording session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    /// Recording was disabled in the settings.
    Disabled,

    /// The round ended or no round is active.
    NoActiveRound,

    /// The round no longer intersects the configured triggers.
    TriggersNoLongerMatch,

    /// The target window disappeared mid-session.
    WindowLost,

    /// The capture loop or encoder failed.
    CaptureError { message: String },

    /// The owning service was disposed.
    Disposed,
}

impl StopKind {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::Disabled => "Recording disabled".to_string(),
            Self::NoActiveRound => "No active round".to_string(),
            Self::TriggersNoLongerMatch => "Triggers no longer match".to_string(),
            Self::WindowLost => "Target window no longer available".to_string(),
            Self::CaptureError { message } => format!("Capture error: {message}"),
            Self::Disposed => "Recorder disposed".to_string(),
        }
    }

    /// Returns true for reasons that represent a mid-session failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::WindowLost | Self::CaptureError { .. })
    }
}
