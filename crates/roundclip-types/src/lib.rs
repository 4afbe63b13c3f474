//! Shared types for the roundclip recording subsystem.
//!
//! This crate defines the plain data types exchanged between the trigger
//! evaluator, the capture loop and the encoder backends: the settings
//! snapshot, trigger sets, stop reasons, filename sanitization and the
//! cancellation primitive. Everything here is host-portable.

mod cancel;
mod naming;
mod settings;
mod state;
mod triggers;

pub use cancel::{cancellation_pair, CancellationSource, CancellationToken};
pub use naming::sanitize_file_component;
pub use settings::{
    normalize_audio_bitrate, normalize_extension, normalize_frame_rate, normalize_video_bitrate,
    RecorderSettings, DEFAULT_EXTENSION, KNOWN_EXTENSIONS, MAX_AUDIO_BITRATE, MAX_FRAME_RATE,
    MAX_VIDEO_BITRATE, MIN_FRAME_RATE,
};
pub use state::StopKind;
pub use triggers::{split_terror_key, RoundFacts, TriggerSet, WILDCARD_TRIGGER};
