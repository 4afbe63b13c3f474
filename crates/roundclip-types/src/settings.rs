//! Recorder settings snapshot and normalization.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extensions the encoder factory knows how to open.
pub const KNOWN_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "mkv", "flv", "wmv", "asf", "mpg", "vob", "avi", "gif",
];

/// Extension used when the configured one is unrecognized.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Lowest accepted capture frame rate.
pub const MIN_FRAME_RATE: u32 = 5;

/// Highest accepted capture frame rate.
pub const MAX_FRAME_RATE: u32 = 240;

/// Upper clamp for the configured video bitrate, bits per second.
pub const MAX_VIDEO_BITRATE: u32 = 500_000_000;

/// Upper clamp for the configured audio bitrate, bits per second.
pub const MAX_AUDIO_BITRATE: u32 = 1_000_000;

/// A point-in-time snapshot of the recording configuration.
///
/// The orchestrator reads a fresh snapshot on every evaluation; nothing in
/// this struct is cached between evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Master enable flag for trigger-driven recording.
    pub enabled: bool,

    /// Round-type names that start a recording. `*` matches any round.
    pub round_triggers: Vec<String>,

    /// Terror names that start a recording. `*` matches any terror.
    pub terror_triggers: Vec<String>,

    /// Directory recordings are written into.
    pub output_dir: PathBuf,

    /// Output container extension (without the dot).
    pub extension: String,

    /// Codec id for the chosen extension.
    pub codec_id: String,

    /// Hardware encoder option id (`auto`, `software` or an adapter LUID).
    pub hardware_option: String,

    /// Capture frame rate.
    pub frame_rate: u32,

    /// Window hint string, alternatives separated by `|` or `;`.
    pub window_hint: String,

    /// Video bitrate in bits per second; 0 means pick automatically.
    pub video_bitrate: u32,

    /// Audio bitrate in bits per second; 0 means pick automatically.
    pub audio_bitrate: u32,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            round_triggers: Vec::new(),
            terror_triggers: Vec::new(),
            output_dir: PathBuf::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            codec_id: String::new(),
            hardware_option: "auto".to_string(),
            frame_rate: 30,
            window_hint: String::new(),
            video_bitrate: 0,
            audio_bitrate: 0,
        }
    }
}

/// Normalize an output extension to a known container extension.
///
/// Total: trims whitespace and a leading dot, lowercases, and falls back to
/// [`DEFAULT_EXTENSION`] for anything unrecognized.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if KNOWN_EXTENSIONS.contains(&trimmed.as_str()) {
        trimmed
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

/// Clamp a frame rate into the supported range.
pub fn normalize_frame_rate(frame_rate: i64) -> u32 {
    frame_rate.clamp(MIN_FRAME_RATE as i64, MAX_FRAME_RATE as i64) as u32
}

/// Clamp a video bitrate into the supported range.
pub fn normalize_video_bitrate(bitrate: i64) -> u32 {
    bitrate.clamp(0, MAX_VIDEO_BITRATE as i64) as u32
}

/// Clamp an audio bitrate into the supported range.
pub fn normalize_audio_bitrate(bitrate: i64) -> u32 {
    bitrate.clamp(0, MAX_AUDIO_BITRATE as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension_known() {
        assert_eq!(normalize_extension("mp4"), "mp4");
        assert_eq!(normalize_extension(".GIF"), "gif");
        assert_eq!(normalize_extension("  Avi "), "avi");
    }

    #[test]
    fn test_normalize_extension_unknown_falls_back() {
        assert_eq!(normalize_extension("exe"), DEFAULT_EXTENSION);
        assert_eq!(normalize_extension(""), DEFAULT_EXTENSION);
    }

    #[test]
    fn test_normalize_frame_rate_in_range() {
        for f in [-10_i64, 0, 4, 5, 30, 240, 241, 100_000] {
            let result = normalize_frame_rate(f);
            assert!((MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&result));
        }
    }

    #[test]
    fn test_normalize_frame_rate_idempotent() {
        for f in [-10_i64, 0, 30, 500] {
            let once = normalize_frame_rate(f);
            assert_eq!(normalize_frame_rate(once as i64), once);
        }
    }

    #[test]
    fn test_normalize_bitrates() {
        assert_eq!(normalize_video_bitrate(-1), 0);
        assert_eq!(normalize_video_bitrate(6_000_000), 6_000_000);
        assert_eq!(normalize_video_bitrate(i64::MAX), MAX_VIDEO_BITRATE);
        assert_eq!(normalize_audio_bitrate(-1), 0);
        assert_eq!(normalize_audio_bitrate(2_000_000), MAX_AUDIO_BITRATE);
    }
}
