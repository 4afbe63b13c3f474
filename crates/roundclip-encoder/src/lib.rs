//! Frame encoder backends.
//!
//! Three interchangeable encoders behind one contract: animated GIF,
//! uncompressed AVI, and the Media Foundation sink writer for the
//! H.264/VC-1/MPEG-2 container family, the last with hardware-accelerator
//! enumeration and selection. The backend is chosen from the output file
//! extension.

mod avi;
mod clock;
mod codecs;
mod error;
mod gif;
mod hardware;
#[cfg(windows)]
mod mf;

pub use avi::AviSink;
pub use clock::SampleClock;
pub use codecs::{
    codec_options, normalize_codec_id, CodecDescriptor, ContainerKind, FALLBACK_CODEC_ID,
};
pub use error::EncoderError;
pub use gif::GifSink;
pub use hardware::{
    hardware_options, normalize_hardware_option, HardwareEncoderOption, HardwareSelection,
    HW_OPTION_AUTO, HW_OPTION_SOFTWARE,
};
#[cfg(windows)]
pub use mf::{MfRuntime, MfSink};

use std::path::Path;

use roundclip_types::normalize_extension;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Bytes per pixel of the canvas frames handed to a sink.
pub const BYTES_PER_PIXEL: usize = 4;

/// Lower clamp for the computed automatic bitrate, bits per second.
pub const MIN_AUTO_BITRATE: u64 = 1_000_000;

/// Geometry and rate of one encoding session.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Canvas width in pixels.
    pub width: u32,

    /// Canvas height in pixels.
    pub height: u32,

    /// Frames per second the capture loop delivers.
    pub frame_rate: u32,

    /// Codec id for the chosen extension.
    pub codec_id: String,

    /// Hardware acceleration selection for the native backend.
    pub hardware: HardwareSelection,

    /// Configured video bitrate in bits per second; 0 picks automatically.
    pub video_bitrate: u32,
}

impl EncoderConfig {
    /// Expected byte length of one frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// The bitrate the native backend targets.
    ///
    /// A configured bitrate wins; 0 yields `width*height*fps*8` clamped
    /// into `[1_000_000, i32::MAX]`.
    pub fn target_bitrate(&self) -> u32 {
        if self.video_bitrate > 0 {
            return self.video_bitrate;
        }

        let auto = self.width as u64 * self.height as u64 * self.frame_rate as u64 * 8;
        auto.clamp(MIN_AUTO_BITRATE, i32::MAX as u64) as u32
    }
}

/// A pluggable frame encoder.
///
/// Frames arrive as top-down 32-bit BGRA at canvas dimensions, strictly in
/// capture order. `finalize` is idempotent; dropping an unfinalized sink
/// finalizes best-effort.
pub trait FrameSink: Send {
    /// Append one frame.
    fn write_frame(&mut self, pixels: &[u8]) -> EncoderResult<()>;

    /// Flush and close the container. Safe to call more than once.
    fn finalize(&mut self) -> EncoderResult<()>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the frame sink for an output path, chosen by extension.
pub fn create_frame_sink(
    path: &Path,
    config: &EncoderConfig,
) -> EncoderResult<Box<dyn FrameSink>> {
    let extension = normalize_extension(
        path.extension()
            .map(|e| e.to_string_lossy())
            .unwrap_or_default()
            .as_ref(),
    );

    match ContainerKind::for_extension(&extension) {
        ContainerKind::Gif => Ok(Box::new(GifSink::create(path, config)?)),
        ContainerKind::RawAvi => Ok(Box::new(AviSink::create(path, config)?)),
        kind => create_native_sink(path, config, kind),
    }
}

#[cfg(windows)]
fn create_native_sink(
    path: &Path,
    config: &EncoderConfig,
    kind: ContainerKind,
) -> EncoderResult<Box<dyn FrameSink>> {
    Ok(Box::new(MfSink::create(path, config, kind)?))
}

#[cfg(not(windows))]
fn create_native_sink(
    _path: &Path,
    _config: &EncoderConfig,
    kind: ContainerKind,
) -> EncoderResult<Box<dyn FrameSink>> {
    Err(EncoderError::NotSupported(format!(
        "{kind:?} output requires the Windows media pipeline"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, frame_rate: u32, video_bitrate: u32) -> EncoderConfig {
        EncoderConfig {
            width,
            height,
            frame_rate,
            codec_id: String::new(),
            hardware: HardwareSelection::Auto,
            video_bitrate,
        }
    }

    #[test]
    fn test_configured_bitrate_wins() {
        assert_eq!(config(1920, 1080, 30, 8_000_000).target_bitrate(), 8_000_000);
    }

    #[test]
    fn test_auto_bitrate_formula() {
        // 640*360*10*8 = 18_432_000
        assert_eq!(config(640, 360, 10, 0).target_bitrate(), 18_432_000);
    }

    #[test]
    fn test_auto_bitrate_clamps() {
        assert_eq!(config(16, 16, 5, 0).target_bitrate() as u64, MIN_AUTO_BITRATE);
        assert_eq!(config(7680, 4320, 240, 0).target_bitrate(), i32::MAX as u32);
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(config(4, 2, 30, 0).frame_len(), 32);
    }
}
