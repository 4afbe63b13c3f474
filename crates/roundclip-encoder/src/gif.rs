//! Animated GIF frame sink.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tracing::{debug, instrument, warn};

use crate::{EncoderConfig, EncoderError, EncoderResult, FrameSink, BYTES_PER_PIXEL};

/// Animated GIF encoder.
///
/// Frames are buffered and the animation is written in one shot when the
/// sink is finalized; GIF has no useful streaming mode at these sizes.
pub struct GifSink {
    path: PathBuf,
    width: u32,
    height: u32,
    delay_centis: u32,
    frames: Vec<Bytes>,
    finalized: bool,
}

/// Per-frame delay in centiseconds: `round(100 / fps)`, at least 1.
pub(crate) fn delay_centis(frame_rate: u32) -> u32 {
    let frame_rate = frame_rate.max(1);
    ((100 + frame_rate / 2) / frame_rate).max(1)
}

impl GifSink {
    /// Create a sink writing to `path` at the configured geometry.
    #[instrument(name = "gif_sink_create", skip(config), fields(path = %path.display()))]
    pub fn create(path: &Path, config: &EncoderConfig) -> EncoderResult<Self> {
        debug!(
            width = config.width,
            height = config.height,
            delay_centis = delay_centis(config.frame_rate),
            "Creating GIF sink"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: config.width,
            height: config.height,
            delay_centis: delay_centis(config.frame_rate),
            frames: Vec::new(),
            finalized: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Convert a buffered BGRA frame into an owned RGBA image.
    fn to_rgba(&self, bgra: &[u8]) -> RgbaImage {
        let mut rgba = Vec::with_capacity(bgra.len());
        for px in bgra.chunks_exact(BYTES_PER_PIXEL) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], 0xFF]);
        }

        // Geometry was validated on write, so this cannot fail.
        RgbaImage::from_raw(self.width, self.height, rgba)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    fn flush_animation(&mut self) -> EncoderResult<()> {
        let file = File::create(&self.path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(Repeat::Infinite)?;

        let delay = Delay::from_numer_denom_ms(self.delay_centis * 10, 1);

        if self.frames.is_empty() {
            // A zero-frame GIF is structurally invalid; emit one black
            // filler frame instead.
            warn!("No frames captured, writing filler frame");
            let filler = RgbaImage::new(self.width.max(1), self.height.max(1));
            encoder.encode_frame(Frame::from_parts(filler, 0, 0, delay))?;
            return Ok(());
        }

        for bgra in std::mem::take(&mut self.frames) {
            let image = self.to_rgba(&bgra);
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        }

        Ok(())
    }
}

impl FrameSink for GifSink {
    fn write_frame(&mut self, pixels: &[u8]) -> EncoderResult<()> {
        if pixels.len() != self.frame_len() {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes, got {}",
                self.frame_len(),
                pixels.len()
            )));
        }

        self.frames.push(Bytes::copy_from_slice(pixels));
        Ok(())
    }

    #[instrument(name = "gif_sink_finalize", skip(self))]
    fn finalize(&mut self) -> EncoderResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let frame_count = self.frames.len();
        self.flush_animation()?;
        debug!(frames = frame_count, "GIF written");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gif"
    }
}

impl Drop for GifSink {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                warn!("GIF finalize on drop failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HardwareSelection;

    fn test_config(width: u32, height: u32, frame_rate: u32) -> EncoderConfig {
        EncoderConfig {
            width,
            height,
            frame_rate,
            codec_id: "gif".to_string(),
            hardware: HardwareSelection::Auto,
            video_bitrate: 0,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("roundclip-gif-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_delay_centis() {
        assert_eq!(delay_centis(30), 3);
        assert_eq!(delay_centis(60), 2);
        assert_eq!(delay_centis(24), 4);
        assert_eq!(delay_centis(10), 10);
        // High rates never reach a zero delay.
        assert_eq!(delay_centis(240), 1);
    }

    #[test]
    fn test_rejects_wrong_frame_size() {
        let path = temp_path("wrong-size.gif");
        let mut sink = GifSink::create(&path, &test_config(4, 2, 30)).unwrap();
        assert!(sink.write_frame(&[0u8; 3]).is_err());
        sink.finalized = true; // skip flushing in drop
    }

    #[test]
    fn test_writes_animation_and_finalize_is_idempotent() {
        let path = temp_path("anim.gif");
        let mut sink = GifSink::create(&path, &test_config(4, 2, 30)).unwrap();
        sink.write_frame(&[0x40u8; 32]).unwrap();
        sink.write_frame(&[0x80u8; 32]).unwrap();
        sink.finalize().unwrap();
        sink.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_zero_frames_yields_filler() {
        let path = temp_path("empty.gif");
        let mut sink = GifSink::create(&path, &test_config(4, 2, 30)).unwrap();
        sink.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert!(bytes.len() > 6);
        std::fs::remove_file(&path).ok();
    }
}
