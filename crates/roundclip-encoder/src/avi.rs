//! Uncompressed RIFF/AVI frame sink.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::{EncoderConfig, EncoderError, EncoderResult, FrameSink, BYTES_PER_PIXEL};

const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// Legacy uncompressed AVI writer.
///
/// The container and its single 32-bit video stream are opened at creation
/// time; every frame appends one `00db` chunk. Frame-count fields and the
/// `idx1` index are patched in at finalize.
pub struct AviSink {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    frame_index: u32,
    /// Bottom-up row staging, reused across frames.
    flip_buffer: Vec<u8>,
    /// (offset relative to the movi list data, size) per frame.
    index_entries: Vec<(u32, u32)>,
    riff_size_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
    movi_size_pos: u64,
    movi_data_start: u64,
    finalized: bool,
}

impl AviSink {
    /// Create the container at `path` with the configured geometry.
    #[instrument(name = "avi_sink_create", skip(config), fields(path = %path.display()))]
    pub fn create(path: &Path, config: &EncoderConfig) -> EncoderResult<Self> {
        let file = File::create(path)?;
        let mut sink = Self {
            writer: BufWriter::new(file),
            width: config.width,
            height: config.height,
            frame_index: 0,
            flip_buffer: Vec::new(),
            index_entries: Vec::new(),
            riff_size_pos: 0,
            total_frames_pos: 0,
            stream_length_pos: 0,
            movi_size_pos: 0,
            movi_data_start: 0,
            finalized: false,
        };

        sink.write_headers(config.frame_rate.max(1))?;
        debug!(
            width = sink.width,
            height = sink.height,
            "AVI container opened"
        );
        Ok(sink)
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    fn write_headers(&mut self, frame_rate: u32) -> EncoderResult<()> {
        let frame_size = self.frame_len() as u32;
        let w = &mut self.writer;

        w.write_all(b"RIFF")?;
        self.riff_size_pos = stream_pos(w)?;
        w.write_all(&0u32.to_le_bytes())?; // patched at finalize
        w.write_all(b"AVI ")?;

        // hdrl list: avih + one strl.
        w.write_all(b"LIST")?;
        w.write_all(&(4 + 8 + 56 + 8 + 4 + 8 + 56 + 8 + 40_u32).to_le_bytes())?;
        w.write_all(b"hdrl")?;

        w.write_all(b"avih")?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(&(1_000_000 / frame_rate).to_le_bytes())?; // us per frame
        w.write_all(&(frame_size * frame_rate).to_le_bytes())?; // max bytes/sec
        w.write_all(&0u32.to_le_bytes())?; // padding granularity
        w.write_all(&AVIF_HASINDEX.to_le_bytes())?;
        self.total_frames_pos = stream_pos(w)?;
        w.write_all(&0u32.to_le_bytes())?; // total frames, patched
        w.write_all(&0u32.to_le_bytes())?; // initial frames
        w.write_all(&1u32.to_le_bytes())?; // streams
        w.write_all(&frame_size.to_le_bytes())?; // suggested buffer size
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&[0u8; 16])?; // reserved

        w.write_all(b"LIST")?;
        w.write_all(&(4 + 8 + 56 + 8 + 40_u32).to_le_bytes())?;
        w.write_all(b"strl")?;

        w.write_all(b"strh")?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(b"vids")?;
        w.write_all(b"DIB ")?;
        w.write_all(&0u32.to_le_bytes())?; // flags
        w.write_all(&0u16.to_le_bytes())?; // priority
        w.write_all(&0u16.to_le_bytes())?; // language
        w.write_all(&0u32.to_le_bytes())?; // initial frames
        w.write_all(&1u32.to_le_bytes())?; // scale
        w.write_all(&frame_rate.to_le_bytes())?; // rate
        w.write_all(&0u32.to_le_bytes())?; // start
        self.stream_length_pos = stream_pos(w)?;
        w.write_all(&0u32.to_le_bytes())?; // length, patched
        w.write_all(&frame_size.to_le_bytes())?; // suggested buffer size
        w.write_all(&u32::MAX.to_le_bytes())?; // quality: default
        w.write_all(&0u32.to_le_bytes())?; // sample size
        w.write_all(&0u16.to_le_bytes())?; // rcFrame.left
        w.write_all(&0u16.to_le_bytes())?; // rcFrame.top
        w.write_all(&(self.width as u16).to_le_bytes())?;
        w.write_all(&(self.height as u16).to_le_bytes())?;

        // strf: BITMAPINFOHEADER, positive height = bottom-up rows.
        w.write_all(b"strf")?;
        w.write_all(&40u32.to_le_bytes())?;
        w.write_all(&40u32.to_le_bytes())?; // biSize
        w.write_all(&(self.width as i32).to_le_bytes())?;
        w.write_all(&(self.height as i32).to_le_bytes())?;
        w.write_all(&1u16.to_le_bytes())?; // planes
        w.write_all(&((BYTES_PER_PIXEL * 8) as u16).to_le_bytes())?;
        w.write_all(&0u32.to_le_bytes())?; // BI_RGB
        w.write_all(&frame_size.to_le_bytes())?; // biSizeImage
        w.write_all(&[0u8; 16])?; // resolution + palette fields

        // movi list, grows as frames arrive.
        w.write_all(b"LIST")?;
        self.movi_size_pos = stream_pos(w)?;
        w.write_all(&4u32.to_le_bytes())?; // patched at finalize
        w.write_all(b"movi")?;
        self.movi_data_start = stream_pos(w)?;

        Ok(())
    }

    /// Copy `pixels` (top-down) into the bottom-up staging buffer.
    fn flip_rows(&mut self, pixels: &[u8]) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        if self.flip_buffer.len() != pixels.len() {
            self.flip_buffer = vec![0u8; pixels.len()];
        }

        for (row, chunk) in pixels.chunks_exact(stride).enumerate() {
            let dst_row = self.height as usize - 1 - row;
            self.flip_buffer[dst_row * stride..(dst_row + 1) * stride].copy_from_slice(chunk);
        }
    }

    fn write_index(&mut self) -> EncoderResult<()> {
        let w = &mut self.writer;
        w.write_all(b"idx1")?;
        w.write_all(&((self.index_entries.len() * 16) as u32).to_le_bytes())?;

        for (offset, size) in &self.index_entries {
            w.write_all(b"00db")?;
            w.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            w.write_all(&offset.to_le_bytes())?;
            w.write_all(&size.to_le_bytes())?;
        }

        Ok(())
    }

    fn patch_u32(&mut self, pos: u64, value: u32) -> EncoderResult<()> {
        self.writer.seek(SeekFrom::Start(pos))?;
        self.writer.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

fn stream_pos<W: Seek>(w: &mut W) -> EncoderResult<u64> {
    Ok(w.stream_position()?)
}

impl FrameSink for AviSink {
    fn write_frame(&mut self, pixels: &[u8]) -> EncoderResult<()> {
        if pixels.len() != self.frame_len() {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes, got {}",
                self.frame_len(),
                pixels.len()
            )));
        }

        self.flip_rows(pixels);

        let offset = (stream_pos(&mut self.writer)? - self.movi_data_start + 4) as u32;
        let size = self.flip_buffer.len() as u32;

        self.writer.write_all(b"00db")?;
        self.writer.write_all(&size.to_le_bytes())?;
        self.writer.write_all(&self.flip_buffer)?;

        self.index_entries.push((offset, size));
        self.frame_index += 1;
        Ok(())
    }

    #[instrument(name = "avi_sink_finalize", skip(self))]
    fn finalize(&mut self) -> EncoderResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let movi_end = stream_pos(&mut self.writer)?;
        self.write_index()?;
        let file_end = stream_pos(&mut self.writer)?;

        self.patch_u32(self.riff_size_pos, (file_end - 8) as u32)?;
        let frames = self.frame_index;
        self.patch_u32(self.total_frames_pos, frames)?;
        self.patch_u32(self.stream_length_pos, frames)?;
        self.patch_u32(self.movi_size_pos, (movi_end - self.movi_data_start + 4) as u32)?;

        self.writer.seek(SeekFrom::Start(file_end))?;
        self.writer.flush()?;

        debug!(frames, "AVI finalized");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "avi"
    }
}

impl Drop for AviSink {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                warn!("AVI finalize on drop failed: {e}");
            }
        }
    }
}
