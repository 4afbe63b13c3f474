//! Negotiated mix-format description.

use bytes::Bytes;

/// The shared-mode mix format negotiated with the audio engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixFormat {
    /// Samples per second.
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Bits per sample per channel.
    pub bits_per_sample: u16,

    /// True for IEEE float samples, false for integer PCM.
    pub is_float: bool,

    /// Speaker position mask; 0 when the format does not report one.
    pub channel_mask: u32,

    /// Bytes per frame across all channels.
    pub block_align: u16,
}

impl MixFormat {
    /// Byte size of `frames` frames in this format.
    pub fn byte_len(&self, frames: u32) -> usize {
        frames as usize * self.block_align as usize
    }

    /// A zero-filled buffer of `frames` frames.
    ///
    /// Silent packets are synthesized with this so the handler observes a
    /// gapless stream.
    pub fn silent_buffer(&self, frames: u32) -> Bytes {
        Bytes::from(vec![0u8; self.byte_len(frames)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_float() -> MixFormat {
        MixFormat {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 32,
            is_float: true,
            channel_mask: 0x3,
            block_align: 8,
        }
    }

    #[test]
    fn test_byte_len() {
        assert_eq!(stereo_float().byte_len(480), 3_840);
        assert_eq!(stereo_float().byte_len(0), 0);
    }

    #[test]
    fn test_silent_buffer_is_zeroed() {
        let silent = stereo_float().silent_buffer(16);
        assert_eq!(silent.len(), 128);
        assert!(silent.iter().all(|b| *b == 0));
    }
}
