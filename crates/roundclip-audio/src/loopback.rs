//! Event-driven WASAPI loopback capture.

use std::ffi::c_void;

use bytes::Bytes;
use tracing::{debug, info, instrument, trace, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, S_FALSE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Media::Audio::{
    eConsole, eRender, IAudioCaptureClient, IAudioClient, IMMDevice, IMMDeviceEnumerator,
    MMDeviceEnumerator, AUDCLNT_SHAREMODE_SHARED, AUDCLNT_STREAMFLAGS_EVENTCALLBACK,
    AUDCLNT_STREAMFLAGS_LOOPBACK, WAVEFORMATEX, WAVEFORMATEXTENSIBLE,
};
use windows::Win32::Media::KernelStreaming::KSDATAFORMAT_SUBTYPE_IEEE_FLOAT;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject};

use roundclip_types::CancellationToken;

use crate::error::AudioError;
use crate::format::MixFormat;
use crate::{AudioResult, EVENT_WAIT_TIMEOUT_MS};

// WAVEFORMATEX format tags.
const FORMAT_TAG_PCM: u16 = 0x0001;
const FORMAT_TAG_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_TAG_EXTENSIBLE: u16 = 0xFFFE;

// AUDCLNT_BUFFERFLAGS_SILENT: the packet carries no rendered data.
const BUFFER_FLAG_SILENT: u32 = 0x2;

/// Initialize COM for the current thread if not already initialized.
fn ensure_com_initialized() -> AudioResult<()> {
    unsafe {
        // S_FALSE means COM was already initialized on this thread.
        let result = CoInitializeEx(None, COINIT_MULTITHREADED);
        if result.is_err() && result != S_FALSE {
            return Err(AudioError::WindowsApi {
                message: "Failed to initialize COM".to_string(),
                source: None,
            });
        }
    }
    Ok(())
}

/// Owned event handle, closed on drop.
struct EventHandle(HANDLE);

unsafe impl Send for EventHandle {}

impl Drop for EventHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Loopback capture of the default render endpoint.
///
/// Open and drive the capture from the same thread; the capture loop is
/// blocking and paced by the audio engine's buffer-period event.
pub struct LoopbackCapture {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    event: EventHandle,
    format: MixFormat,
    running: bool,
}

unsafe impl Send for LoopbackCapture {}

impl LoopbackCapture {
    /// Open the default render device in shared event-driven loopback mode.
    #[instrument(name = "loopback_open")]
    pub fn open() -> AudioResult<Self> {
        ensure_com_initialized()?;

        let device = default_render_device()?;
        let audio_client: IAudioClient = unsafe { device.Activate(CLSCTX_ALL, None)? };

        let (format, raw_format) = unsafe {
            let raw = audio_client.GetMixFormat()?;
            (parse_mix_format(raw)?, raw)
        };

        let result = unsafe {
            audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_EVENTCALLBACK,
                0, // engine default buffer duration
                0,
                raw_format,
                None,
            )
        };
        unsafe { CoTaskMemFree(Some(raw_format as *const c_void)) };
        result?;

        let event = EventHandle(unsafe { CreateEventW(None, false, false, None)? });
        unsafe { audio_client.SetEventHandle(event.0)? };

        let capture_client: IAudioCaptureClient = unsafe { audio_client.GetService()? };

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            float = format.is_float,
            "Loopback capture opened"
        );

        Ok(Self {
            audio_client,
            capture_client,
            event,
            format,
            running: false,
        })
    }

    /// The format packets are delivered in.
    pub fn format(&self) -> &MixFormat {
        &self.format
    }

    /// Capture until cancelled, invoking `handler` once per packet.
    ///
    /// Blocks the calling thread. The handler receives the packet's PCM
    /// bytes and its frame count; silent packets arrive as zero-filled
    /// buffers of the correct size so timing stays continuous.
    #[instrument(name = "loopback_capture", skip(self, handler, token))]
    pub fn capture<F>(&mut self, mut handler: F, token: CancellationToken) -> AudioResult<()>
    where
        F: FnMut(&[u8], u32),
    {
        if self.running {
            return Err(AudioError::AlreadyStarted);
        }

        self.running = true;
        unsafe { self.audio_client.Start()? };
        debug!("Loopback capture running");

        let result = self.capture_loop(&mut handler, &token);

        unsafe {
            let _ = self.audio_client.Stop();
        }
        self.running = false;
        debug!("Loopback capture stopped");

        result
    }

    fn capture_loop<F>(&self, handler: &mut F, token: &CancellationToken) -> AudioResult<()>
    where
        F: FnMut(&[u8], u32),
    {
        while !token.is_cancelled() {
            let wait = unsafe { WaitForSingleObject(self.event.0, EVENT_WAIT_TIMEOUT_MS) };
            if wait == WAIT_TIMEOUT {
                // Spurious wake; the render stream may simply be idle.
                trace!("Buffer event timed out");
                continue;
            }
            if wait != WAIT_OBJECT_0 {
                return Err(AudioError::DeviceLost);
            }

            self.drain_packets(handler)?;
        }

        Ok(())
    }

    /// Deliver every packet currently available to the handler.
    fn drain_packets<F>(&self, handler: &mut F) -> AudioResult<()>
    where
        F: FnMut(&[u8], u32),
    {
        loop {
            let packet_frames = unsafe { self.capture_client.GetNextPacketSize()? };
            if packet_frames == 0 {
                return Ok(());
            }

            let mut data_ptr: *mut u8 = std::ptr::null_mut();
            let mut frames = 0u32;
            let mut flags = 0u32;

            unsafe {
                self.capture_client
                    .GetBuffer(&mut data_ptr, &mut frames, &mut flags, None, None)?;
            }

            if frames > 0 {
                let silent = (flags & BUFFER_FLAG_SILENT) != 0;
                if silent || data_ptr.is_null() {
                    let silence: Bytes = self.format.silent_buffer(frames);
                    handler(&silence, frames);
                } else {
                    let bytes = unsafe {
                        std::slice::from_raw_parts(data_ptr, self.format.byte_len(frames))
                    };
                    handler(bytes, frames);
                }
            }

            unsafe {
                let released = self.capture_client.ReleaseBuffer(frames);
                if let Err(e) = released {
                    warn!("ReleaseBuffer failed: {e}");
                    return Err(e.into());
                }
            }
        }
    }
}

impl Drop for LoopbackCapture {
    fn drop(&mut self) {
        if self.running {
            unsafe {
                let _ = self.audio_client.Stop();
            }
        }
        // The COM interfaces and the event handle release themselves.
    }
}

fn default_render_device() -> AudioResult<IMMDevice> {
    let enumerator: IMMDeviceEnumerator =
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)? };

    unsafe {
        enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|_| AudioError::NoRenderDevice)
    }
}

/// Read the negotiated format out of a `WAVEFORMATEX` blob.
fn parse_mix_format(raw: *const WAVEFORMATEX) -> AudioResult<MixFormat> {
    if raw.is_null() {
        return Err(AudioError::FormatNotSupported("null mix format".to_string()));
    }

    unsafe {
        let base = *raw;

        let (is_float, channel_mask) = match base.wFormatTag {
            FORMAT_TAG_EXTENSIBLE => {
                let ext = &*(raw as *const WAVEFORMATEXTENSIBLE);
                (
                    ext.SubFormat == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT,
                    ext.dwChannelMask,
                )
            }
            FORMAT_TAG_IEEE_FLOAT => (true, 0),
            FORMAT_TAG_PCM => (false, 0),
            tag => {
                return Err(AudioError::FormatNotSupported(format!(
                    "format tag {tag:#06x}"
                )))
            }
        };

        Ok(MixFormat {
            sample_rate: base.nSamplesPerSec,
            channels: base.nChannels,
            bits_per_sample: base.wBitsPerSample,
            is_float,
            channel_mask,
            block_align: base.nBlockAlign,
        })
    }
}
