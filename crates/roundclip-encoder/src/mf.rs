//! Media Foundation sink-writer backend.
//!
//! Maps the output extension to a (video subtype, transcode container)
//! pair and drives one `IMFSinkWriter` video stream. The Media Foundation
//! runtime is started and shut down through a process-wide reference
//! count so concurrent sinks share one startup.

use std::ffi::c_void;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use windows::core::{Interface, GUID, HSTRING, PWSTR};
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_UNKNOWN;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, D3D11_CREATE_DEVICE_BGRA_SUPPORT,
    D3D11_CREATE_DEVICE_VIDEO_SUPPORT, D3D11_SDK_VERSION,
};
use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIAdapter, IDXGIFactory1};
use windows::Win32::Media::MediaFoundation::{
    IMFAttributes, IMFDXGIDeviceManager, IMFMediaBuffer, IMFSample, IMFSinkWriter,
    MFCreateAttributes, MFCreateDXGIDeviceManager, MFCreateMediaType, MFCreateMemoryBuffer,
    MFCreateSample, MFCreateSinkWriterFromURL, MFMediaType_Video, MFShutdown, MFStartup,
    MFTEnumEx, MFT_CATEGORY_VIDEO_ENCODER, MFT_ENUM_FLAG_ASYNCMFT, MFT_ENUM_FLAG_HARDWARE,
    MFT_ENUM_FLAG_SORTANDFILTER, MFT_ENUM_FLAG_SYNCMFT, MFT_FRIENDLY_NAME_Attribute,
    MFT_REGISTER_TYPE_INFO, MFVideoFormat_H264, MFVideoFormat_MPEG2, MFVideoFormat_RGB32,
    MFVideoFormat_WVC1, MFVideoInterlace_Progressive, MFSTARTUP_FULL,
    MFTranscodeContainerType_ASF, MFTranscodeContainerType_MPEG2, MFTranscodeContainerType_MPEG4,
    MF_MT_AVG_BITRATE, MF_MT_DEFAULT_STRIDE, MF_MT_FRAME_RATE, MF_MT_FRAME_SIZE,
    MF_MT_INTERLACE_MODE, MF_MT_MAJOR_TYPE, MF_MT_PIXEL_ASPECT_RATIO, MF_MT_SUBTYPE,
    MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, MF_SINK_WRITER_D3D_MANAGER,
    MF_SINK_WRITER_DISABLE_THROTTLING, MF_TRANSCODE_CONTAINERTYPE, MF_VERSION,
};
use windows::Win32::System::Com::CoTaskMemFree;

use crate::clock::SampleClock;
use crate::codecs::ContainerKind;
use crate::hardware::HardwareSelection;
use crate::{EncoderConfig, EncoderError, EncoderResult, FrameSink, BYTES_PER_PIXEL};

/// Live acquisitions of the Media Foundation runtime.
static MF_REFCOUNT: Mutex<u32> = Mutex::new(0);

/// Counted hold on the process-wide Media Foundation runtime.
///
/// The first acquisition calls `MFStartup`, the last release calls
/// `MFShutdown`. Move-only; release happens on drop.
pub struct MfRuntime(());

impl MfRuntime {
    /// Acquire the runtime, starting it if this is the first holder.
    pub fn acquire() -> EncoderResult<Self> {
        let mut count = MF_REFCOUNT.lock();
        if *count == 0 {
            unsafe { MFStartup(MF_VERSION, MFSTARTUP_FULL)? };
            debug!("Media Foundation started");
        }
        *count += 1;
        Ok(Self(()))
    }
}

impl Drop for MfRuntime {
    fn drop(&mut self) {
        let mut count = MF_REFCOUNT.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            unsafe {
                let _ = MFShutdown();
            }
            debug!("Media Foundation shut down");
        }
    }
}

/// The (video subtype, transcode container) pair for a native container.
fn media_guids(kind: ContainerKind) -> (GUID, GUID) {
    match kind {
        ContainerKind::Wmv => (MFVideoFormat_WVC1, MFTranscodeContainerType_ASF),
        ContainerKind::Mpeg2 => (MFVideoFormat_MPEG2, MFTranscodeContainerType_MPEG2),
        // Gif/RawAvi never reach this backend; Mp4 is the default family.
        _ => (MFVideoFormat_H264, MFTranscodeContainerType_MPEG4),
    }
}

fn pack_2x32(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// Media Foundation sink-writer frame encoder.
pub struct MfSink {
    // Field order keeps the writer released before the runtime.
    writer: Option<IMFSinkWriter>,
    _runtime: MfRuntime,
    stream_index: u32,
    width: u32,
    height: u32,
    clock: SampleClock,
    frames_written: u64,
    finalized: bool,
}

// The sink writer is only driven from the owning capture thread.
unsafe impl Send for MfSink {}

impl MfSink {
    /// Create a sink writing to `path` for the given container family.
    #[instrument(name = "mf_sink_create", skip(config), fields(path = %path.display()))]
    pub fn create(path: &Path, config: &EncoderConfig, kind: ContainerKind) -> EncoderResult<Self> {
        let runtime = MfRuntime::acquire()?;
        let (subtype, container) = media_guids(kind);

        let attributes = sink_attributes(&config.hardware, &container)?;
        let url = HSTRING::from(path.to_string_lossy().into_owned());
        let writer: IMFSinkWriter =
            unsafe { MFCreateSinkWriterFromURL(&url, None, Some(&attributes))? };

        let stream_index = configure_streams(&writer, config, &subtype)?;
        unsafe { writer.BeginWriting()? };

        info!(
            width = config.width,
            height = config.height,
            frame_rate = config.frame_rate,
            bitrate = config.target_bitrate(),
            codec = kind.codec_name(),
            "Media Foundation sink ready"
        );

        Ok(Self {
            writer: Some(writer),
            _runtime: runtime,
            stream_index,
            width: config.width,
            height: config.height,
            clock: SampleClock::new(config.frame_rate),
            frames_written: 0,
            finalized: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    fn build_sample(&mut self, pixels: &[u8]) -> EncoderResult<IMFSample> {
        let buffer: IMFMediaBuffer = unsafe { MFCreateMemoryBuffer(pixels.len() as u32)? };

        unsafe {
            let mut data: *mut u8 = std::ptr::null_mut();
            buffer.Lock(&mut data, None, None)?;
            // The canvas is top-down with stride == width*4, matching the
            // positive MF_MT_DEFAULT_STRIDE declared on the input type.
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), data, pixels.len());
            buffer.Unlock()?;
            buffer.SetCurrentLength(pixels.len() as u32)?;
        }

        let sample: IMFSample = unsafe { MFCreateSample()? };
        let (time, duration) = self.clock.next_sample();
        unsafe {
            sample.AddBuffer(&buffer)?;
            sample.SetSampleTime(time)?;
            sample.SetSampleDuration(duration)?;
        }

        Ok(sample)
    }
}

impl FrameSink for MfSink {
    fn write_frame(&mut self, pixels: &[u8]) -> EncoderResult<()> {
        if pixels.len() != self.frame_len() {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes, got {}",
                self.frame_len(),
                pixels.len()
            )));
        }

        if self.writer.is_none() {
            return Err(EncoderError::Initialization(
                "sink already finalized".to_string(),
            ));
        }

        let sample = self.build_sample(pixels)?;
        if let Some(writer) = self.writer.as_ref() {
            unsafe { writer.WriteSample(self.stream_index, &sample)? };
            self.frames_written += 1;
        }
        Ok(())
    }

    #[instrument(name = "mf_sink_finalize", skip(self))]
    fn finalize(&mut self) -> EncoderResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        if let Some(writer) = self.writer.take() {
            unsafe { writer.Finalize()? };
        }
        debug!(frames = self.frames_written, "Media Foundation sink finalized");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "media-foundation"
    }
}

impl Drop for MfSink {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                warn!("Sink finalize on drop failed: {e}");
            }
        }
    }
}

/// Build the sink-writer attribute store for a hardware selection.
fn sink_attributes(
    hardware: &HardwareSelection,
    container: &GUID,
) -> EncoderResult<IMFAttributes> {
    let mut attributes: Option<IMFAttributes> = None;
    unsafe { MFCreateAttributes(&mut attributes, 4)? };
    let attributes = attributes
        .ok_or_else(|| EncoderError::Initialization("attribute store unavailable".to_string()))?;

    unsafe {
        attributes.SetGUID(&MF_TRANSCODE_CONTAINERTYPE, container)?;
        attributes.SetUINT32(&MF_SINK_WRITER_DISABLE_THROTTLING, 1)?;
    }

    match hardware {
        HardwareSelection::Software => unsafe {
            attributes.SetUINT32(&MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, 0)?;
        },
        HardwareSelection::Auto => unsafe {
            attributes.SetUINT32(&MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, 1)?;
        },
        HardwareSelection::Adapter {
            luid_high,
            luid_low,
        } => unsafe {
            attributes.SetUINT32(&MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, 1)?;
            match dxgi_manager_for_adapter(*luid_high, *luid_low) {
                Ok(manager) => {
                    attributes.SetUnknown(&MF_SINK_WRITER_D3D_MANAGER, &manager)?;
                }
                Err(e) => {
                    // The adapter may have been unplugged since it was
                    // selected; auto still produces output.
                    warn!("Requested adapter unavailable, using automatic: {e}");
                }
            }
        },
    }

    Ok(attributes)
}

/// Configure the output (encoded) and input (RGB32) stream types.
fn configure_streams(
    writer: &IMFSinkWriter,
    config: &EncoderConfig,
    subtype: &GUID,
) -> EncoderResult<u32> {
    unsafe {
        let output = MFCreateMediaType()?;
        output.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?;
        output.SetGUID(&MF_MT_SUBTYPE, subtype)?;
        output.SetUINT32(&MF_MT_AVG_BITRATE, config.target_bitrate())?;
        output.SetUINT64(&MF_MT_FRAME_SIZE, pack_2x32(config.width, config.height))?;
        output.SetUINT64(&MF_MT_FRAME_RATE, pack_2x32(config.frame_rate, 1))?;
        output.SetUINT64(&MF_MT_PIXEL_ASPECT_RATIO, pack_2x32(1, 1))?;
        output.SetUINT32(&MF_MT_INTERLACE_MODE, MFVideoInterlace_Progressive.0 as u32)?;

        let stream_index = writer.AddStream(&output)?;

        let input = MFCreateMediaType()?;
        input.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?;
        input.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_RGB32)?;
        input.SetUINT64(&MF_MT_FRAME_SIZE, pack_2x32(config.width, config.height))?;
        input.SetUINT64(&MF_MT_FRAME_RATE, pack_2x32(config.frame_rate, 1))?;
        input.SetUINT64(&MF_MT_PIXEL_ASPECT_RATIO, pack_2x32(1, 1))?;
        input.SetUINT32(&MF_MT_INTERLACE_MODE, MFVideoInterlace_Progressive.0 as u32)?;
        input.SetUINT32(
            &MF_MT_DEFAULT_STRIDE,
            config.width * BYTES_PER_PIXEL as u32,
        )?;

        writer.SetInputMediaType(stream_index, &input, None)?;
        Ok(stream_index)
    }
}

/// Create a DXGI device manager bound to the adapter with this LUID.
fn dxgi_manager_for_adapter(
    luid_high: u32,
    luid_low: u32,
) -> EncoderResult<IMFDXGIDeviceManager> {
    let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1()? };

    let mut selected: Option<IDXGIAdapter> = None;
    for index in 0.. {
        let adapter = match unsafe { factory.EnumAdapters1(index) } {
            Ok(adapter) => adapter,
            Err(_) => break,
        };
        let desc = unsafe { adapter.GetDesc1()? };
        if desc.AdapterLuid.HighPart as u32 == luid_high && desc.AdapterLuid.LowPart == luid_low {
            selected = Some(adapter.cast()?);
            break;
        }
    }

    let adapter = selected.ok_or_else(|| {
        EncoderError::Initialization(format!(
            "no adapter with LUID {luid_high:08x}:{luid_low:08x}"
        ))
    })?;

    let mut device: Option<ID3D11Device> = None;
    unsafe {
        D3D11CreateDevice(
            &adapter,
            D3D_DRIVER_TYPE_UNKNOWN,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT | D3D11_CREATE_DEVICE_VIDEO_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            None,
        )?;
    }
    let device = device
        .ok_or_else(|| EncoderError::Initialization("D3D11 device unavailable".to_string()))?;

    let mut reset_token = 0u32;
    let mut manager: Option<IMFDXGIDeviceManager> = None;
    unsafe {
        MFCreateDXGIDeviceManager(&mut reset_token, &mut manager)?;
    }
    let manager = manager
        .ok_or_else(|| EncoderError::Initialization("DXGI manager unavailable".to_string()))?;

    unsafe { manager.ResetDevice(&device, reset_token)? };
    Ok(manager)
}

/// Friendly names of the encoders registered for this container's codec.
pub fn enumerate_native_encoders(kind: ContainerKind) -> EncoderResult<Vec<String>> {
    let _runtime = MfRuntime::acquire()?;
    let (subtype, _) = media_guids(kind);

    let type_info = MFT_REGISTER_TYPE_INFO {
        guidMajorType: MFMediaType_Video,
        guidSubtype: subtype,
    };

    let mut activates: *mut Option<windows::Win32::Media::MediaFoundation::IMFActivate> =
        std::ptr::null_mut();
    let mut count = 0u32;

    unsafe {
        MFTEnumEx(
            MFT_CATEGORY_VIDEO_ENCODER,
            MFT_ENUM_FLAG_HARDWARE
                | MFT_ENUM_FLAG_SYNCMFT
                | MFT_ENUM_FLAG_ASYNCMFT
                | MFT_ENUM_FLAG_SORTANDFILTER,
            None,
            Some(&type_info),
            &mut activates,
            &mut count,
        )?;
    }

    let mut names = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        // Take ownership so each activation object is released on drop.
        let activate = unsafe { activates.add(index).read() };
        let Some(activate) = activate else { continue };

        let mut value = PWSTR::null();
        let mut length = 0u32;
        let name = unsafe {
            match activate.GetAllocatedString(&MFT_FRIENDLY_NAME_Attribute, &mut value, &mut length)
            {
                Ok(()) => {
                    let name = value.to_string().unwrap_or_default();
                    CoTaskMemFree(Some(value.0 as *const c_void));
                    name
                }
                Err(_) => String::new(),
            }
        };

        if name.is_empty() {
            names.push(format!("{} encoder", kind.codec_name()));
        } else {
            names.push(name);
        }
    }

    unsafe { CoTaskMemFree(Some(activates as *const c_void)) };

    debug!(?kind, count = names.len(), "Enumerated native encoders");
    Ok(names)
}
