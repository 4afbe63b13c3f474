//! RAII wrappers for GDI surfaces and device contexts.

use std::ffi::c_void;
use std::ptr;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, PatBlt, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLACKNESS, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ,
};

use crate::error::CaptureError;
use crate::{CaptureResult, BYTES_PER_PIXEL};

/// A memory DC with a top-down 32-bit DIB selected into it.
///
/// Owns the DC, the bitmap and the pixel mapping; move-only, released on
/// drop in reverse acquisition order.
pub struct GdiSurface {
    dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    bits: *mut u8,
    width: u32,
    height: u32,
}

// The raw pixel pointer is only dereferenced through &self/&mut self.
unsafe impl Send for GdiSurface {}

impl GdiSurface {
    /// Allocate a surface of the given dimensions.
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        let width = width.max(1);
        let height = height.max(1);

        let info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                // Negative height selects a top-down DIB, so the pixel
                // mapping starts at the visually first row.
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: (BYTES_PER_PIXEL * 8) as u16,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        unsafe {
            let dc = CreateCompatibleDC(None);
            if dc.is_invalid() {
                return Err(CaptureError::WindowsApi {
                    message: "Failed to create memory DC".to_string(),
                    source: None,
                });
            }

            let mut bits: *mut c_void = ptr::null_mut();
            let bitmap = match CreateDIBSection(
                Some(dc),
                &info,
                DIB_RGB_COLORS,
                &mut bits,
                None,
                0,
            ) {
                Ok(bitmap) if !bits.is_null() => bitmap,
                Ok(bitmap) => {
                    let _ = DeleteObject(bitmap.into());
                    let _ = DeleteDC(dc);
                    return Err(CaptureError::WindowsApi {
                        message: "DIB section has no pixel mapping".to_string(),
                        source: None,
                    });
                }
                Err(e) => {
                    let _ = DeleteDC(dc);
                    return Err(e.into());
                }
            };

            let previous = SelectObject(dc, bitmap.into());

            Ok(Self {
                dc,
                bitmap,
                previous,
                bits: bits as *mut u8,
                width,
                height,
            })
        }
    }

    /// The memory DC the bitmap is selected into.
    pub fn dc(&self) -> HDC {
        self.dc
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the pixel mapping in bytes.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// The surface pixels, top-down BGRA, stride = width * 4.
    pub fn pixels(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.bits, self.byte_len()) }
    }

    /// Fill the whole surface with black.
    pub fn clear_black(&self) {
        unsafe {
            let _ = PatBlt(
                self.dc,
                0,
                0,
                self.width as i32,
                self.height as i32,
                BLACKNESS,
            );
        }
    }
}

impl Drop for GdiSurface {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
            let _ = DeleteObject(self.bitmap.into());
            let _ = DeleteDC(self.dc);
        }
    }
}

/// RAII handle for a window or screen device context.
pub struct WindowDc {
    hwnd: Option<HWND>,
    dc: HDC,
}

// HDC use is confined to the owning capture thread at any one time.
unsafe impl Send for WindowDc {}

impl WindowDc {
    /// Acquire the DC of the whole screen.
    pub fn screen() -> CaptureResult<Self> {
        let dc = unsafe { GetDC(None) };
        if dc.is_invalid() {
            return Err(CaptureError::WindowsApi {
                message: "Failed to acquire screen DC".to_string(),
                source: None,
            });
        }

        Ok(Self { hwnd: None, dc })
    }

    pub fn dc(&self) -> HDC {
        self.dc
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.dc);
        }
    }
}
