//! Window liveness and bounds queries.

use std::ffi::c_void;
use std::mem;

use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_EXTENDED_FRAME_BOUNDS};
use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, IsWindow};

use crate::error::CaptureError;
use crate::geometry::Rect;
use crate::CaptureResult;

/// Returns true while the window handle still refers to a live window.
pub fn is_window_alive(handle: isize) -> bool {
    unsafe { IsWindow(Some(HWND(handle as *mut c_void))).as_bool() }
}

/// Query the window's current on-screen bounds.
///
/// Prefers the compositor-reported extended frame rectangle, which excludes
/// the invisible resize borders, and falls back to the raw window rect.
pub fn window_bounds(handle: isize) -> CaptureResult<Rect> {
    let hwnd = HWND(handle as *mut c_void);
    let mut rect = RECT::default();

    let dwm_ok = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_EXTENDED_FRAME_BOUNDS,
            &mut rect as *mut RECT as *mut c_void,
            mem::size_of::<RECT>() as u32,
        )
        .is_ok()
    };

    if !dwm_ok {
        unsafe {
            GetWindowRect(hwnd, &mut rect).map_err(|_| CaptureError::BoundsUnavailable)?;
        }
    }

    let bounds = Rect {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    };

    if bounds.is_empty() {
        return Err(CaptureError::BoundsUnavailable);
    }

    Ok(bounds)
}
