//! Per-session window capture and canvas compositing.

use std::ffi::c_void;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, SetBrushOrgEx, SetStretchBltMode, StretchBlt, HALFTONE, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{PrintWindow, PRINT_WINDOW_FLAGS};

use super::bounds::{is_window_alive, window_bounds};
use super::surface::{GdiSurface, WindowDc};
use crate::error::CaptureError;
use crate::geometry::{fit_rect, Rect};
use crate::CaptureResult;

// Renders the full window content including DirectX surfaces; absent from
// the generated bindings.
const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(2);

/// Captures one window into a fixed-size canvas, frame by frame.
///
/// The canvas keeps the dimensions the target window had when the session
/// started; the staging surface follows the window's live bounds and is
/// recreated whenever the window is resized.
pub struct WindowCapturer {
    handle: isize,
    canvas: GdiSurface,
    staging: GdiSurface,
    fallback_captures: u64,
}

impl WindowCapturer {
    /// Create a capturer for `handle` with a canvas of the given size.
    pub fn new(handle: isize, canvas_width: u32, canvas_height: u32) -> CaptureResult<Self> {
        let bounds = window_bounds(handle)?;
        let canvas = GdiSurface::new(canvas_width.max(1), canvas_height.max(1))?;
        let staging = GdiSurface::new(bounds.width(), bounds.height())?;

        debug!(
            handle,
            canvas_width = canvas.width(),
            canvas_height = canvas.height(),
            "Window capturer ready"
        );

        Ok(Self {
            handle,
            canvas,
            staging,
            fallback_captures: 0,
        })
    }

    /// Returns true while the target window still exists.
    pub fn is_alive(&self) -> bool {
        is_window_alive(self.handle)
    }

    /// Canvas dimensions.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    /// Number of frames that needed the screen-copy fallback.
    pub fn fallback_captures(&self) -> u64 {
        self.fallback_captures
    }

    /// Capture one frame and composite it into the canvas.
    ///
    /// Returns the canvas pixels as top-down BGRA at canvas dimensions.
    pub fn capture_frame(&mut self) -> CaptureResult<&[u8]> {
        if !self.is_alive() {
            return Err(CaptureError::WindowGone);
        }

        let bounds = window_bounds(self.handle)?;
        self.resize_staging_if_needed(&bounds)?;
        self.fill_staging(&bounds)?;
        self.composite()?;

        Ok(self.canvas.pixels())
    }

    fn resize_staging_if_needed(&mut self, bounds: &Rect) -> CaptureResult<()> {
        if self.staging.width() != bounds.width() || self.staging.height() != bounds.height() {
            trace!(
                width = bounds.width(),
                height = bounds.height(),
                "Target window resized, reallocating staging surface"
            );
            self.staging = GdiSurface::new(bounds.width(), bounds.height())?;
        }
        Ok(())
    }

    /// Direct off-screen window capture, falling back to copying the screen
    /// region at the window's last known position.
    fn fill_staging(&mut self, bounds: &Rect) -> CaptureResult<()> {
        let hwnd = HWND(self.handle as *mut c_void);

        let direct_ok =
            unsafe { PrintWindow(hwnd, self.staging.dc(), PW_RENDERFULLCONTENT).as_bool() };
        if direct_ok {
            return Ok(());
        }

        self.fallback_captures += 1;
        if self.fallback_captures == 1 {
            warn!(handle = self.handle, "PrintWindow failed, using screen copy");
        }

        let screen = WindowDc::screen()?;
        unsafe {
            BitBlt(
                self.staging.dc(),
                0,
                0,
                bounds.width() as i32,
                bounds.height() as i32,
                Some(screen.dc()),
                bounds.left,
                bounds.top,
                SRCCOPY,
            )
            .map_err(|e| CaptureError::CaptureFailed(e.message().to_string()))?;
        }

        Ok(())
    }

    /// Scale the staging surface into the black-cleared canvas.
    fn composite(&mut self) -> CaptureResult<()> {
        self.canvas.clear_black();

        let (dst_x, dst_y, dst_w, dst_h) = fit_rect(
            self.staging.width(),
            self.staging.height(),
            self.canvas.width(),
            self.canvas.height(),
        );

        unsafe {
            SetStretchBltMode(self.canvas.dc(), HALFTONE);
            let _ = SetBrushOrgEx(self.canvas.dc(), 0, 0, None);

            let ok = StretchBlt(
                self.canvas.dc(),
                dst_x,
                dst_y,
                dst_w,
                dst_h,
                Some(self.staging.dc()),
                0,
                0,
                self.staging.width() as i32,
                self.staging.height() as i32,
                SRCCOPY,
            )
            .as_bool();

            if !ok {
                return Err(CaptureError::CaptureFailed(
                    "StretchBlt into canvas failed".to_string(),
                ));
            }
        }

        Ok(())
    }
}
