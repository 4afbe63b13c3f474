//! Top-level window enumeration for the locator.

use tracing::{debug, instrument, trace};
use windows::Win32::Foundation::{CloseHandle, BOOL, HANDLE, HWND, LPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
};

use crate::error::CaptureError;
use crate::locator::WindowCandidate;
use crate::CaptureResult;

/// Enumerate every top-level window as a locator candidate.
///
/// Invisible windows are kept; they score lower instead of being skipped.
#[instrument(name = "enumerate_window_candidates")]
pub fn enumerate_window_candidates() -> CaptureResult<Vec<WindowCandidate>> {
    let mut candidates: Vec<WindowCandidate> = Vec::new();

    unsafe {
        EnumWindows(
            Some(enum_window_callback),
            LPARAM(&mut candidates as *mut Vec<WindowCandidate> as isize),
        )
        .map_err(|e| CaptureError::WindowsApi {
            message: "Failed to enumerate windows".to_string(),
            source: Some(e),
        })?;
    }

    debug!(count = candidates.len(), "Enumerated window candidates");
    Ok(candidates)
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let candidates = &mut *(lparam.0 as *mut Vec<WindowCandidate>);

    let mut title_buffer = [0u16; 256];
    let title_len = GetWindowTextW(hwnd, &mut title_buffer);
    let title = String::from_utf16_lossy(&title_buffer[..title_len.max(0) as usize]);

    let mut class_buffer = [0u16; 256];
    let class_len = GetClassNameW(hwnd, &mut class_buffer);
    let class_name = String::from_utf16_lossy(&class_buffer[..class_len.max(0) as usize]);

    let mut process_id: u32 = 0;
    GetWindowThreadProcessId(hwnd, Some(&mut process_id));
    let process_name = process_name_for_pid(process_id).unwrap_or_default();

    let candidate = WindowCandidate {
        handle: hwnd.0 as isize,
        title,
        class_name,
        process_name,
        order_index: candidates.len(),
        visible: IsWindowVisible(hwnd).as_bool(),
    };

    trace!(
        handle = candidate.handle,
        title = %candidate.title,
        process = %candidate.process_name,
        "Window candidate"
    );
    candidates.push(candidate);

    BOOL::from(true)
}

/// Resolve a process id to its image name without the extension.
fn process_name_for_pid(process_id: u32) -> Option<String> {
    if process_id == 0 {
        return None;
    }

    unsafe {
        let handle: HANDLE =
            OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

        let mut buffer = [0u16; 512];
        let mut size = buffer.len() as u32;
        let result = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(handle);
        result.ok()?;

        let path = String::from_utf16_lossy(&buffer[..size as usize]);
        let stem = std::path::Path::new(&path).file_stem()?.to_string_lossy();
        Some(stem.into_owned())
    }
}
