use parking_lot::Mutex;
use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    IsWindowVisible,
};

use crate::source::{RawWindow, Rect, WindowHandle};

/// Every top-level window in z-order, unfiltered.
pub(crate) fn top_level_windows() -> Vec<RawWindow> {
    let windows = Mutex::new(Vec::new());

    unsafe {
        if let Err(e) = EnumWindows(Some(enum_windows_proc), LPARAM(&windows as *const _ as isize)) {
            tracing::warn!("EnumWindows failed: {:?}", e);
        }
    }

    windows.into_inner()
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &*(lparam.0 as *const Mutex<Vec<RawWindow>>);

    let visible = IsWindowVisible(hwnd).as_bool();
    let title = if visible { window_title(hwnd) } else { None };

    let mut rect = RECT::default();
    let rect = match GetWindowRect(hwnd, &mut rect) {
        Ok(()) => Rect::new(rect.left, rect.top, rect.right, rect.bottom),
        Err(_) => return true.into(),
    };

    let mut process_id = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut process_id));

    windows.lock().push(RawWindow {
        handle: WindowHandle::from_raw(hwnd.0 as isize),
        visible,
        title,
        rect,
        process_id,
    });

    true.into()
}

unsafe fn window_title(hwnd: HWND) -> Option<String> {
    let len = GetWindowTextLengthW(hwnd);
    if len <= 0 {
        return Some(String::new());
    }

    let mut buf = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(hwnd, &mut buf);
    if copied <= 0 {
        return None;
    }
    String::from_utf16(&buf[..copied as usize]).ok()
}
