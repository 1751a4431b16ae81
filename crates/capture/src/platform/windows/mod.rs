//! Windows.Graphics.Capture + Direct3D 11 backend.

mod d3d11;
mod enumerate;
mod wgc;

pub use d3d11::{D3D11Device, D3D11Texture, D3D11View};
pub(crate) use enumerate::top_level_windows;
pub use wgc::{WgcBackend, WgcFrame, WgcFramePool, WgcSubscription};

use crate::error::CaptureError;
use crate::source::WindowHandle;
use windows::Win32::Foundation::HWND;

pub(crate) fn os_error(context: &'static str) -> impl FnOnce(windows::core::Error) -> CaptureError {
    move |e| CaptureError::os(context, e.code().0)
}

pub(crate) fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.raw() as *mut _)
}
