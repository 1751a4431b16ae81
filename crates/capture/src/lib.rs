//! Lens capture core.
//!
//! Enumerates capturable windows, runs one OS capture session at a time,
//! converts every arriving surface into a shader-readable texture and hands
//! the newest one to the render loop through a single-slot mailbox.

pub mod backend;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod platform;
pub mod publisher;
pub mod session;
pub mod source;
pub mod texture;

#[cfg(test)]
mod mock;

pub use backend::{CaptureBackend, FrameSource, NativeFrame};
pub use descriptor::{CaptureDescriptor, TextureFormat, FRAME_POOL_DEPTH};
pub use device::{GpuDevice, PixelBuffer, SurfaceDesc, SurfaceSize};
pub use error::{CaptureError, CaptureResult};
pub use publisher::LatestFrame;
pub use session::{CaptureSession, CaptureStats, Frame, FrameArrivedHandler, SessionState};
pub use source::{enumerate_windows, CaptureSource, Rect, WindowHandle};
pub use texture::{convert_surface, CapturedTexture};

#[cfg(windows)]
pub use platform::windows::{D3D11Device, WgcBackend};
