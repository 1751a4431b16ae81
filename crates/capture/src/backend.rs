use std::sync::Arc;

use crate::descriptor::TextureFormat;
use crate::device::{GpuDevice, SurfaceSize};
use crate::error::CaptureResult;
use crate::session::FrameArrivedHandler;
use crate::source::WindowHandle;

/// A native frame checked out of the OS frame pool.
///
/// Dropping the frame hands its surface back to the pool.
pub trait NativeFrame {
    type Texture;

    fn surface(&self) -> CaptureResult<Self::Texture>;
}

/// Pull side of an OS frame pool, as seen from the frame-arrived callback.
pub trait FrameSource {
    type Frame: NativeFrame;

    /// Next queued frame, `Ok(None)` when the pool is drained, and
    /// `Err(CaptureError::PoolClosed)` once the pool has been closed.
    fn try_next_frame(&self) -> CaptureResult<Option<Self::Frame>>;
}

/// Single OS steps of establishing and tearing down a capture.
///
/// [`CaptureSession`](crate::CaptureSession) decides the order of these
/// calls and undoes completed steps when a later one fails. Implementations
/// perform exactly one step per call and keep no session state of their own.
pub trait CaptureBackend {
    type Device: GpuDevice;
    type Item;
    type Interop;
    type FramePool: FrameSource;
    type Session;
    type Subscription;

    fn device(&self) -> &Arc<Self::Device>;

    fn create_item(&self, window: WindowHandle) -> CaptureResult<Self::Item>;

    fn item_size(&self, item: &Self::Item) -> CaptureResult<SurfaceSize>;

    /// Capture-API view of [`Self::device`].
    fn create_interop_device(&self) -> CaptureResult<Self::Interop>;

    fn create_frame_pool(
        &self,
        interop: &Self::Interop,
        format: TextureFormat,
        buffers: u32,
        size: SurfaceSize,
    ) -> CaptureResult<Self::FramePool>;

    fn create_session(&self, pool: &Self::FramePool, item: &Self::Item) -> CaptureResult<Self::Session>;

    fn set_cursor_capture(&self, session: &Self::Session, enabled: bool) -> CaptureResult<()>;

    fn set_border_required(&self, session: &Self::Session, required: bool) -> CaptureResult<()>;

    /// `ticks` are 100ns units.
    fn set_min_update_interval(&self, session: &Self::Session, ticks: i64) -> CaptureResult<()>;

    /// Route frame-arrived events of `pool` and the closed event of `item`
    /// to `handler`.
    fn subscribe(
        &self,
        pool: &Self::FramePool,
        item: &Self::Item,
        handler: FrameArrivedHandler<Self::Device>,
    ) -> CaptureResult<Self::Subscription>;

    fn start(&self, session: &Self::Session) -> CaptureResult<()>;

    fn unsubscribe(&self, subscription: Self::Subscription);

    fn close_session(&self, session: Self::Session);

    fn close_frame_pool(&self, pool: Self::FramePool);

    fn release_item(&self, item: Self::Item);
}
