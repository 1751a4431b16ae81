use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::backend::{CaptureBackend, FrameSource, NativeFrame};
use crate::descriptor::{CaptureDescriptor, FRAME_POOL_DEPTH};
use crate::device::{GpuDevice, SurfaceSize};
use crate::error::{CaptureError, CaptureResult};
use crate::publisher::LatestFrame;
use crate::source::WindowHandle;
use crate::texture::{convert_surface, CapturedTexture};

/// Frame type produced by a session over backend `B`.
pub type Frame<B> = CapturedTexture<<B as CaptureBackend>::Device>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Capturing,
    ShutDown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_published: u64,
    pub conversion_failures: u64,
    /// Callbacks that fired after their capture had been stopped.
    pub stale_callbacks: u64,
}

#[derive(Default)]
struct Counters {
    frames_published: AtomicU64,
    conversion_failures: AtomicU64,
    stale_callbacks: AtomicU64,
}

/// State shared between the session and its frame-arrived callbacks.
struct Shared<D: GpuDevice> {
    frames: LatestFrame<CapturedTexture<D>>,
    counters: Counters,
    target_closed: AtomicBool,
    cpu_readback: AtomicBool,
    next_frame_id: AtomicU64,
}

impl<D: GpuDevice> Default for Shared<D> {
    fn default() -> Self {
        Self {
            frames: LatestFrame::new(),
            counters: Counters::default(),
            target_closed: AtomicBool::new(false),
            cpu_readback: AtomicBool::new(false),
            next_frame_id: AtomicU64::new(1),
        }
    }
}

/// Callback target handed to the backend when a capture starts.
///
/// Bound to the capture it was created for: once that capture is stopped
/// every call is counted as stale and otherwise ignored.
pub struct FrameArrivedHandler<D: GpuDevice> {
    device: Arc<D>,
    shared: Arc<Shared<D>>,
    epoch: u64,
}

impl<D: GpuDevice> Clone for FrameArrivedHandler<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            shared: Arc::clone(&self.shared),
            epoch: self.epoch,
        }
    }
}

impl<D: GpuDevice> FrameArrivedHandler<D> {
    fn is_current(&self) -> bool {
        self.shared.frames.is_open(self.epoch)
    }

    fn stale(&self) {
        self.shared.counters.stale_callbacks.fetch_add(1, Ordering::Relaxed);
        trace!("Ignoring callback for stopped capture (epoch {})", self.epoch);
    }

    /// Pull the next frame from `pool`, convert it and publish it.
    ///
    /// Runs on the OS callback thread. Never blocks on the render thread.
    pub fn on_frame_arrived<P>(&self, pool: &P)
    where
        P: FrameSource,
        P::Frame: NativeFrame<Texture = D::Texture>,
    {
        if !self.is_current() {
            self.stale();
            return;
        }

        let frame = match pool.try_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(CaptureError::PoolClosed) => {
                self.stale();
                return;
            }
            Err(e) => {
                warn!("Failed to take frame from pool: {}", e);
                return;
            }
        };

        let id = self.shared.next_frame_id.fetch_add(1, Ordering::Relaxed);
        let converted = frame
            .surface()
            .and_then(|surface| convert_surface(self.device.as_ref(), &surface, id));
        drop(frame);
        let converted = converted.and_then(|texture| self.read_back(texture));

        match converted {
            Ok(texture) => {
                if self.shared.frames.publish(self.epoch, Arc::new(texture)) {
                    self.shared.counters.frames_published.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stale();
                }
            }
            Err(e) => {
                self.shared.counters.conversion_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Dropped captured frame {}: {}", id, e);
            }
        }
    }

    /// Attach a CPU copy of the pixels when readback is enabled.
    fn read_back(&self, texture: CapturedTexture<D>) -> CaptureResult<CapturedTexture<D>> {
        if !self.shared.cpu_readback.load(Ordering::Relaxed) {
            return Ok(texture);
        }
        let pixels = self.device.read_pixels(texture.texture())?;
        Ok(texture.with_pixels(pixels))
    }

    /// The captured window went away.
    pub fn on_target_closed(&self) {
        if !self.is_current() {
            self.stale();
            return;
        }
        self.shared.target_closed.store(true, Ordering::Release);
        info!("Capture target closed");
    }
}

struct ActiveCapture<B: CaptureBackend> {
    window: WindowHandle,
    size: SurfaceSize,
    pool: B::FramePool,
    session: B::Session,
    subscription: B::Subscription,
}

/// Sub-objects of a capture being started. Whatever is still held when this
/// drops is torn down in reverse acquisition order.
struct Activation<'a, B: CaptureBackend> {
    backend: &'a B,
    item: Option<B::Item>,
    pool: Option<B::FramePool>,
    session: Option<B::Session>,
    subscription: Option<B::Subscription>,
}

impl<B: CaptureBackend> Drop for Activation<'_, B> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.backend.unsubscribe(subscription);
        }
        if let Some(session) = self.session.take() {
            self.backend.close_session(session);
        }
        if let Some(pool) = self.pool.take() {
            self.backend.close_frame_pool(pool);
        }
        if let Some(item) = self.item.take() {
            self.backend.release_item(item);
        }
    }
}

/// Capture of one window at a time into a latest-frame slot.
///
/// Owned by the render-loop side. Frame callbacks run on OS threads and
/// only touch state shared through [`FrameArrivedHandler`].
pub struct CaptureSession<B: CaptureBackend> {
    backend: B,
    state: SessionState,
    descriptor: Option<CaptureDescriptor>,
    item: Option<B::Item>,
    active: Option<ActiveCapture<B>>,
    shared: Arc<Shared<B::Device>>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SessionState::Uninitialized,
            descriptor: None,
            item: None,
            active: None,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Store the descriptor used by every later capture.
    ///
    /// Calling this again while not capturing replaces the descriptor.
    pub fn initialize(&mut self, descriptor: CaptureDescriptor) -> CaptureResult<()> {
        match self.state {
            SessionState::ShutDown => return Err(CaptureError::ShutDown),
            SessionState::Capturing => {
                warn!("Ignoring initialize while capturing");
                return Err(CaptureError::AlreadyCapturing);
            }
            SessionState::Initialized => {
                warn!("Capture session initialized twice, replacing descriptor");
            }
            SessionState::Uninitialized => {}
        }

        info!(
            "Capture session initialized ({} fps hint, {}, cursor={}, border={})",
            descriptor.frame_rate,
            descriptor.format.label(),
            descriptor.capture_cursor,
            descriptor.capture_border
        );
        self.descriptor = Some(descriptor);
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Begin capturing `window`.
    ///
    /// All or nothing: on failure every sub-object created so far is
    /// released and the session stays initialized and idle. Failing while
    /// already capturing leaves the running capture untouched.
    pub fn start_capture(&mut self, window: WindowHandle) -> CaptureResult<()> {
        match self.state {
            SessionState::Initialized => {}
            SessionState::Capturing => {
                let current = self.target().map(|w| w.to_string()).unwrap_or_default();
                warn!("Cannot capture {}: already capturing {}", window, current);
                return Err(CaptureError::AlreadyCapturing);
            }
            SessionState::Uninitialized => {
                warn!("Cannot capture {}: session not initialized", window);
                return Err(CaptureError::NotInitialized);
            }
            SessionState::ShutDown => {
                warn!("Cannot capture {}: session shut down", window);
                return Err(CaptureError::ShutDown);
            }
        }
        let descriptor = self.descriptor.ok_or(CaptureError::NotInitialized)?;

        match self.activate(window, &descriptor) {
            Ok((item, active)) => {
                if let Some(previous) = self.item.replace(item) {
                    self.backend.release_item(previous);
                }
                info!(
                    "Capturing window {} at {}x{}",
                    window, active.size.width, active.size.height
                );
                self.active = Some(active);
                self.state = SessionState::Capturing;
                Ok(())
            }
            Err(e) => {
                self.shared.frames.close();
                match e.os_code() {
                    Some(code) => error!("Failed to start capture of {} (0x{:08X}): {}", window, code, e),
                    None => error!("Failed to start capture of {}: {}", window, e),
                }
                Err(e)
            }
        }
    }

    fn activate(
        &self,
        window: WindowHandle,
        descriptor: &CaptureDescriptor,
    ) -> CaptureResult<(B::Item, ActiveCapture<B>)> {
        let backend = &self.backend;
        let mut partial = Activation {
            backend,
            item: None,
            pool: None,
            session: None,
            subscription: None,
        };

        let item = partial.item.insert(backend.create_item(window)?);
        let size = backend.item_size(item)?;
        let interop = backend.create_interop_device()?;
        let pool = partial.pool.insert(backend.create_frame_pool(
            &interop,
            descriptor.format,
            FRAME_POOL_DEPTH,
            size,
        )?);
        let session = partial.session.insert(backend.create_session(pool, item)?);
        self.apply_hints(session, descriptor);

        self.shared.target_closed.store(false, Ordering::Release);
        let epoch = self.shared.frames.open();
        let handler = FrameArrivedHandler {
            device: Arc::clone(backend.device()),
            shared: Arc::clone(&self.shared),
            epoch,
        };
        partial.subscription = Some(backend.subscribe(pool, item, handler)?);
        backend.start(session)?;

        let (Some(item), Some(pool), Some(session), Some(subscription)) = (
            partial.item.take(),
            partial.pool.take(),
            partial.session.take(),
            partial.subscription.take(),
        ) else {
            return Err(CaptureError::Unsupported("incomplete capture activation".into()));
        };

        Ok((
            item,
            ActiveCapture {
                window,
                size,
                pool,
                session,
                subscription,
            },
        ))
    }

    fn apply_hints(&self, session: &B::Session, descriptor: &CaptureDescriptor) {
        if let Err(e) = self.backend.set_cursor_capture(session, descriptor.capture_cursor) {
            debug!("Cursor capture hint not applied: {}", e);
        }
        if let Err(e) = self.backend.set_border_required(session, descriptor.capture_border) {
            debug!("Border hint not applied: {}", e);
        }
        if let Some(ticks) = descriptor.min_update_interval_ticks() {
            if let Err(e) = self.backend.set_min_update_interval(session, ticks) {
                debug!("Frame rate hint not applied: {}", e);
            }
        }
    }

    /// Stop the running capture. No-op when idle.
    ///
    /// Callbacks still in flight after this returns are ignored.
    pub fn stop_capture(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        self.shared.frames.close();
        self.backend.unsubscribe(active.subscription);
        self.backend.close_session(active.session);
        self.backend.close_frame_pool(active.pool);
        self.state = SessionState::Initialized;

        info!("Stopped capturing window {}", active.window);
    }

    /// Stop capturing and release everything. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::ShutDown {
            return;
        }
        self.stop_capture();
        if let Some(item) = self.item.take() {
            self.backend.release_item(item);
        }
        self.shared.frames.clear();
        self.descriptor = None;
        self.state = SessionState::ShutDown;
        debug!("Capture session shut down");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == SessionState::Capturing
    }

    pub fn descriptor(&self) -> Option<&CaptureDescriptor> {
        self.descriptor.as_ref()
    }

    /// Window being captured.
    pub fn target(&self) -> Option<WindowHandle> {
        self.active.as_ref().map(|a| a.window)
    }

    /// Size of the frame pool of the running capture.
    pub fn capture_size(&self) -> Option<SurfaceSize> {
        self.active.as_ref().map(|a| a.size)
    }

    pub fn has_new_frame(&self) -> bool {
        self.shared.frames.has_new_frame()
    }

    /// Clear the new-frame flag and return the most recent frame, which is
    /// the previous one again when nothing new arrived.
    pub fn latest_frame(&self) -> Option<Arc<Frame<B>>> {
        self.shared.frames.take_latest()
    }

    /// Whether the window of the running capture has been closed.
    pub fn is_target_closed(&self) -> bool {
        self.is_capturing() && self.shared.target_closed.load(Ordering::Acquire)
    }

    /// Read every converted frame back to the CPU on the capture thread, so
    /// [`CapturedTexture::pixels`] is filled for the render loop.
    pub fn set_cpu_readback(&self, enabled: bool) {
        self.shared.cpu_readback.store(enabled, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CaptureStats {
        let counters = &self.shared.counters;
        CaptureStats {
            frames_published: counters.frames_published.load(Ordering::Relaxed),
            conversion_failures: counters.conversion_failures.load(Ordering::Relaxed),
            stale_callbacks: counters.stale_callbacks.load(Ordering::Relaxed),
        }
    }

    pub fn device(&self) -> &Arc<B::Device> {
        self.backend.device()
    }
}

impl<B: CaptureBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
