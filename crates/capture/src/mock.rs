//! In-memory device and capture backend for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{CaptureBackend, FrameSource, NativeFrame};
use crate::descriptor::TextureFormat;
use crate::device::{GpuDevice, PixelBuffer, SurfaceDesc, SurfaceSize};
use crate::error::{CaptureError, CaptureResult};
use crate::session::FrameArrivedHandler;
use crate::source::WindowHandle;

pub const E_FAIL: u32 = 0x8000_4005;
const E_OUTOFMEMORY: u32 = 0x8007_000E;

static NEXT_CONTENT: AtomicU64 = AtomicU64::new(1);

pub struct MockTexture {
    pub desc: SurfaceDesc,
    content: AtomicU64,
}

impl MockTexture {
    /// A BGRA8 surface with unique content.
    pub fn new(width: u32, height: u32, bind_flags: u32) -> Arc<Self> {
        Arc::new(Self {
            desc: SurfaceDesc {
                width,
                height,
                mip_levels: 1,
                array_size: 1,
                format: TextureFormat::Bgra8Unorm.dxgi(),
                sample_count: 1,
                bind_flags,
            },
            content: AtomicU64::new(NEXT_CONTENT.fetch_add(1, Ordering::Relaxed)),
        })
    }

    pub fn content(&self) -> u64 {
        self.content.load(Ordering::Acquire)
    }

    /// Write new content, as the OS does when it reuses a pool surface.
    pub fn overwrite(&self) {
        self.content
            .store(NEXT_CONTENT.fetch_add(1, Ordering::Relaxed), Ordering::Release);
    }
}

pub struct MockView;

#[derive(Default)]
pub struct MockDevice {
    copies: AtomicUsize,
    flushes: AtomicUsize,
    fail_views: AtomicBool,
    fail_allocations: AtomicBool,
    fail_readback: AtomicBool,
    readbacks: AtomicUsize,
}

impl MockDevice {
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn fail_views(&self, fail: bool) {
        self.fail_views.store(fail, Ordering::Relaxed);
    }

    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    pub fn fail_readback(&self, fail: bool) {
        self.fail_readback.store(fail, Ordering::Relaxed);
    }

    pub fn readbacks(&self) -> usize {
        self.readbacks.load(Ordering::Relaxed)
    }
}

impl GpuDevice for MockDevice {
    type Texture = Arc<MockTexture>;
    type View = MockView;

    fn describe(&self, texture: &Self::Texture) -> SurfaceDesc {
        texture.desc
    }

    fn create_texture(&self, desc: &SurfaceDesc) -> CaptureResult<Self::Texture> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(CaptureError::os("CreateTexture2D", E_OUTOFMEMORY as i32));
        }
        Ok(Arc::new(MockTexture {
            desc: *desc,
            content: AtomicU64::new(0),
        }))
    }

    fn copy_resource(&self, dst: &Self::Texture, src: &Self::Texture) -> CaptureResult<()> {
        if dst.desc.width != src.desc.width || dst.desc.height != src.desc.height {
            return Err(CaptureError::Conversion("copy between mismatched textures".into()));
        }
        dst.content.store(src.content(), Ordering::Release);
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    fn create_shader_resource_view(&self, texture: &Self::Texture) -> CaptureResult<Self::View> {
        if self.fail_views.load(Ordering::Relaxed) {
            return Err(CaptureError::os("CreateShaderResourceView", E_FAIL as i32));
        }
        if !texture.desc.is_shader_readable() {
            return Err(CaptureError::os("CreateShaderResourceView", 0x8007_0057_u32 as i32));
        }
        Ok(MockView)
    }

    fn read_pixels(&self, texture: &Self::Texture) -> CaptureResult<PixelBuffer> {
        if self.fail_readback.load(Ordering::Relaxed) {
            return Err(CaptureError::os("ID3D11DeviceContext::Map", E_FAIL as i32));
        }
        self.readbacks.fetch_add(1, Ordering::Relaxed);
        let format = texture
            .desc
            .texture_format()
            .ok_or(CaptureError::UnsupportedFormat(texture.desc.format))?;
        let len = texture.desc.width as usize * texture.desc.height as usize * format.bytes_per_pixel();
        PixelBuffer::new(
            texture.desc.width,
            texture.desc.height,
            format,
            vec![texture.content() as u8; len],
        )
    }
}

/// Backend steps, used to script failures and to check call order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    None,
    CreateItem,
    ItemSize,
    CreateInterop,
    CreateFramePool,
    CreateSession,
    Hints,
    Subscribe,
    Start,
    Unsubscribe,
    CloseSession,
    CloseFramePool,
    ReleaseItem,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateItem(WindowHandle),
    ItemSize,
    CreateInterop,
    CreateFramePool {
        format: TextureFormat,
        buffers: u32,
        size: SurfaceSize,
    },
    CreateSession,
    SetCursorCapture(bool),
    SetBorderRequired(bool),
    SetMinUpdateInterval(i64),
    Subscribe,
    Start,
    Unsubscribe,
    CloseSession,
    CloseFramePool,
    ReleaseItem,
}

impl Call {
    /// Lifecycle step of the call; hint calls have none.
    pub fn step(&self) -> Option<Step> {
        Some(match self {
            Call::CreateItem(_) => Step::CreateItem,
            Call::ItemSize => Step::ItemSize,
            Call::CreateInterop => Step::CreateInterop,
            Call::CreateFramePool { .. } => Step::CreateFramePool,
            Call::CreateSession => Step::CreateSession,
            Call::SetCursorCapture(_) | Call::SetBorderRequired(_) | Call::SetMinUpdateInterval(_) => {
                return None
            }
            Call::Subscribe => Step::Subscribe,
            Call::Start => Step::Start,
            Call::Unsubscribe => Step::Unsubscribe,
            Call::CloseSession => Step::CloseSession,
            Call::CloseFramePool => Step::CloseFramePool,
            Call::ReleaseItem => Step::ReleaseItem,
        })
    }
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Arc<MockTexture>>,
    closed: bool,
}

#[derive(Clone)]
pub struct MockPool {
    state: Arc<Mutex<PoolState>>,
    fail_surfaces: Arc<AtomicBool>,
}

impl MockPool {
    fn new(fail_surfaces: Arc<AtomicBool>) -> Self {
        Self {
            state: Arc::default(),
            fail_surfaces,
        }
    }

    fn push(&self, surface: Arc<MockTexture>) {
        self.state.lock().queue.push_back(surface);
    }
}

pub struct MockFrame {
    surface: Arc<MockTexture>,
    fail: bool,
}

impl NativeFrame for MockFrame {
    type Texture = Arc<MockTexture>;

    fn surface(&self) -> CaptureResult<Self::Texture> {
        if self.fail {
            return Err(CaptureError::os("GetInterface", E_FAIL as i32));
        }
        Ok(Arc::clone(&self.surface))
    }
}

impl FrameSource for MockPool {
    type Frame = MockFrame;

    fn try_next_frame(&self) -> CaptureResult<Option<MockFrame>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CaptureError::PoolClosed);
        }
        Ok(state.queue.pop_front().map(|surface| MockFrame {
            surface,
            fail: self.fail_surfaces.load(Ordering::Relaxed),
        }))
    }
}

pub struct MockItem;
pub struct MockSession;
pub struct MockSubscription;

#[derive(Default)]
struct BackendState {
    calls: Vec<Call>,
    failing: Option<Step>,
    subscriptions: Vec<(FrameArrivedHandler<MockDevice>, MockPool)>,
    live_items: i32,
    live_pools: i32,
    live_sessions: i32,
    live_subscriptions: i32,
}

/// Records every call and lets tests fire OS events by hand.
#[derive(Clone)]
pub struct MockBackend {
    device: Arc<MockDevice>,
    size: SurfaceSize,
    fail_surfaces: Arc<AtomicBool>,
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            device: Arc::default(),
            size,
            fail_surfaces: Arc::default(),
            state: Arc::default(),
        }
    }

    /// Make `step` fail from now on. `Step::None` clears it.
    pub fn fail_at(&self, step: Step) {
        self.state.lock().failing = (step != Step::None).then_some(step);
    }

    pub fn fail_surfaces(&self, fail: bool) {
        self.fail_surfaces.store(fail, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// No item, pool, session or subscription is left open.
    pub fn all_released(&self) -> bool {
        let state = self.state.lock();
        state.live_items == 0
            && state.live_pools == 0
            && state.live_sessions == 0
            && state.live_subscriptions == 0
    }

    pub fn handler(&self, index: usize) -> FrameArrivedHandler<MockDevice> {
        self.state.lock().subscriptions[index].0.clone()
    }

    /// An open pool, not owned by any capture, holding `surface`.
    pub fn open_pool_with(&self, surface: Arc<MockTexture>) -> MockPool {
        let pool = self.open_pool_with_nothing();
        pool.push(surface);
        pool
    }

    pub fn open_pool_with_nothing(&self) -> MockPool {
        MockPool::new(Arc::clone(&self.fail_surfaces))
    }

    /// Queue `surface` on the most recent capture's pool and fire its
    /// frame-arrived event.
    pub fn deliver(&self, surface: Arc<MockTexture>) {
        let last = self.state.lock().subscriptions.len().checked_sub(1);
        if let Some(index) = last {
            self.deliver_to(index, surface);
        }
    }

    pub fn deliver_to(&self, index: usize, surface: Arc<MockTexture>) {
        let (handler, pool) = self.state.lock().subscriptions[index].clone();
        pool.push(surface);
        handler.on_frame_arrived(&pool);
    }

    /// Fire the closed event of the most recent capture's item.
    pub fn close_target(&self) {
        let handler = self.state.lock().subscriptions.last().map(|(h, _)| h.clone());
        if let Some(handler) = handler {
            handler.on_target_closed();
        }
    }

    fn record(&self, call: Call) -> CaptureResult<()> {
        let mut state = self.state.lock();
        let step = call.step().unwrap_or(Step::Hints);
        state.calls.push(call);
        if state.failing == Some(step) {
            return Err(CaptureError::os("mock step", E_FAIL as i32));
        }
        Ok(())
    }
}

impl CaptureBackend for MockBackend {
    type Device = MockDevice;
    type Item = MockItem;
    type Interop = ();
    type FramePool = MockPool;
    type Session = MockSession;
    type Subscription = MockSubscription;

    fn device(&self) -> &Arc<MockDevice> {
        &self.device
    }

    fn create_item(&self, window: WindowHandle) -> CaptureResult<MockItem> {
        self.record(Call::CreateItem(window))?;
        self.state.lock().live_items += 1;
        Ok(MockItem)
    }

    fn item_size(&self, _item: &MockItem) -> CaptureResult<SurfaceSize> {
        self.record(Call::ItemSize)?;
        Ok(self.size)
    }

    fn create_interop_device(&self) -> CaptureResult<()> {
        self.record(Call::CreateInterop)
    }

    fn create_frame_pool(
        &self,
        _interop: &(),
        format: TextureFormat,
        buffers: u32,
        size: SurfaceSize,
    ) -> CaptureResult<MockPool> {
        self.record(Call::CreateFramePool {
            format,
            buffers,
            size,
        })?;
        self.state.lock().live_pools += 1;
        Ok(MockPool::new(Arc::clone(&self.fail_surfaces)))
    }

    fn create_session(&self, _pool: &MockPool, _item: &MockItem) -> CaptureResult<MockSession> {
        self.record(Call::CreateSession)?;
        self.state.lock().live_sessions += 1;
        Ok(MockSession)
    }

    fn set_cursor_capture(&self, _session: &MockSession, enabled: bool) -> CaptureResult<()> {
        self.record(Call::SetCursorCapture(enabled))
    }

    fn set_border_required(&self, _session: &MockSession, required: bool) -> CaptureResult<()> {
        self.record(Call::SetBorderRequired(required))
    }

    fn set_min_update_interval(&self, _session: &MockSession, ticks: i64) -> CaptureResult<()> {
        self.record(Call::SetMinUpdateInterval(ticks))
    }

    fn subscribe(
        &self,
        pool: &MockPool,
        _item: &MockItem,
        handler: FrameArrivedHandler<MockDevice>,
    ) -> CaptureResult<MockSubscription> {
        self.record(Call::Subscribe)?;
        let mut state = self.state.lock();
        state.live_subscriptions += 1;
        state.subscriptions.push((handler, pool.clone()));
        Ok(MockSubscription)
    }

    fn start(&self, _session: &MockSession) -> CaptureResult<()> {
        self.record(Call::Start)
    }

    fn unsubscribe(&self, _subscription: MockSubscription) {
        let _ = self.record(Call::Unsubscribe);
        self.state.lock().live_subscriptions -= 1;
    }

    fn close_session(&self, _session: MockSession) {
        let _ = self.record(Call::CloseSession);
        self.state.lock().live_sessions -= 1;
    }

    fn close_frame_pool(&self, pool: MockPool) {
        let _ = self.record(Call::CloseFramePool);
        pool.state.lock().closed = true;
        self.state.lock().live_pools -= 1;
    }

    fn release_item(&self, _item: MockItem) {
        let _ = self.record(Call::ReleaseItem);
        self.state.lock().live_items -= 1;
    }
}
