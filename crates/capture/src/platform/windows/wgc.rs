use std::sync::Arc;

use windows::core::{factory, IInspectable, Interface};
use windows::Foundation::{TimeSpan, TypedEventHandler};
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Win32::Foundation::RO_E_CLOSED;
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use super::d3d11::{D3D11Device, D3D11Texture};
use super::{hwnd, os_error};
use crate::backend::{CaptureBackend, FrameSource, NativeFrame};
use crate::descriptor::TextureFormat;
use crate::device::SurfaceSize;
use crate::error::{CaptureError, CaptureResult};
use crate::session::FrameArrivedHandler;
use crate::source::WindowHandle;

fn pixel_format(format: TextureFormat) -> DirectXPixelFormat {
    match format {
        TextureFormat::Bgra8Unorm => DirectXPixelFormat::B8G8R8A8UIntNormalized,
        TextureFormat::Rgba8Unorm => DirectXPixelFormat::R8G8B8A8UIntNormalized,
        TextureFormat::Rgba16Float => DirectXPixelFormat::R16G16B16A16Float,
        TextureFormat::Rgb10A2Unorm => DirectXPixelFormat::R10G10B10A2UIntNormalized,
    }
}

/// A frame checked out of a WGC frame pool. Closing it on drop returns the
/// surface to the pool.
pub struct WgcFrame(Direct3D11CaptureFrame);

impl NativeFrame for WgcFrame {
    type Texture = D3D11Texture;

    fn surface(&self) -> CaptureResult<D3D11Texture> {
        let surface = self.0.Surface().map_err(os_error("Direct3D11CaptureFrame::Surface"))?;
        let access: IDirect3DDxgiInterfaceAccess = surface
            .cast()
            .map_err(os_error("IDirect3DSurface::QueryInterface(IDirect3DDxgiInterfaceAccess)"))?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface() }
            .map_err(os_error("IDirect3DDxgiInterfaceAccess::GetInterface"))?;
        Ok(D3D11Texture(texture))
    }
}

impl Drop for WgcFrame {
    fn drop(&mut self) {
        let _ = self.0.Close();
    }
}

fn next_frame(pool: &Direct3D11CaptureFramePool) -> CaptureResult<Option<WgcFrame>> {
    match pool.TryGetNextFrame() {
        Ok(frame) => Ok(Some(WgcFrame(frame))),
        Err(e) if e.code() == RO_E_CLOSED => Err(CaptureError::PoolClosed),
        // an empty pool hands back a null frame
        Err(_) => Ok(None),
    }
}

pub struct WgcFramePool(Direct3D11CaptureFramePool);

impl FrameSource for WgcFramePool {
    type Frame = WgcFrame;

    fn try_next_frame(&self) -> CaptureResult<Option<WgcFrame>> {
        next_frame(&self.0)
    }
}

/// The pool as passed to the frame-arrived callback.
struct PoolRef<'a>(&'a Direct3D11CaptureFramePool);

impl FrameSource for PoolRef<'_> {
    type Frame = WgcFrame;

    fn try_next_frame(&self) -> CaptureResult<Option<WgcFrame>> {
        next_frame(self.0)
    }
}

pub struct WgcSubscription {
    pool: Direct3D11CaptureFramePool,
    item: GraphicsCaptureItem,
    frame_arrived: i64,
    closed: i64,
}

/// Window capture through Windows.Graphics.Capture.
pub struct WgcBackend {
    device: Arc<D3D11Device>,
}

impl WgcBackend {
    pub fn new() -> CaptureResult<Self> {
        // The calling thread also owns the UI window, which needs OLE and
        // therefore a single-threaded apartment. Frame callbacks run on the
        // free-threaded pool's own threads. Ignore error - may already be
        // initialized.
        unsafe {
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok();
        }

        let supported = GraphicsCaptureSession::IsSupported()
            .map_err(os_error("GraphicsCaptureSession::IsSupported"))?;
        if !supported {
            return Err(CaptureError::Unsupported(
                "Windows.Graphics.Capture is not available on this system".into(),
            ));
        }

        Ok(Self {
            device: Arc::new(D3D11Device::new()?),
        })
    }
}

impl CaptureBackend for WgcBackend {
    type Device = D3D11Device;
    type Item = GraphicsCaptureItem;
    type Interop = IDirect3DDevice;
    type FramePool = WgcFramePool;
    type Session = GraphicsCaptureSession;
    type Subscription = WgcSubscription;

    fn device(&self) -> &Arc<D3D11Device> {
        &self.device
    }

    fn create_item(&self, window: WindowHandle) -> CaptureResult<GraphicsCaptureItem> {
        let interop = factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
            .map_err(os_error("IGraphicsCaptureItemInterop factory"))?;
        unsafe { interop.CreateForWindow(hwnd(window)) }
            .map_err(os_error("IGraphicsCaptureItemInterop::CreateForWindow"))
    }

    fn item_size(&self, item: &GraphicsCaptureItem) -> CaptureResult<SurfaceSize> {
        let size = item.Size().map_err(os_error("GraphicsCaptureItem::Size"))?;
        Ok(SurfaceSize {
            width: size.Width.max(0) as u32,
            height: size.Height.max(0) as u32,
        })
    }

    fn create_interop_device(&self) -> CaptureResult<IDirect3DDevice> {
        let dxgi_device = self.device.dxgi_device()?;
        let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device) }
            .map_err(os_error("CreateDirect3D11DeviceFromDXGIDevice"))?;
        inspectable
            .cast()
            .map_err(os_error("IInspectable::QueryInterface(IDirect3DDevice)"))
    }

    fn create_frame_pool(
        &self,
        interop: &IDirect3DDevice,
        format: TextureFormat,
        buffers: u32,
        size: SurfaceSize,
    ) -> CaptureResult<WgcFramePool> {
        Direct3D11CaptureFramePool::CreateFreeThreaded(
            interop,
            pixel_format(format),
            buffers as i32,
            SizeInt32 {
                Width: size.width as i32,
                Height: size.height as i32,
            },
        )
        .map(WgcFramePool)
        .map_err(os_error("Direct3D11CaptureFramePool::CreateFreeThreaded"))
    }

    fn create_session(
        &self,
        pool: &WgcFramePool,
        item: &GraphicsCaptureItem,
    ) -> CaptureResult<GraphicsCaptureSession> {
        pool.0
            .CreateCaptureSession(item)
            .map_err(os_error("Direct3D11CaptureFramePool::CreateCaptureSession"))
    }

    fn set_cursor_capture(&self, session: &GraphicsCaptureSession, enabled: bool) -> CaptureResult<()> {
        session
            .SetIsCursorCaptureEnabled(enabled)
            .map_err(os_error("GraphicsCaptureSession::SetIsCursorCaptureEnabled"))
    }

    fn set_border_required(&self, session: &GraphicsCaptureSession, required: bool) -> CaptureResult<()> {
        session
            .SetIsBorderRequired(required)
            .map_err(os_error("GraphicsCaptureSession::SetIsBorderRequired"))
    }

    fn set_min_update_interval(&self, session: &GraphicsCaptureSession, ticks: i64) -> CaptureResult<()> {
        session
            .SetMinUpdateInterval(TimeSpan { Duration: ticks })
            .map_err(os_error("GraphicsCaptureSession::SetMinUpdateInterval"))
    }

    fn subscribe(
        &self,
        pool: &WgcFramePool,
        item: &GraphicsCaptureItem,
        handler: FrameArrivedHandler<D3D11Device>,
    ) -> CaptureResult<WgcSubscription> {
        let on_frame = handler.clone();
        let frame_arrived = pool
            .0
            .FrameArrived(&TypedEventHandler::<Direct3D11CaptureFramePool, IInspectable>::new(
                move |sender, _| {
                    if let Some(pool) = sender.as_ref() {
                        on_frame.on_frame_arrived(&PoolRef(pool));
                    }
                    Ok(())
                },
            ))
            .map_err(os_error("Direct3D11CaptureFramePool::FrameArrived"))?;

        let closed = item.Closed(&TypedEventHandler::<GraphicsCaptureItem, IInspectable>::new(
            move |_, _| {
                handler.on_target_closed();
                Ok(())
            },
        ));
        let closed = match closed {
            Ok(token) => token,
            Err(e) => {
                let _ = pool.0.RemoveFrameArrived(frame_arrived);
                return Err(os_error("GraphicsCaptureItem::Closed")(e));
            }
        };

        Ok(WgcSubscription {
            pool: pool.0.clone(),
            item: item.clone(),
            frame_arrived,
            closed,
        })
    }

    fn start(&self, session: &GraphicsCaptureSession) -> CaptureResult<()> {
        session
            .StartCapture()
            .map_err(os_error("GraphicsCaptureSession::StartCapture"))
    }

    fn unsubscribe(&self, subscription: WgcSubscription) {
        if let Err(e) = subscription.pool.RemoveFrameArrived(subscription.frame_arrived) {
            tracing::debug!("RemoveFrameArrived failed: {:?}", e);
        }
        if let Err(e) = subscription.item.RemoveClosed(subscription.closed) {
            tracing::debug!("RemoveClosed failed: {:?}", e);
        }
    }

    fn close_session(&self, session: GraphicsCaptureSession) {
        if let Err(e) = session.Close() {
            tracing::debug!("GraphicsCaptureSession::Close failed: {:?}", e);
        }
    }

    fn close_frame_pool(&self, pool: WgcFramePool) {
        if let Err(e) = pool.0.Close() {
            tracing::debug!("Direct3D11CaptureFramePool::Close failed: {:?}", e);
        }
    }

    fn release_item(&self, item: GraphicsCaptureItem) {
        drop(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::System::Ole::{OleInitialize, OleUninitialize};

    #[test]
    fn window_thread_can_still_initialize_ole() {
        // Device creation may fail on a headless runner; the apartment is
        // joined before that either way.
        let _backend = WgcBackend::new();

        unsafe {
            OleInitialize(None).unwrap();
            OleUninitialize();
        }
    }

    #[test]
    fn every_format_maps_to_a_capture_format() {
        for format in TextureFormat::ALL {
            assert_eq!(pixel_format(format).0 as u32, format.dxgi());
        }
    }
}
