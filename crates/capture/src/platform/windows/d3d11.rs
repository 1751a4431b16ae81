use parking_lot::Mutex;
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE_HARDWARE, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_11_1,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11ShaderResourceView, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_READ,
    D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;

use super::os_error;
use crate::device::{GpuDevice, PixelBuffer, SurfaceDesc};
use crate::error::{CaptureError, CaptureResult};

#[derive(Clone)]
pub struct D3D11Texture(pub ID3D11Texture2D);

// SAFETY: D3D11 resources are free-threaded; only the immediate context is
// not, and every context call goes through `D3D11Device::context`.
unsafe impl Send for D3D11Texture {}
unsafe impl Sync for D3D11Texture {}

pub struct D3D11View(pub ID3D11ShaderResourceView);

// SAFETY: see `D3D11Texture`.
unsafe impl Send for D3D11View {}
unsafe impl Sync for D3D11View {}

/// Hardware D3D11 device shared by the capture callback and the render loop.
pub struct D3D11Device {
    device: ID3D11Device,
    context: Mutex<ID3D11DeviceContext>,
}

// SAFETY: ID3D11Device is thread-safe; the immediate context is serialized
// by the mutex.
unsafe impl Send for D3D11Device {}
unsafe impl Sync for D3D11Device {}

impl D3D11Device {
    pub fn new() -> CaptureResult<Self> {
        let feature_levels = [
            D3D_FEATURE_LEVEL_11_1,
            D3D_FEATURE_LEVEL_11_0,
            D3D_FEATURE_LEVEL_10_1,
            D3D_FEATURE_LEVEL_10_0,
        ];

        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;

        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(&feature_levels),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(os_error("D3D11CreateDevice"))?;
        }

        match (device, context) {
            (Some(device), Some(context)) => {
                tracing::info!("Created D3D11 hardware device");
                Ok(Self {
                    device,
                    context: Mutex::new(context),
                })
            }
            _ => Err(CaptureError::Unsupported("D3D11CreateDevice returned no device".into())),
        }
    }

    pub fn raw(&self) -> &ID3D11Device {
        &self.device
    }

    pub(crate) fn dxgi_device(&self) -> CaptureResult<IDXGIDevice> {
        self.device.cast().map_err(os_error("ID3D11Device::QueryInterface(IDXGIDevice)"))
    }

    fn create(&self, desc: &D3D11_TEXTURE2D_DESC, context: &'static str) -> CaptureResult<ID3D11Texture2D> {
        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .CreateTexture2D(desc, None, Some(&mut texture))
                .map_err(os_error(context))?;
        }
        texture.ok_or_else(|| CaptureError::Conversion(format!("{} returned no texture", context)))
    }
}

fn native_desc(texture: &ID3D11Texture2D) -> D3D11_TEXTURE2D_DESC {
    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { texture.GetDesc(&mut desc) };
    desc
}

impl GpuDevice for D3D11Device {
    type Texture = D3D11Texture;
    type View = D3D11View;

    fn describe(&self, texture: &D3D11Texture) -> SurfaceDesc {
        let desc = native_desc(&texture.0);
        SurfaceDesc {
            width: desc.Width,
            height: desc.Height,
            mip_levels: desc.MipLevels,
            array_size: desc.ArraySize,
            format: desc.Format.0 as u32,
            sample_count: desc.SampleDesc.Count,
            bind_flags: desc.BindFlags,
        }
    }

    fn create_texture(&self, desc: &SurfaceDesc) -> CaptureResult<D3D11Texture> {
        let native = D3D11_TEXTURE2D_DESC {
            Width: desc.width,
            Height: desc.height,
            MipLevels: desc.mip_levels,
            ArraySize: desc.array_size,
            Format: DXGI_FORMAT(desc.format as i32),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: desc.sample_count.max(1),
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: desc.bind_flags,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };
        self.create(&native, "CreateTexture2D").map(D3D11Texture)
    }

    fn copy_resource(&self, dst: &D3D11Texture, src: &D3D11Texture) -> CaptureResult<()> {
        let context = self.context.lock();
        unsafe { context.CopyResource(&dst.0, &src.0) };
        Ok(())
    }

    fn flush(&self) {
        let context = self.context.lock();
        unsafe { context.Flush() };
    }

    fn create_shader_resource_view(&self, texture: &D3D11Texture) -> CaptureResult<D3D11View> {
        let mut view: Option<ID3D11ShaderResourceView> = None;
        unsafe {
            self.device
                .CreateShaderResourceView(&texture.0, None, Some(&mut view))
                .map_err(os_error("CreateShaderResourceView"))?;
        }
        view.map(D3D11View)
            .ok_or_else(|| CaptureError::Conversion("CreateShaderResourceView returned no view".into()))
    }

    fn read_pixels(&self, texture: &D3D11Texture) -> CaptureResult<PixelBuffer> {
        let desc = native_desc(&texture.0);
        let format = crate::descriptor::TextureFormat::from_dxgi(desc.Format.0 as u32)
            .ok_or(CaptureError::UnsupportedFormat(desc.Format.0 as u32))?;

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };
        let staging = self.create(&staging_desc, "CreateTexture2D(staging)")?;

        let row_bytes = desc.Width as usize * format.bytes_per_pixel();
        let height = desc.Height as usize;
        let mut pixels = vec![0u8; row_bytes * height];

        let context = self.context.lock();
        unsafe {
            context.CopySubresourceRegion(&staging, 0, 0, 0, 0, &texture.0, 0, None);

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .map_err(os_error("ID3D11DeviceContext::Map"))?;

            let pitch = mapped.RowPitch as usize;
            for y in 0..height {
                std::ptr::copy_nonoverlapping(
                    (mapped.pData as *const u8).add(y * pitch),
                    pixels.as_mut_ptr().add(y * row_bytes),
                    row_bytes,
                );
            }

            context.Unmap(&staging, 0);
        }
        drop(context);

        PixelBuffer::new(desc.Width, desc.Height, format, pixels)
    }
}
