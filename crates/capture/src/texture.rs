use crate::descriptor::TextureFormat;
use crate::device::{GpuDevice, PixelBuffer, SurfaceDesc};
use crate::error::{CaptureError, CaptureResult};

/// A captured frame as a GPU texture with a shader-resource view, plus an
/// optional CPU copy of its pixels.
///
/// The texture is owned by the frame, never by the OS frame pool, so it
/// stays unchanged for as long as anyone holds it. Only ever constructed
/// fully initialized by [`convert_surface`].
pub struct CapturedTexture<D: GpuDevice> {
    id: u64,
    texture: D::Texture,
    view: D::View,
    desc: SurfaceDesc,
    pixels: Option<PixelBuffer>,
}

impl<D: GpuDevice> CapturedTexture<D> {
    /// Per-session sequence number of the frame.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn texture(&self) -> &D::Texture {
        &self.texture
    }

    pub fn shader_resource_view(&self) -> &D::View {
        &self.view
    }

    pub fn desc(&self) -> &SurfaceDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn format(&self) -> Option<TextureFormat> {
        self.desc.texture_format()
    }

    /// Pixels read back on the capture thread, when readback is enabled.
    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    pub(crate) fn with_pixels(self, pixels: PixelBuffer) -> Self {
        Self {
            pixels: Some(pixels),
            ..self
        }
    }
}

impl<D: GpuDevice> std::fmt::Debug for CapturedTexture<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedTexture")
            .field("id", &self.id)
            .field("width", &self.desc.width)
            .field("height", &self.desc.height)
            .field("format", &self.desc.format)
            .field("pixels", &self.pixels.is_some())
            .finish()
    }
}

/// Wrap a native captured surface as a [`CapturedTexture`].
///
/// The surface is always copied into a new bindable texture of identical
/// size and format, and the copy is flushed before returning. The result
/// never aliases a frame-pool surface.
pub fn convert_surface<D: GpuDevice>(
    device: &D,
    surface: &D::Texture,
    id: u64,
) -> CaptureResult<CapturedTexture<D>> {
    let native = device.describe(surface);
    if native.width == 0 || native.height == 0 {
        return Err(CaptureError::Conversion(format!(
            "empty surface {}x{}",
            native.width, native.height
        )));
    }

    let desc = native.shader_readable();
    let texture = device.create_texture(&desc)?;
    device.copy_resource(&texture, surface)?;
    device.flush();

    let view = device.create_shader_resource_view(&texture)?;

    Ok(CapturedTexture {
        id,
        texture,
        view,
        desc,
        pixels: None,
    })
}
