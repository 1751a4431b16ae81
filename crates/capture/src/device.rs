use crate::descriptor::TextureFormat;
use crate::error::{CaptureError, CaptureResult};

/// `D3D11_BIND_SHADER_RESOURCE`
pub const BIND_SHADER_RESOURCE: u32 = 0x8;
/// `D3D11_BIND_RENDER_TARGET`
pub const BIND_RENDER_TARGET: u32 = 0x20;

/// Backend-neutral view of a 2D texture description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    /// Raw DXGI_FORMAT value.
    pub format: u32,
    pub sample_count: u32,
    pub bind_flags: u32,
}

impl SurfaceDesc {
    pub fn is_shader_readable(&self) -> bool {
        self.bind_flags & BIND_SHADER_RESOURCE != 0
    }

    pub fn texture_format(&self) -> Option<TextureFormat> {
        TextureFormat::from_dxgi(self.format)
    }

    /// Same geometry and format, GPU-resident and bindable as a shader resource.
    pub fn shader_readable(&self) -> Self {
        Self {
            bind_flags: BIND_SHADER_RESOURCE,
            ..*self
        }
    }
}

/// Size of a capture item or frame pool, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// The graphics device as seen by the capture core.
///
/// Implementations must tolerate calls from the capture callback thread and
/// the render thread concurrently.
pub trait GpuDevice: Send + Sync + 'static {
    type Texture: Clone + Send + Sync + 'static;
    type View: Send + Sync + 'static;

    fn describe(&self, texture: &Self::Texture) -> SurfaceDesc;

    /// Allocate a default-usage texture with no initial data.
    fn create_texture(&self, desc: &SurfaceDesc) -> CaptureResult<Self::Texture>;

    fn copy_resource(&self, dst: &Self::Texture, src: &Self::Texture) -> CaptureResult<()>;

    /// Submit queued GPU work.
    fn flush(&self);

    fn create_shader_resource_view(&self, texture: &Self::Texture) -> CaptureResult<Self::View>;

    /// Copy a texture back to the CPU as tightly packed rows.
    fn read_pixels(&self, texture: &Self::Texture) -> CaptureResult<PixelBuffer>;
}

/// CPU copy of a texture's first mip level.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> CaptureResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(CaptureError::Conversion(format!(
                "pixel buffer holds {} bytes, {}x{} {} needs {}",
                data.len(),
                width,
                height,
                format.label(),
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Convert to 8-bit RGBA, unpremultiplied as stored.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            TextureFormat::Rgba8Unorm => self.data.clone(),
            TextureFormat::Bgra8Unorm => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[2], px[1], px[0], px[3]])
                .collect(),
            TextureFormat::Rgb10A2Unorm => self
                .data
                .chunks_exact(4)
                .flat_map(|px| {
                    let v = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                    let r = (v & 0x3ff) >> 2;
                    let g = ((v >> 10) & 0x3ff) >> 2;
                    let b = ((v >> 20) & 0x3ff) >> 2;
                    let a = (v >> 30) * 85;
                    [r as u8, g as u8, b as u8, a as u8]
                })
                .collect(),
            TextureFormat::Rgba16Float => self
                .data
                .chunks_exact(2)
                .map(|half| unorm8(f16_to_f32(u16::from_le_bytes([half[0], half[1]]))))
                .collect(),
        }
    }
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn f16_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f32::from(bits & 0x3ff);
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        31 if mantissa == 0.0 => sign * f32::INFINITY,
        31 => f32::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_readable_keeps_geometry() {
        let native = SurfaceDesc {
            width: 1920,
            height: 1080,
            mip_levels: 1,
            array_size: 1,
            format: TextureFormat::Bgra8Unorm.dxgi(),
            sample_count: 1,
            bind_flags: BIND_RENDER_TARGET,
        };
        assert!(!native.is_shader_readable());

        let copy = native.shader_readable();
        assert!(copy.is_shader_readable());
        assert_eq!((copy.width, copy.height, copy.format), (1920, 1080, 87));
    }

    #[test]
    fn pixel_buffer_rejects_wrong_length() {
        assert!(PixelBuffer::new(2, 2, TextureFormat::Bgra8Unorm, vec![0; 15]).is_err());
        assert!(PixelBuffer::new(2, 2, TextureFormat::Rgba16Float, vec![0; 32]).is_ok());
    }

    #[test]
    fn bgra_swizzles_to_rgba() {
        let buffer = PixelBuffer::new(1, 1, TextureFormat::Bgra8Unorm, vec![10, 20, 30, 255]).unwrap();
        assert_eq!(buffer.to_rgba8(), vec![30, 20, 10, 255]);
    }

    #[test]
    fn rgb10a2_unpacks_channels() {
        let v: u32 = 0x3ff | (0x200 << 10) | (3 << 30);
        let buffer = PixelBuffer::new(1, 1, TextureFormat::Rgb10A2Unorm, v.to_le_bytes().to_vec()).unwrap();
        assert_eq!(buffer.to_rgba8(), vec![255, 128, 0, 255]);
    }

    #[test]
    fn half_floats_clamp_to_unorm() {
        // 1.0, 0.5, 0.0, 2.0
        let halves: [u16; 4] = [0x3c00, 0x3800, 0x0000, 0x4000];
        let data = halves.iter().flat_map(|h| h.to_le_bytes()).collect();
        let buffer = PixelBuffer::new(1, 1, TextureFormat::Rgba16Float, data).unwrap();
        assert_eq!(buffer.to_rgba8(), vec![255, 128, 0, 255]);
    }
}
