use serde::{Deserialize, Serialize};

/// Number of native surfaces the OS frame pool cycles through.
pub const FRAME_POOL_DEPTH: u32 = 2;

/// Pixel formats the capture pipeline can request and display.
/// Discriminants are the DXGI_FORMAT values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TextureFormat {
    Rgba16Float = 10,
    Rgb10A2Unorm = 24,
    Rgba8Unorm = 28,
    #[default]
    Bgra8Unorm = 87,
}

impl TextureFormat {
    pub const ALL: [TextureFormat; 4] = [
        TextureFormat::Bgra8Unorm,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float,
        TextureFormat::Rgb10A2Unorm,
    ];

    pub const fn dxgi(self) -> u32 {
        self as u32
    }

    pub fn from_dxgi(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.dxgi() == value)
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba16Float => 8,
            Self::Rgb10A2Unorm | Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Bgra8Unorm => "BGRA8 UNorm",
            Self::Rgba8Unorm => "RGBA8 UNorm",
            Self::Rgba16Float => "RGBA16 Float",
            Self::Rgb10A2Unorm => "RGB10A2 UNorm",
        }
    }
}

/// Session configuration, fixed for the lifetime of an initialized session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDescriptor {
    /// Frame rate hint; the OS may deliver fewer frames.
    pub frame_rate: u32,
    pub format: TextureFormat,
    pub capture_cursor: bool,
    pub capture_border: bool,
}

impl Default for CaptureDescriptor {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            format: TextureFormat::Bgra8Unorm,
            capture_cursor: true,
            capture_border: true,
        }
    }
}

impl CaptureDescriptor {
    /// Minimum interval between frames in 100ns ticks, `None` when uncapped.
    pub fn min_update_interval_ticks(&self) -> Option<i64> {
        if self.frame_rate == 0 {
            return None;
        }
        Some(10_000_000 / i64::from(self.frame_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dxgi_values_round_trip() {
        for format in TextureFormat::ALL {
            assert_eq!(TextureFormat::from_dxgi(format.dxgi()), Some(format));
        }
        assert_eq!(TextureFormat::from_dxgi(0), None);
        assert_eq!(TextureFormat::Bgra8Unorm.dxgi(), 87);
    }

    #[test]
    fn update_interval_follows_frame_rate() {
        let mut desc = CaptureDescriptor::default();
        assert_eq!(desc.min_update_interval_ticks(), Some(333_333));
        desc.frame_rate = 60;
        assert_eq!(desc.min_update_interval_ticks(), Some(166_666));
        desc.frame_rate = 0;
        assert_eq!(desc.min_update_interval_ticks(), None);
    }

    #[test]
    fn descriptor_deserializes_with_missing_fields() {
        let desc: CaptureDescriptor = serde_json::from_str(r#"{"frame_rate":60}"#).unwrap();
        assert_eq!(desc.frame_rate, 60);
        assert_eq!(desc.format, TextureFormat::Bgra8Unorm);
        assert!(desc.capture_cursor);
    }
}
