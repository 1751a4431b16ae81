use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture session has not been initialized")]
    NotInitialized,

    #[error("capture session is already capturing")]
    AlreadyCapturing,

    #[error("capture session has been shut down")]
    ShutDown,

    /// An OS call failed. `code` is the raw HRESULT.
    #[error("{context} failed (0x{code:08X})")]
    Os { context: &'static str, code: u32 },

    #[error("frame conversion failed: {0}")]
    Conversion(String),

    #[error("unsupported texture format (DXGI {0})")]
    UnsupportedFormat(u32),

    #[error("frame pool has been closed")]
    PoolClosed,

    #[error("not supported: {0}")]
    Unsupported(String),
}

impl CaptureError {
    pub fn os(context: &'static str, code: i32) -> Self {
        Self::Os {
            context,
            code: code as u32,
        }
    }

    /// HRESULT carried by the error, if it came from the OS.
    pub fn os_code(&self) -> Option<u32> {
        match self {
            Self::Os { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
