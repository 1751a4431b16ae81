/// Opaque OS window identifier (an `HWND` on Windows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> isize {
        self.0
    }
}

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0 as usize)
    }
}

/// Window bounds in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// A capturable top-level window, snapshotted at enumeration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSource {
    pub handle: WindowHandle,
    pub title: String,
    pub rect: Rect,
    /// Id of the process owning the window.
    pub process_id: u32,
}

impl CaptureSource {
    pub fn is_own_process(&self) -> bool {
        self.process_id == std::process::id()
    }
}

/// What the platform layer reports for each top-level window before filtering.
/// `title` is `None` when the title could not be read.
#[derive(Clone, Debug)]
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) struct RawWindow {
    pub handle: WindowHandle,
    pub visible: bool,
    pub title: Option<String>,
    pub rect: Rect,
    pub process_id: u32,
}

#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn capturable(windows: impl IntoIterator<Item = RawWindow>) -> Vec<CaptureSource> {
    windows
        .into_iter()
        .filter(|w| w.visible)
        .filter_map(|w| {
            let title = w.title?;
            if title.is_empty() {
                return None;
            }
            Some(CaptureSource {
                handle: w.handle,
                title,
                rect: w.rect,
                process_id: w.process_id,
            })
        })
        .collect()
}

/// Lists the visible top-level windows that have a non-empty title, in z-order.
///
/// Never fails: windows whose title or bounds cannot be read are skipped.
/// Returns an empty list on platforms without window capture.
pub fn enumerate_windows() -> Vec<CaptureSource> {
    #[cfg(windows)]
    {
        let sources = capturable(crate::platform::windows::top_level_windows());
        tracing::debug!("Enumerated {} capturable windows", sources.len());
        sources
    }

    #[cfg(not(windows))]
    {
        Vec::new()
    }
}
