use anyhow::{Context, Result};
use lens_capture::{
    enumerate_windows, CaptureBackend, CaptureSession, CaptureSource, Frame, PixelBuffer, WindowHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::gui::{CaptureCommand, CaptureView, FrameContext, UiManager};
use crate::state::StateManager;
use crate::timing::FrameTimer;

/// Capturable windows, minus this application's own.
pub fn foreign_sources(sources: Vec<CaptureSource>) -> Vec<CaptureSource> {
    sources.into_iter().filter(|s| !s.is_own_process()).collect()
}

pub fn source_by_title<'a>(sources: &'a [CaptureSource], title: &str) -> Option<&'a CaptureSource> {
    sources.iter().find(|s| s.title == title)
}

pub fn snapshot_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("lens_{}.png", now.format("%Y%m%d_%H%M%S_%3f")))
}

/// Main window options. Drag-and-drop is off, so the window never
/// initializes OLE.
pub fn viewport(window_size: [f32; 2]) -> egui::ViewportBuilder {
    egui::ViewportBuilder::default()
        .with_title("Lens")
        .with_inner_size(window_size)
        .with_min_inner_size([480.0, 320.0])
        .with_drag_and_drop(false)
}

/// Write an RGBA8 copy of `pixels` as PNG.
pub fn save_png(pixels: &PixelBuffer, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("Failed to create snapshot directory")?;
    }
    image::save_buffer(
        path,
        &pixels.to_rgba8(),
        pixels.width,
        pixels.height,
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", path.display()))
}

/// The render loop: pulls the newest captured frame once per displayed
/// frame and draws the panels around it.
pub struct LensApp<B: CaptureBackend> {
    state: Arc<StateManager>,
    session: CaptureSession<B>,
    ui: UiManager,
    sources: Vec<CaptureSource>,
    target_title: Option<String>,
    status: String,
    preview: Option<egui::TextureHandle>,
    shown: Option<Arc<Frame<B>>>,
    timer: FrameTimer,
    window_size: [f32; 2],
}

impl<B: CaptureBackend> LensApp<B> {
    pub fn new(state: Arc<StateManager>, backend: B) -> Self {
        let (descriptor, panels, window_size) = state.read(|s| (s.capture, s.panels, s.window_size));

        let mut session = CaptureSession::new(backend);
        session.set_cpu_readback(true);
        let status = match session.initialize(descriptor) {
            Ok(()) => "Idle".to_string(),
            Err(e) => format!("Capture unavailable: {}", e),
        };

        let mut app = Self {
            state,
            session,
            ui: UiManager::new(panels),
            sources: Vec::new(),
            target_title: None,
            status,
            preview: None,
            shown: None,
            timer: FrameTimer::default(),
            window_size,
        };
        app.refresh_sources();
        app.resume_last_capture();
        app
    }

    fn resume_last_capture(&mut self) {
        let (auto_start, title) = self.state.read(|s| (s.auto_start_capture, s.last_window_title.clone()));
        let Some(title) = title.filter(|_| auto_start) else {
            return;
        };
        match source_by_title(&self.sources, &title).map(|s| s.handle) {
            Some(handle) => {
                info!("Resuming capture of \"{}\"", title);
                self.start(handle);
            }
            None => info!("Last captured window \"{}\" is gone", title),
        }
    }

    fn refresh_sources(&mut self) {
        self.sources = foreign_sources(enumerate_windows());
        info!("Found {} capturable windows", self.sources.len());
    }

    fn start(&mut self, handle: WindowHandle) {
        let title = self
            .sources
            .iter()
            .find(|s| s.handle == handle)
            .map(|s| s.title.clone());

        match self.session.start_capture(handle) {
            Ok(()) => {
                self.status = format!("Capturing {}", title.as_deref().unwrap_or("window"));
                self.preview = None;
                self.shown = None;
                if let Some(title) = &title {
                    let title = title.clone();
                    self.state.update(|s| s.last_window_title = Some(title));
                }
                self.target_title = title;
            }
            Err(e) => {
                self.status = format!("Failed to start capture: {}", e);
            }
        }
    }

    fn stop(&mut self, reason: &str) {
        self.session.stop_capture();
        self.target_title = None;
        self.status = reason.to_string();
    }

    fn save_snapshot(&mut self) {
        let Some(pixels) = self.shown.as_ref().and_then(|frame| frame.pixels()) else {
            return;
        };
        let path = snapshot_path(&self.state.snapshots_dir(), chrono::Local::now());
        match save_png(pixels, &path) {
            Ok(()) => {
                info!("Saved snapshot {}", path.display());
                self.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                error!("Snapshot failed: {:#}", e);
                self.status = format!("Snapshot failed: {}", e);
            }
        }
    }

    /// Consume the newest frame, if one arrived since the last poll. The
    /// pixels were read back on the capture thread; this only uploads them.
    fn pull_frame(&mut self, ctx: &egui::Context) {
        if !self.session.is_capturing() {
            return;
        }
        if self.session.is_target_closed() {
            info!("Captured window closed, stopping capture");
            self.stop("Target window closed");
            return;
        }
        if !self.session.has_new_frame() {
            return;
        }
        let Some(frame) = self.session.latest_frame() else {
            return;
        };

        let Some(pixels) = frame.pixels() else {
            warn!("Frame {} arrived without pixels", frame.id());
            return;
        };

        let image = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width as usize, pixels.height as usize],
            &pixels.to_rgba8(),
        );
        match &mut self.preview {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.preview = Some(ctx.load_texture("capture_preview", image, egui::TextureOptions::LINEAR));
            }
        }
        self.shown = Some(frame);
    }

    fn run_commands(&mut self, commands: Vec<CaptureCommand>) {
        for command in commands {
            match command {
                CaptureCommand::Refresh => self.refresh_sources(),
                CaptureCommand::Start(handle) => self.start(handle),
                CaptureCommand::Stop => self.stop("Stopped"),
                CaptureCommand::Snapshot => self.save_snapshot(),
            }
        }
    }

    fn persist_layout(&mut self, ctx: &egui::Context) {
        let panels = self.ui.visibility();
        if self.state.read(|s| s.panels) != panels {
            self.state.update(|s| s.panels = panels);
        }

        let size = ctx.input(|i| i.viewport().inner_rect.map(|r| [r.width(), r.height()]));
        if let Some(size) = size {
            let moved = (size[0] - self.window_size[0]).abs() >= 1.0 || (size[1] - self.window_size[1]).abs() >= 1.0;
            let released = !ctx.input(|i| i.pointer.any_down());
            if moved && released {
                self.window_size = size;
                self.state.update(|s| s.window_size = size);
            }
        }
    }
}

impl<B: CaptureBackend> eframe::App for LensApp<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.timer.tick(Instant::now());
        self.pull_frame(ctx);

        let log_path = crate::logger::get_log_path();
        let mut frame = FrameContext {
            capture: CaptureView {
                sources: &self.sources,
                capturing: self.session.is_capturing(),
                target: self.session.target(),
                target_title: self.target_title.as_deref(),
                status: &self.status,
                preview: self.preview.as_ref(),
                stats: self.session.stats(),
                descriptor: self.session.descriptor().copied().unwrap_or_default(),
            },
            timing: &self.timer,
            log_path: log_path.as_deref(),
            commands: Vec::new(),
        };
        self.ui.render(ctx, &mut frame);
        let commands = std::mem::take(&mut frame.commands);

        self.run_commands(commands);
        self.persist_layout(ctx);

        ctx.request_repaint();
    }
}

impl<B: CaptureBackend> Drop for LensApp<B> {
    fn drop(&mut self) {
        self.session.shutdown();
        info!("Capture shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lens_capture::{Rect, TextureFormat};

    fn source(handle: isize, title: &str, process_id: u32) -> CaptureSource {
        CaptureSource {
            handle: WindowHandle::from_raw(handle),
            title: title.to_string(),
            rect: Rect::new(0, 0, 800, 600),
            process_id,
        }
    }

    #[test]
    fn own_windows_are_not_offered() {
        let sources = vec![
            source(1, "Notepad", 4242),
            source(2, "Lens", std::process::id()),
        ];

        let offered = foreign_sources(sources);

        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].title, "Notepad");
    }

    #[test]
    fn last_window_is_found_by_exact_title() {
        let sources = vec![source(1, "Notepad", 1), source(2, "Notepad++", 1)];

        assert_eq!(source_by_title(&sources, "Notepad++").map(|s| s.handle.raw()), Some(2));
        assert!(source_by_title(&sources, "notepad").is_none());
    }

    #[test]
    fn main_window_opts_out_of_drag_and_drop() {
        let viewport = viewport([1024.0, 640.0]);

        assert_eq!(viewport.drag_and_drop, Some(false));
        assert_eq!(viewport.title.as_deref(), Some("Lens"));
        assert_eq!(viewport.inner_size, Some(egui::vec2(1024.0, 640.0)));
    }

    #[test]
    fn snapshot_names_carry_timestamp() {
        let now = chrono::Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let path = snapshot_path(Path::new("snaps"), now);
        assert_eq!(path, Path::new("snaps").join("lens_20260304_050607_000.png"));
    }

    #[test]
    fn snapshot_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots").join("frame.png");
        let pixels = PixelBuffer::new(2, 1, TextureFormat::Bgra8Unorm, vec![0, 0, 255, 255, 255, 0, 0, 255]).unwrap();

        save_png(&pixels, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }
}
