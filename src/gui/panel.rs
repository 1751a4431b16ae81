use super::capture::CapturePanel;
use super::debug::DebugPanel;
use super::demo::DemoPanel;
use super::FrameContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKind {
    Capture,
    Debug,
    Demo,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [PanelKind::Capture, PanelKind::Debug, PanelKind::Demo];

    pub fn name(self) -> &'static str {
        match self {
            PanelKind::Capture => "Capture",
            PanelKind::Debug => "Debug",
            PanelKind::Demo => "Demo",
        }
    }
}

pub enum Panel {
    Capture(CapturePanel),
    Debug(DebugPanel),
    Demo(DemoPanel),
}

impl Panel {
    pub fn new(kind: PanelKind, visible: bool) -> Self {
        match kind {
            PanelKind::Capture => Panel::Capture(CapturePanel::new(visible)),
            PanelKind::Debug => Panel::Debug(DebugPanel::new(visible)),
            PanelKind::Demo => Panel::Demo(DemoPanel::new(visible)),
        }
    }

    pub fn kind(&self) -> PanelKind {
        match self {
            Panel::Capture(_) => PanelKind::Capture,
            Panel::Debug(_) => PanelKind::Debug,
            Panel::Demo(_) => PanelKind::Demo,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Panel::Capture(p) => p.visible,
            Panel::Debug(p) => p.visible,
            Panel::Demo(p) => p.visible,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        match self {
            Panel::Capture(p) => p.visible = visible,
            Panel::Debug(p) => p.visible = visible,
            Panel::Demo(p) => p.visible = visible,
        }
    }

    /// Draw the panel as a window. Closing the window hides the panel.
    pub fn render(&mut self, ctx: &egui::Context, frame: &mut FrameContext<'_>) {
        if !self.is_visible() {
            return;
        }

        let name = self.name();
        let mut open = true;
        let window = egui::Window::new(name).open(&mut open);
        match self {
            Panel::Capture(p) => {
                window
                    .default_size([720.0, 480.0])
                    .show(ctx, |ui| p.ui(ui, frame));
            }
            Panel::Debug(p) => {
                window
                    .default_width(320.0)
                    .resizable(false)
                    .show(ctx, |ui| p.ui(ui, frame));
                p.settings_window(ctx);
            }
            Panel::Demo(p) => {
                window.default_width(280.0).show(ctx, |ui| p.ui(ui, frame));
            }
        }

        if !open {
            self.set_visible(false);
        }
    }
}
