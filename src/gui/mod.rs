//! Main menu and the panel set drawn over the render loop.

mod capture;
mod debug;
mod demo;
mod panel;

pub use capture::{fit_to, truncate_with_ellipsis, CapturePanel};
pub use debug::DebugPanel;
pub use demo::DemoPanel;
pub use panel::{Panel, PanelKind};

use std::path::Path;

use lens_capture::{CaptureDescriptor, CaptureSource, CaptureStats, WindowHandle};

use crate::state::PanelVisibility;
use crate::timing::FrameTimer;

/// Requests from the panels, carried out by the app after drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureCommand {
    Refresh,
    Start(WindowHandle),
    Stop,
    Snapshot,
}

/// What the panels see of the capture side for one frame.
pub struct CaptureView<'a> {
    pub sources: &'a [CaptureSource],
    pub capturing: bool,
    pub target: Option<WindowHandle>,
    pub target_title: Option<&'a str>,
    pub status: &'a str,
    pub preview: Option<&'a egui::TextureHandle>,
    pub stats: CaptureStats,
    pub descriptor: CaptureDescriptor,
}

pub struct FrameContext<'a> {
    pub capture: CaptureView<'a>,
    pub timing: &'a FrameTimer,
    pub log_path: Option<&'a Path>,
    pub commands: Vec<CaptureCommand>,
}

pub struct UiManager {
    panels: Vec<Panel>,
}

impl UiManager {
    pub fn new(visibility: PanelVisibility) -> Self {
        let panels = PanelKind::ALL
            .into_iter()
            .map(|kind| Panel::new(kind, visible_in(&visibility, kind)))
            .collect();
        Self { panels }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn set_visible(&mut self, kind: PanelKind, visible: bool) {
        if let Some(panel) = self.panels.iter_mut().find(|p| p.kind() == kind) {
            panel.set_visible(visible);
        }
    }

    pub fn visibility(&self) -> PanelVisibility {
        let mut visibility = PanelVisibility::default();
        for panel in &self.panels {
            let slot = match panel.kind() {
                PanelKind::Capture => &mut visibility.capture,
                PanelKind::Debug => &mut visibility.debug,
                PanelKind::Demo => &mut visibility.demo,
            };
            *slot = panel.is_visible();
        }
        visibility
    }

    /// Draw the menu bar and every visible panel.
    pub fn render(&mut self, ctx: &egui::Context, frame: &mut FrameContext<'_>) {
        egui::TopBottomPanel::top("main_menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("Panels", |ui| {
                    for panel in &mut self.panels {
                        let mut visible = panel.is_visible();
                        if ui.checkbox(&mut visible, panel.name()).changed() {
                            panel.set_visible(visible);
                        }
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |_ui| {});

        for panel in &mut self.panels {
            panel.render(ctx, frame);
        }
    }
}

fn visible_in(visibility: &PanelVisibility, kind: PanelKind) -> bool {
    match kind {
        PanelKind::Capture => visibility.capture,
        PanelKind::Debug => visibility.debug,
        PanelKind::Demo => visibility.demo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_follow_persisted_visibility() {
        let ui = UiManager::new(PanelVisibility {
            capture: true,
            debug: false,
            demo: true,
        });

        let kinds: Vec<_> = ui.panels().iter().map(Panel::kind).collect();
        assert_eq!(kinds, PanelKind::ALL);
        assert!(ui.panels()[0].is_visible());
        assert!(!ui.panels()[1].is_visible());
        assert!(ui.panels()[2].is_visible());
    }

    #[test]
    fn toggling_is_reflected_in_visibility() {
        let mut ui = UiManager::new(PanelVisibility::default());
        ui.set_visible(PanelKind::Debug, false);
        ui.set_visible(PanelKind::Demo, true);

        assert_eq!(
            ui.visibility(),
            PanelVisibility {
                capture: true,
                debug: false,
                demo: true,
            }
        );
    }

    #[test]
    fn panel_names_are_stable() {
        let names: Vec<_> = PanelKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, ["Capture", "Debug", "Demo"]);
    }
}
