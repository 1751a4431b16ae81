use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Vec2};
use lens_capture::WindowHandle;

use super::{CaptureCommand, FrameContext};

/// Largest size with the aspect ratio of `image` that fits in `available`.
pub fn fit_to(available: Vec2, image: Vec2) -> Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 || available.x <= 0.0 || available.y <= 0.0 {
        return Vec2::ZERO;
    }
    let scale = (available.x / image.x).min(available.y / image.y);
    image * scale
}

pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut result: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        result.push('…');
        result
    }
}

pub struct CapturePanel {
    pub(super) visible: bool,
    selected: Option<WindowHandle>,
}

impl CapturePanel {
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            selected: None,
        }
    }

    pub(super) fn ui(&mut self, ui: &mut egui::Ui, frame: &mut FrameContext<'_>) {
        let view = &frame.capture;
        if let Some(target) = view.target {
            self.selected = Some(target);
        }

        let selected_title = self
            .selected
            .and_then(|h| view.sources.iter().find(|s| s.handle == h))
            .map(|s| truncate_with_ellipsis(&s.title, 48))
            .unwrap_or_else(|| "Select a window".to_string());

        let mut commands = Vec::new();
        ui.horizontal(|ui| {
            ui.add_enabled_ui(!view.capturing, |ui| {
                egui::ComboBox::from_id_salt("capture_source")
                    .width(320.0)
                    .selected_text(selected_title)
                    .show_ui(ui, |ui| {
                        for source in view.sources {
                            let label = format!(
                                "{} ({}x{})",
                                truncate_with_ellipsis(&source.title, 48),
                                source.rect.width(),
                                source.rect.height()
                            );
                            ui.selectable_value(&mut self.selected, Some(source.handle), label);
                        }
                    });

                if ui.button("↻").on_hover_text("Refresh window list").clicked() {
                    commands.push(CaptureCommand::Refresh);
                }
            });

            if view.capturing {
                if ui.button("Stop").clicked() {
                    commands.push(CaptureCommand::Stop);
                }
            } else {
                let start = ui.add_enabled(self.selected.is_some(), egui::Button::new("Start"));
                if start.clicked() {
                    if let Some(handle) = self.selected {
                        commands.push(CaptureCommand::Start(handle));
                    }
                }
            }

            let snapshot = ui.add_enabled(view.preview.is_some(), egui::Button::new("Save snapshot"));
            if snapshot.clicked() {
                commands.push(CaptureCommand::Snapshot);
            }
        });

        ui.label(view.status);
        ui.separator();

        let available = ui.available_size();
        let (area, _) = ui.allocate_exact_size(available, Sense::hover());
        let painter = ui.painter_at(area);
        painter.rect_filled(area, 4.0, Color32::from_gray(24));

        match view.preview {
            Some(texture) if view.capturing => {
                let size = fit_to(area.size(), texture.size_vec2());
                let image_rect = Rect::from_center_size(area.center(), size);
                let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                painter.image(texture.id(), image_rect, uv, Color32::WHITE);
            }
            _ => {
                painter.text(
                    area.center(),
                    Align2::CENTER_CENTER,
                    "No capture",
                    FontId::proportional(18.0),
                    Color32::from_gray(140),
                );
            }
        }

        frame.commands.extend(commands);
    }
}
