use super::FrameContext;

pub struct DebugPanel {
    pub(super) visible: bool,
    show_egui_settings: bool,
}

impl DebugPanel {
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            show_egui_settings: false,
        }
    }

    pub(super) fn ui(&mut self, ui: &mut egui::Ui, frame: &mut FrameContext<'_>) {
        let ctx = ui.ctx().clone();
        let screen = ctx.screen_rect();
        let pointer = ctx.input(|i| i.pointer.hover_pos());
        let view = &frame.capture;
        let stats = view.stats;

        egui::Grid::new("debug_grid")
            .num_columns(2)
            .spacing([20.0, 6.0])
            .striped(true)
            .show(ui, |ui| {
                ui.label("Display:");
                ui.label(format!("{:.0} x {:.0}", screen.width(), screen.height()));
                ui.end_row();

                ui.label("Pointer:");
                ui.label(match pointer {
                    Some(pos) => format!("{:.0}, {:.0}", pos.x, pos.y),
                    None => "-".to_string(),
                });
                ui.end_row();

                ui.label("Frame rate:");
                ui.label(match (frame.timing.fps(), frame.timing.frame_time_ms()) {
                    (Some(fps), Some(ms)) => format!("{:.1} FPS | {:.2}ms", fps, ms),
                    _ => "-".to_string(),
                });
                ui.end_row();

                ui.label("Capture:");
                ui.label(match view.target_title {
                    Some(title) if view.capturing => title.to_string(),
                    _ => "idle".to_string(),
                });
                ui.end_row();

                ui.label("Format:");
                ui.label(format!(
                    "{} @ {} fps hint",
                    view.descriptor.format.label(),
                    view.descriptor.frame_rate
                ));
                ui.end_row();

                ui.label("Frames published:");
                ui.label(stats.frames_published.to_string());
                ui.end_row();

                ui.label("Conversion failures:");
                ui.label(stats.conversion_failures.to_string());
                ui.end_row();

                ui.label("Stale callbacks:");
                ui.label(stats.stale_callbacks.to_string());
                ui.end_row();
            });

        ui.add_space(6.0);
        match frame.log_path {
            Some(path) => ui.label(format!("Log: {}", path.display())),
            None => ui.label("Log: not initialized"),
        };

        ui.checkbox(&mut self.show_egui_settings, "Show GUI settings");
    }

    pub(super) fn settings_window(&mut self, ctx: &egui::Context) {
        if !self.show_egui_settings {
            return;
        }
        egui::Window::new("GUI settings")
            .open(&mut self.show_egui_settings)
            .vscroll(true)
            .show(ctx, |ui| {
                ctx.settings_ui(ui);
                ui.separator();
                ctx.inspection_ui(ui);
            });
    }
}
