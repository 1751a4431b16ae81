use super::FrameContext;

pub struct DemoPanel {
    pub(super) visible: bool,
    name: String,
    clicks: u32,
    color: egui::Color32,
}

impl DemoPanel {
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            name: "world".to_string(),
            clicks: 0,
            color: egui::Color32::from_rgb(100, 150, 255),
        }
    }

    pub(super) fn ui(&mut self, ui: &mut egui::Ui, frame: &mut FrameContext<'_>) {
        ui.horizontal(|ui| {
            ui.label("Name:");
            ui.text_edit_singleline(&mut self.name);
        });
        ui.label(format!("Hello, {}!", self.name));

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Click me").clicked() {
                self.clicks += 1;
                tracing::info!("Demo button clicked {} times", self.clicks);
            }
            ui.label(format!("clicked {} times", self.clicks));
        });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label("Colour:");
            ui.color_edit_button_srgba(&mut self.color);
            let (swatch, _) = ui.allocate_exact_size(egui::vec2(48.0, 16.0), egui::Sense::hover());
            ui.painter().rect_filled(swatch, 2.0, self.color);
        });

        ui.add_space(8.0);
        if let Some(fps) = frame.timing.fps() {
            ui.label(format!("{:.1} FPS", fps));
        }
    }
}
