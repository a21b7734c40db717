//! Debug panel: the four lighting controls bound live to `LightingParams`,
//! the load-state overlay, and an FPS readout.

use crate::assets::LoadState;
use crate::photometry::{LightingParams, BULB_LUMINOUS_POWERS, HEMI_LUMINOUS_IRRADIANCES};

/// Overlay text for a load state; `None` once the scene is in.
pub fn load_status_text(state: &LoadState) -> Option<String> {
    match state {
        LoadState::Idle => Some("loading scene...".to_string()),
        LoadState::Fetching { percent: None } => Some("fetching scene...".to_string()),
        LoadState::Fetching { percent: Some(p) } => Some(format!("fetching scene... {p}%")),
        LoadState::Unzipping => Some("unzipping...".to_string()),
        LoadState::Parsing => Some("parsing...".to_string()),
        LoadState::Done => None,
        LoadState::Failed(message) => Some(format!("load failed: {message}")),
    }
}

/// Draws the whole overlay UI for one frame.
pub fn draw(
    ctx: &egui::Context,
    params: &mut LightingParams,
    load_state: &LoadState,
    fps: f32,
    show_panel: bool,
) {
    if show_panel {
        lighting_panel(ctx, params);
    }
    fps_overlay(ctx, fps);
    load_overlay(ctx, load_state);
}

fn lighting_panel(ctx: &egui::Context, params: &mut LightingParams) {
    egui::Window::new("Lighting")
        .resizable(false)
        .default_pos(egui::pos2(10.0, 80.0))
        .show(ctx, |ui| {
            egui::ComboBox::from_label("hemi irradiance")
                .selected_text(params.hemi_irradiance.clone())
                .show_ui(ui, |ui| {
                    for label in HEMI_LUMINOUS_IRRADIANCES.labels() {
                        ui.selectable_value(&mut params.hemi_irradiance, label.to_string(), label);
                    }
                });
            egui::ComboBox::from_label("bulb power")
                .selected_text(params.bulb_power.clone())
                .show_ui(ui, |ui| {
                    for label in BULB_LUMINOUS_POWERS.labels() {
                        ui.selectable_value(&mut params.bulb_power, label.to_string(), label);
                    }
                });
            ui.add(egui::Slider::new(&mut params.exposure, 0.0..=1.0).text("exposure"));
            ui.checkbox(&mut params.shadows, "shadows");
        });
}

fn fps_overlay(ctx: &egui::Context, fps: f32) {
    egui::Window::new("FPS")
        .title_bar(false)
        .resizable(false)
        .fixed_pos(egui::pos2(10.0, 10.0))
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!("{:.0} FPS", fps))
                    .size(18.0)
                    .color(egui::Color32::from_rgb(74, 158, 255)),
            );
        });
}

fn load_overlay(ctx: &egui::Context, load_state: &LoadState) {
    let Some(text) = load_status_text(load_state) else {
        return;
    };
    let color = if matches!(load_state, LoadState::Failed(_)) {
        egui::Color32::from_rgb(255, 90, 90)
    } else {
        egui::Color32::GRAY
    };
    egui::Window::new("Load Status")
        .title_bar(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -20.0))
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(text).size(16.0).color(color));
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_hidden_once_done() {
        assert_eq!(load_status_text(&LoadState::Done), None);
    }

    #[test]
    fn overlay_tracks_progress() {
        assert_eq!(
            load_status_text(&LoadState::Fetching { percent: Some(42) }).unwrap(),
            "fetching scene... 42%"
        );
        assert_eq!(
            load_status_text(&LoadState::Fetching { percent: None }).unwrap(),
            "fetching scene..."
        );
    }

    #[test]
    fn overlay_surfaces_failures() {
        let text = load_status_text(&LoadState::Failed("Not Found".into())).unwrap();
        assert_eq!(text, "load failed: Not Found");
    }
}
