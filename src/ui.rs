// ui.rs - egui 覆盖层：按钮、加载提示、状态栏
//
// UI 只读取状态，点击结果以 ViewAction 返回，由主循环统一应用。

use crate::view_state::{RotationMode, ViewState};
use crate::viewer::ViewAction;

pub struct UiFrame<'a> {
    pub state: ViewState,
    pub loading_text: Option<&'a str>,
    pub fps: f32,
}

pub fn draw_ui(ctx: &egui::Context, frame: &UiFrame<'_>) -> Vec<ViewAction> {
    let mut actions = Vec::new();

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if frame.loading_text.is_some() {
                ui.label(egui::RichText::new("Loading").color(egui::Color32::YELLOW));
                ui.label("|");
            }

            let mode = match frame.state.rotation_mode {
                RotationMode::Manual => "Manual",
                RotationMode::Auto => "Auto",
            };
            ui.label(format!("Rotation: {mode}"));
            ui.label("|");
            ui.label(format!(
                "Background: {}",
                if frame.state.background_visible { "on" } else { "off" }
            ));
            ui.label("|");
            ui.label(format!("Speed: {:.1}", frame.state.auto_rotate_speed));
            ui.label("|");
            ui.label(format!("Distance: {:.1}", frame.state.camera_distance));
            ui.label("|");
            ui.label(egui::RichText::new(format!("FPS: {:.1}", frame.fps)).color(egui::Color32::GREEN));
        });
    });

    egui::Area::new("controls")
        .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(12.0, -40.0))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Toggle rotation").clicked() {
                    actions.push(ViewAction::ToggleRotation);
                }
                if ui.button("Toggle background").clicked() {
                    actions.push(ViewAction::ToggleBackground);
                }
            });
        });

    if let Some(text) = frame.loading_text {
        egui::Area::new("loading")
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(text).size(24.0).color(egui::Color32::WHITE));
            });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(frame: &UiFrame<'_>) -> Vec<ViewAction> {
        let ctx = egui::Context::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = draw_ui(ctx, frame);
        });
        actions
    }

    #[test]
    fn no_clicks_means_no_actions() {
        let frame = UiFrame {
            state: ViewState {
                rotation_mode: RotationMode::Manual,
                background_visible: false,
                auto_rotate_speed: 5.0,
                camera_distance: 2.0,
            },
            loading_text: Some("Loading... 40%"),
            fps: 60.0,
        };
        assert!(run(&frame).is_empty());
    }
}
