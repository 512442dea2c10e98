// viewer.rs - 查看器状态：所有事件处理都显式传入这一份状态

use glam::{Mat4, Vec2, Vec3};
use std::time::{Duration, Instant};

use crate::camera::{DragMode, OrbitControls, PerspectiveCamera};
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::interaction::{InteractionController, ModelPose};
use crate::loading::{AssetLoadGate, ENVIRONMENT_TASK, MODEL_TASK};
use crate::render_loop::Viewport;
use crate::view_state::{SceneRig, SceneSlots, ViewState, ViewStateMachine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    ToggleRotation,
    ToggleBackground,
}

/// Snapshot the renderer consumes once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneFrame {
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub model: Mat4,
    pub camera_position: Vec3,
    pub environment_lit: bool,
    pub background_shown: bool,
    pub model_visible: bool,
}

pub struct ViewerState {
    view: ViewStateMachine,
    rig: SceneRig,
    camera: PerspectiveCamera,
    viewport: Viewport,
    gate: AssetLoadGate,
    load_timeout: Option<Duration>,
}

impl ViewerState {
    pub fn new(config: &ViewerConfig, width: u32, height: u32, now: Instant) -> Self {
        let camera = PerspectiveCamera::new(&config.camera, width, height);
        let rig = SceneRig {
            controls: OrbitControls::new(&config.controls, &camera),
            interaction: InteractionController::new(&config.interaction),
            model: None,
            slots: SceneSlots::default(),
        };
        Self {
            view: ViewStateMachine::new(config),
            rig,
            camera,
            viewport: Viewport::new(width, height),
            gate: AssetLoadGate::for_viewer(now),
            load_timeout: config.load_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn view_state(&self) -> ViewState {
        self.view.state()
    }

    pub fn model_pose(&self) -> Option<ModelPose> {
        self.rig.model
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn loading_text(&self) -> Option<String> {
        self.gate.loading_text()
    }

    pub fn report_progress(&mut self, task: &str, loaded: u64, total: Option<u64>) {
        self.gate.report_progress(task, loaded, total);
    }

    /// Returns true when this completion opened the gate.
    pub fn environment_loaded(&mut self) -> bool {
        self.view.environment_ready(&mut self.rig);
        self.gate.mark_complete(ENVIRONMENT_TASK)
    }

    pub fn model_loaded(&mut self) -> bool {
        if self.rig.model.is_none() {
            self.rig.model = Some(ModelPose::default());
        }
        self.gate.mark_complete(MODEL_TASK)
    }

    /// Logs the pending loads once when the configured timeout expires.
    pub fn check_load_timeout(&mut self, now: Instant) {
        let Some(timeout) = self.load_timeout else {
            return;
        };
        if let Some(pending) = self.gate.check_stalled(now, timeout) {
            log::warn!(
                "assets still loading after {}s: {}",
                timeout.as_secs(),
                pending.join(", ")
            );
        }
    }

    pub fn apply(&mut self, action: ViewAction) {
        match action {
            ViewAction::ToggleRotation => {
                self.view.toggle_rotation(&mut self.rig);
            }
            ViewAction::ToggleBackground => {
                if let Err(e) = self.toggle_background() {
                    log::error!("{e}");
                }
            }
        }
    }

    pub fn toggle_background(&mut self) -> Result<bool, ViewerError> {
        self.view.toggle_background(&mut self.rig)
    }

    /// Returns true when the viewport changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.viewport.resize(width, height) {
            return false;
        }
        self.camera.set_viewport(width, height);
        true
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        let width = self.viewport.width as f32;
        let height = self.viewport.height as f32;
        self.rig
            .controls
            .drag_to(Vec2::new(x, y), &self.camera, height);
        self.rig
            .interaction
            .pointer_moved(x, y, width, height, self.rig.model.as_mut());
    }

    pub fn begin_drag(&mut self, mode: DragMode, x: f32, y: f32) {
        self.rig.controls.begin_drag(mode, Vec2::new(x, y));
    }

    pub fn end_drag(&mut self, mode: DragMode) {
        self.rig.controls.end_drag(mode);
    }

    pub fn zoom(&mut self, lines: f32) {
        self.rig.controls.zoom(lines);
    }

    /// Per-frame camera update (auto-rotate + damping).
    pub fn update(&mut self, dt: f32) {
        self.rig.controls.update(dt, &mut self.camera);
    }

    pub fn scene_frame(&self) -> SceneFrame {
        let view_proj = self.camera.view_projection();
        SceneFrame {
            view_proj,
            inv_view_proj: view_proj.inverse(),
            model: self.rig.model.map(|m| m.matrix()).unwrap_or(Mat4::IDENTITY),
            camera_position: self.camera.position,
            environment_lit: self.rig.slots.environment_lit,
            background_shown: self.rig.slots.background_shown,
            model_visible: self.gate.is_ready() && self.rig.model.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_state::RotationMode;

    fn viewer() -> ViewerState {
        ViewerState::new(&ViewerConfig::default(), 800, 600, Instant::now())
    }

    #[test]
    fn model_hidden_until_both_assets_arrive() {
        let mut v = viewer();
        assert!(!v.model_loaded());
        assert!(!v.scene_frame().model_visible);
        assert!(v.loading_text().is_some());

        assert!(v.environment_loaded());
        assert!(v.scene_frame().model_visible);
        assert!(v.scene_frame().environment_lit);
        assert_eq!(v.loading_text(), None);
    }

    #[test]
    fn pointer_rotates_model_only_in_manual_mode() {
        let mut v = viewer();
        v.model_loaded();
        v.pointer_moved(0.0, 0.0);
        let rotated = v.model_pose().unwrap().rotation;
        assert!(rotated.x < 0.0 && rotated.y < 0.0);

        v.apply(ViewAction::ToggleRotation);
        assert_eq!(v.view_state().rotation_mode, RotationMode::Auto);
        assert_eq!(v.model_pose().unwrap().rotation, Vec3::ZERO);

        v.pointer_moved(800.0, 600.0);
        assert_eq!(v.model_pose().unwrap().rotation, Vec3::ZERO);
    }

    #[test]
    fn background_action_before_environment_leaves_state() {
        let mut v = viewer();
        let before = v.view_state();
        v.apply(ViewAction::ToggleBackground);
        assert_eq!(v.view_state(), before);
        assert!(matches!(
            v.toggle_background(),
            Err(ViewerError::EnvironmentNotLoaded)
        ));
    }

    #[test]
    fn background_moves_camera_out_over_frames() {
        let mut v = viewer();
        v.environment_loaded();
        v.apply(ViewAction::ToggleBackground);
        v.update(1.0 / 60.0);
        assert!((v.camera().position.length() - 4.0).abs() < 1e-4);
        assert!(v.scene_frame().background_shown);
    }

    #[test]
    fn resize_twice_gives_identical_configuration() {
        let mut v = viewer();
        assert!(v.resize(1280, 720));
        let frame = v.scene_frame();
        let camera = *v.camera();
        assert!(!v.resize(1280, 720));
        assert_eq!(*v.camera(), camera);
        assert_eq!(v.scene_frame(), frame);
        assert_eq!(v.viewport(), Viewport::new(1280, 720));
    }
}
