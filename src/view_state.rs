// view_state.rs - 视图状态机：旋转模式 x 背景显示
//
// 所有副作用（自动旋转、相机距离、模型复位、环境贴图槽位）都集中在这里，
// 事件处理只调用 toggle_* 方法。

use crate::camera::OrbitControls;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::interaction::{InteractionController, ModelPose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub rotation_mode: RotationMode,
    pub background_visible: bool,
    pub auto_rotate_speed: f32,
    pub camera_distance: f32,
}

/// Environment slots the renderer reads each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneSlots {
    pub environment_loaded: bool,
    /// Image-based lighting applied to the model.
    pub environment_lit: bool,
    /// Environment drawn as visible skybox.
    pub background_shown: bool,
}

/// Everything a transition is allowed to touch.
#[derive(Debug, Clone)]
pub struct SceneRig {
    pub controls: OrbitControls,
    pub interaction: InteractionController,
    pub model: Option<ModelPose>,
    pub slots: SceneSlots,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Settings {
    default_distance: f32,
    background_distance: f32,
    background_auto_rotate_speed: f32,
    keep_lighting_when_hidden: bool,
}

#[derive(Debug, Clone)]
pub struct ViewStateMachine {
    state: ViewState,
    settings: Settings,
}

impl ViewStateMachine {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            state: ViewState {
                rotation_mode: RotationMode::Manual,
                background_visible: false,
                auto_rotate_speed: config.controls.auto_rotate_speed,
                camera_distance: config.camera.default_distance,
            },
            settings: Settings {
                default_distance: config.camera.default_distance,
                background_distance: config.camera.background_distance,
                background_auto_rotate_speed: config.controls.background_auto_rotate_speed,
                keep_lighting_when_hidden: config.environment.keep_lighting_when_hidden,
            },
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn toggle_rotation(&mut self, rig: &mut SceneRig) -> RotationMode {
        let next = match self.state.rotation_mode {
            RotationMode::Manual => RotationMode::Auto,
            RotationMode::Auto => RotationMode::Manual,
        };
        self.set_rotation_mode(next, rig);
        log::debug!("rotation mode -> {next:?}");
        next
    }

    /// Returns the new background visibility.
    pub fn toggle_background(&mut self, rig: &mut SceneRig) -> Result<bool, ViewerError> {
        if !rig.slots.environment_loaded {
            return Err(ViewerError::EnvironmentNotLoaded);
        }

        let visible = !self.state.background_visible;
        self.state.background_visible = visible;
        rig.slots.background_shown = visible;

        if visible {
            rig.slots.environment_lit = true;
            self.set_rotation_mode(RotationMode::Auto, rig);
            self.state.auto_rotate_speed = self.settings.background_auto_rotate_speed;
            rig.controls.auto_rotate_speed = self.state.auto_rotate_speed;
            self.state.camera_distance = self.settings.background_distance;
        } else {
            rig.slots.environment_lit = self.settings.keep_lighting_when_hidden;
            self.set_rotation_mode(RotationMode::Manual, rig);
            self.state.camera_distance = self.settings.default_distance;
        }
        rig.controls.set_distance(self.state.camera_distance);

        log::debug!("background visible -> {visible}");
        Ok(visible)
    }

    /// Environment finished loading: light the scene with it.
    pub fn environment_ready(&mut self, rig: &mut SceneRig) {
        rig.slots.environment_loaded = true;
        rig.slots.environment_lit =
            self.state.background_visible || self.settings.keep_lighting_when_hidden;
    }

    fn set_rotation_mode(&mut self, mode: RotationMode, rig: &mut SceneRig) {
        self.state.rotation_mode = mode;
        match mode {
            RotationMode::Auto => {
                rig.controls.auto_rotate = true;
                rig.interaction.set_enabled(false);
                if let Some(model) = rig.model.as_mut() {
                    model.reset();
                }
            }
            RotationMode::Manual => {
                rig.controls.auto_rotate = false;
                rig.interaction.set_enabled(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use glam::Vec3;

    fn setup(config: &ViewerConfig) -> (ViewStateMachine, SceneRig) {
        let camera = PerspectiveCamera::new(&config.camera, 800, 600);
        let rig = SceneRig {
            controls: OrbitControls::new(&config.controls, &camera),
            interaction: InteractionController::new(&config.interaction),
            model: None,
            slots: SceneSlots::default(),
        };
        (ViewStateMachine::new(config), rig)
    }

    #[test]
    fn initial_state_is_manual_without_background() {
        let (machine, rig) = setup(&ViewerConfig::default());
        let state = machine.state();
        assert_eq!(state.rotation_mode, RotationMode::Manual);
        assert!(!state.background_visible);
        assert_eq!(state.camera_distance, 2.0);
        assert!(rig.interaction.is_enabled());
        assert!(!rig.controls.auto_rotate);
    }

    #[test]
    fn rotation_parity_follows_toggle_count() {
        let (mut machine, mut rig) = setup(&ViewerConfig::default());
        for count in 1..=7 {
            machine.toggle_rotation(&mut rig);
            let expected = if count % 2 == 0 {
                RotationMode::Manual
            } else {
                RotationMode::Auto
            };
            assert_eq!(machine.state().rotation_mode, expected);
            assert_eq!(rig.controls.auto_rotate, expected == RotationMode::Auto);
            assert_eq!(rig.interaction.is_enabled(), expected == RotationMode::Manual);
        }
    }

    #[test]
    fn entering_auto_resets_model() {
        let (mut machine, mut rig) = setup(&ViewerConfig::default());
        rig.model = Some(ModelPose {
            rotation: Vec3::new(0.3, -0.2, 0.0),
        });
        machine.toggle_rotation(&mut rig);
        assert_eq!(rig.model.unwrap().rotation, Vec3::ZERO);
    }

    #[test]
    fn background_toggle_without_environment_is_a_no_op() {
        let (mut machine, mut rig) = setup(&ViewerConfig::default());
        let before = machine.state();
        let result = machine.toggle_background(&mut rig);
        assert!(matches!(result, Err(ViewerError::EnvironmentNotLoaded)));
        assert_eq!(machine.state(), before);
        assert_eq!(rig.slots, SceneSlots::default());
        assert!(!rig.controls.auto_rotate);
    }

    #[test]
    fn background_round_trip() {
        let (mut machine, mut rig) = setup(&ViewerConfig::default());
        machine.environment_ready(&mut rig);
        assert!(rig.slots.environment_lit);
        assert!(!rig.slots.background_shown);

        assert!(machine.toggle_background(&mut rig).unwrap());
        let state = machine.state();
        assert_eq!(state.rotation_mode, RotationMode::Auto);
        assert_eq!(state.auto_rotate_speed, 1.0);
        assert_eq!(state.camera_distance, 4.0);
        assert_eq!(rig.controls.distance(), 4.0);
        assert_eq!(rig.controls.auto_rotate_speed, 1.0);
        assert!(rig.slots.background_shown);
        assert!(!rig.interaction.is_enabled());

        assert!(!machine.toggle_background(&mut rig).unwrap());
        let state = machine.state();
        assert_eq!(state.rotation_mode, RotationMode::Manual);
        assert_eq!(state.camera_distance, 2.0);
        assert_eq!(rig.controls.distance(), 2.0);
        assert!(!rig.slots.background_shown);
        assert!(rig.slots.environment_lit);
        assert!(rig.interaction.is_enabled());
    }

    #[test]
    fn hidden_background_can_drop_lighting() {
        let mut config = ViewerConfig::default();
        config.environment.keep_lighting_when_hidden = false;
        let (mut machine, mut rig) = setup(&config);

        machine.environment_ready(&mut rig);
        assert!(!rig.slots.environment_lit);

        machine.toggle_background(&mut rig).unwrap();
        assert!(rig.slots.environment_lit);
        machine.toggle_background(&mut rig).unwrap();
        assert!(!rig.slots.environment_lit);
    }
}
