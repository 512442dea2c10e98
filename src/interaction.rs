// interaction.rs - 指针位置 -> 模型朝向（绝对赋值，不累加）

use glam::{EulerRot, Mat4, Vec3};

use crate::config::InteractionConfig;

/// Orientation of the loaded model. `rotation.x` is pitch, `rotation.y` is yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelPose {
    pub rotation: Vec3,
}

impl ModelPose {
    pub fn reset(&mut self) {
        self.rotation = Vec3::ZERO;
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    enabled: bool,
    pointer_scale: f32,
    rotation_range: f32,
}

impl InteractionController {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            enabled: true,
            pointer_scale: config.pointer_scale,
            rotation_range: config.rotation_range_deg.to_radians(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// `(yaw, pitch)` in radians for a pointer position inside a `width x height` viewport.
    pub fn orientation_for(&self, x: f32, y: f32, width: f32, height: f32) -> Option<(f32, f32)> {
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        let nx = (x / width - 0.5) * self.pointer_scale;
        let ny = (y / height - 0.5) * self.pointer_scale;
        Some((nx * self.rotation_range, ny * self.rotation_range))
    }

    /// Returns true when the model orientation was written.
    pub fn pointer_moved(
        &self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        model: Option<&mut ModelPose>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(model) = model else {
            return false;
        };
        let Some((yaw, pitch)) = self.orientation_for(x, y, width, height) else {
            return false;
        };
        model.rotation.y = yaw;
        model.rotation.x = pitch;
        true
    }
}
