// camera.rs - 透视相机与轨道控制（阻尼 / 自动旋转 / 平移 / 缩放）

use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::PI;

use crate::config::{CameraConfig, ControlsConfig};

const MIN_POLAR: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, width: u32, height: u32) -> Self {
        let mut camera = Self {
            fov_deg: config.fov_deg,
            aspect: 1.0,
            near: config.near,
            far: config.far,
            position: Vec3::new(0.0, 0.0, config.default_distance),
            target: Vec3::ZERO,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// 窗口最小化时尺寸为 0，此时保持原宽高比
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Radius, azimuth around +Y (`theta`, 0 looks down -Z from +Z) and polar angle from +Y (`phi`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return Self { radius: 0.0, theta: 0.0, phi: PI / 2.0 };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    mode: DragMode,
    last: Vec2,
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    spherical: Spherical,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
    drag: Option<Drag>,

    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, camera: &PerspectiveCamera) -> Self {
        Self {
            target: camera.target,
            spherical: Spherical::from_offset(camera.position - camera.target),
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: None,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            enable_pan: config.enable_pan,
            enable_zoom: config.enable_zoom,
            auto_rotate: false,
            auto_rotate_speed: config.auto_rotate_speed,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }

    pub fn spherical(&self) -> Spherical {
        self.spherical
    }

    pub fn distance(&self) -> f32 {
        self.spherical.radius
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.spherical.radius = distance.clamp(self.min_distance, self.max_distance);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn begin_drag(&mut self, mode: DragMode, position: Vec2) {
        if mode == DragMode::Pan && !self.enable_pan {
            return;
        }
        self.drag = Some(Drag { mode, last: position });
    }

    pub fn end_drag(&mut self, mode: DragMode) {
        if self.drag.map(|d| d.mode) == Some(mode) {
            self.drag = None;
        }
    }

    /// Feed a cursor position; only acts while a drag is active.
    pub fn drag_to(&mut self, position: Vec2, camera: &PerspectiveCamera, viewport_height: f32) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let delta = position - drag.last;
        drag.last = position;
        if viewport_height <= 0.0 {
            return;
        }

        match drag.mode {
            DragMode::Rotate => {
                self.delta_theta -= 2.0 * PI * delta.x / viewport_height * self.rotate_speed;
                self.delta_phi -= 2.0 * PI * delta.y / viewport_height * self.rotate_speed;
            }
            DragMode::Pan => {
                // 以目标平面为基准换算像素到世界距离
                let target_distance =
                    self.spherical.radius * (camera.fov_deg.to_radians() / 2.0).tan();
                let per_pixel = 2.0 * target_distance / viewport_height;
                let view = camera.view();
                let right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
                let up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);
                self.pan_offset += -right * delta.x * per_pixel + up * delta.y * per_pixel;
            }
        }
    }

    /// Positive `lines` zooms in.
    pub fn zoom(&mut self, lines: f32) {
        if !self.enable_zoom || lines == 0.0 {
            return;
        }
        let step = 0.95f32.powf(self.zoom_speed);
        self.scale *= step.powf(lines);
    }

    /// Advance one frame and write the camera. Returns true when the camera moved.
    pub fn update(&mut self, dt: f32, camera: &mut PerspectiveCamera) -> bool {
        if self.auto_rotate && self.drag.is_none() {
            self.delta_theta -= 2.0 * PI / 60.0 * self.auto_rotate_speed * dt;
        }

        let before = camera.position;
        let factor = if self.enable_damping { self.damping_factor } else { 1.0 };

        self.spherical.theta += self.delta_theta * factor;
        self.spherical.phi = (self.spherical.phi + self.delta_phi * factor)
            .clamp(MIN_POLAR, PI - MIN_POLAR);
        self.spherical.radius =
            (self.spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * factor;

        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        camera.position.distance_squared(before) > 1e-12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> (PerspectiveCamera, OrbitControls) {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 800, 600);
        let controls = OrbitControls::new(&ControlsConfig::default(), &camera);
        (camera, controls)
    }

    #[test]
    fn spherical_round_trips_camera_offset() {
        let offset = Vec3::new(1.0, 0.5, -2.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-5);
    }

    #[test]
    fn starts_on_positive_z_at_default_distance() {
        let (mut camera, mut controls) = rig();
        assert!((controls.distance() - 2.0).abs() < 1e-6);
        controls.update(1.0 / 60.0, &mut camera);
        assert!((camera.position - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn auto_rotate_moves_only_when_enabled() {
        let (mut camera, mut controls) = rig();
        assert!(!controls.update(0.1, &mut camera));

        controls.auto_rotate = true;
        assert!(controls.update(0.1, &mut camera));
        assert!(controls.spherical().theta < 0.0);
        // 半径与极角不变
        assert!((controls.distance() - 2.0).abs() < 1e-5);
        assert!((controls.spherical().phi - PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn damping_decays_drag_momentum() {
        let (mut camera, mut controls) = rig();
        controls.begin_drag(DragMode::Rotate, Vec2::new(100.0, 100.0));
        controls.drag_to(Vec2::new(160.0, 100.0), &camera, 600.0);
        controls.end_drag(DragMode::Rotate);

        controls.update(1.0 / 60.0, &mut camera);
        let first = controls.spherical().theta;
        controls.update(1.0 / 60.0, &mut camera);
        let second = controls.spherical().theta - first;
        assert!(first < 0.0);
        assert!(second < 0.0 && second.abs() < first.abs());
    }

    #[test]
    fn zoom_scales_radius_and_respects_limits() {
        let (mut camera, mut controls) = rig();
        controls.zoom(1.0);
        controls.update(0.0, &mut camera);
        assert!((controls.distance() - 1.9).abs() < 1e-4);

        controls.min_distance = 1.5;
        controls.zoom(10.0);
        controls.update(0.0, &mut camera);
        assert_eq!(controls.distance(), 1.5);

        controls.enable_zoom = false;
        controls.zoom(-5.0);
        controls.update(0.0, &mut camera);
        assert_eq!(controls.distance(), 1.5);
    }

    #[test]
    fn pan_is_ignored_when_disabled() {
        let (mut camera, mut controls) = rig();
        controls.enable_pan = false;
        controls.begin_drag(DragMode::Pan, Vec2::ZERO);
        assert!(!controls.is_dragging());
        controls.update(0.0, &mut camera);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn resize_with_same_size_keeps_projection() {
        let (mut camera, _) = rig();
        camera.set_viewport(1920, 1080);
        let first = camera.projection();
        camera.set_viewport(1920, 1080);
        assert_eq!(camera.projection(), first);
        camera.set_viewport(0, 0);
        assert_eq!(camera.projection(), first);
    }
}
