use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const ORBIT_SENSITIVITY: f32 = 0.005;
const ZOOM_STEP: f32 = 0.1;
const MIN_DISTANCE: f32 = 0.2;
const MAX_DISTANCE: f32 = 50.0;
// Keep the camera off the poles so look_at stays well-defined.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Orbit camera: yaw/pitch/distance around a fixed target, mouse-drag to
/// orbit, wheel to zoom.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
}

impl OrbitCamera {
    /// Camera looking at `target` from `position`.
    pub fn looking_from(position: Vec3, target: Vec3, aspect: f32) -> Self {
        let offset = position - target;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            fov_y: 50f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
            dragging: false,
            last_cursor: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        let dir = Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        );
        self.target + dir * self.distance
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        let view = Mat4::look_at_rh(self.position(), self.target, Vec3::Y);
        proj * view
    }

    /// Window resize: only the aspect ratio changes.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Feeds window events to the controls. Returns true when the camera
    /// consumed the event.
    pub fn process_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                if !self.dragging {
                    self.last_cursor = None;
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.dragging {
                    if let Some((lx, ly)) = self.last_cursor {
                        let dx = (position.x - lx) as f32;
                        let dy = (position.y - ly) as f32;
                        self.yaw -= dx * ORBIT_SENSITIVITY;
                        self.pitch =
                            (self.pitch + dy * ORBIT_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);
                    }
                    self.last_cursor = Some((position.x, position.y));
                    true
                } else {
                    false
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.distance =
                    (self.distance * (1.0 - scroll * ZOOM_STEP)).clamp(MIN_DISTANCE, MAX_DISTANCE);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_position_round_trips() {
        let camera = OrbitCamera::looking_from(Vec3::new(-4.0, 2.0, 4.0), Vec3::ZERO, 1.5);
        assert!((camera.position() - Vec3::new(-4.0, 2.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn resize_updates_aspect_only() {
        let mut camera = OrbitCamera::looking_from(Vec3::new(-4.0, 2.0, 4.0), Vec3::ZERO, 1.0);
        let distance = camera.distance;
        camera.set_viewport(1920, 1080);
        assert_eq!(camera.aspect, 1920.0 / 1080.0);
        assert_eq!(camera.distance, distance);

        // Degenerate sizes are ignored.
        camera.set_viewport(0, 600);
        assert_eq!(camera.aspect, 1920.0 / 1080.0);
    }

    #[test]
    fn orbit_preserves_distance() {
        let mut camera = OrbitCamera::looking_from(Vec3::new(-4.0, 2.0, 4.0), Vec3::ZERO, 1.0);
        camera.yaw += 1.3;
        camera.pitch = 0.4;
        assert!((camera.position().length() - camera.distance).abs() < 1e-4);
    }
}
