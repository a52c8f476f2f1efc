//! # Interactive Camera Controls
//!
//! An orbit controller driven by window input. Dragging with the left mouse
//! button orbits around a target point; scrolling moves the eye towards or
//! away from it.
//!
//! ## Coordinate System
//! Right-handed, Y-up. Yaw rotates around +Y starting from +Z, pitch lifts
//! the eye towards +Y. The orbit is always re-seeded from whatever view the
//! application set last, so interaction continues from the current camera
//! instead of jumping back to an internal state.

use crate::foundation::math::{look_at, Mat4, Point3, Vec3, Vec4};
use crate::render::window::{MouseButton, WindowEvent};

/// Radians of rotation per pixel of cursor movement
const ROTATE_SENSITIVITY: f32 = 0.005;

/// Distance factor applied per scroll step
const ZOOM_FACTOR: f32 = 0.9;

/// Closest the eye may get to the target
const MIN_DISTANCE: f32 = 1.0e-3;

/// Farthest the eye may get from the target
const MAX_DISTANCE: f32 = 1.0e6;

/// Pitch limit, short of the poles where the up vector degenerates
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Orbit parameters around a target point
#[derive(Debug, Clone, Copy, PartialEq)]
struct Orbit {
    target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    up: Vec3,
}

impl Orbit {
    fn from_look_at(eye: &Vec3, center: &Vec3, up: &Vec3) -> Self {
        let offset = eye - center;
        let distance = offset.norm();

        if distance < MIN_DISTANCE {
            return Self {
                target: *center,
                distance: MIN_DISTANCE,
                yaw: 0.0,
                pitch: 0.0,
                up: *up,
            };
        }

        Self {
            target: *center,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH),
            up: *up,
        }
    }

    fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    fn view_matrix(&self) -> Mat4 {
        look_at(&self.eye(), &self.target, &self.up)
    }
}

impl Default for Orbit {
    /// Reproduces the identity view: eye at the origin looking down -Z.
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 0.0, -1.0),
            distance: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            up: Vec3::y(),
        }
    }
}

/// Orbit camera controller
#[derive(Debug, Clone, Default)]
pub struct CameraController {
    disabled: bool,
    orbit: Orbit,
    rotating: bool,
    last_cursor: Option<(f64, f64)>,
}

impl CameraController {
    /// Create an enabled controller with the identity view
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable input handling. Disabling drops any drag in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.disabled = !enabled;
        if !enabled {
            self.rotating = false;
            self.last_cursor = None;
        }
    }

    /// Whether input is handled
    pub fn enabled(&self) -> bool {
        !self.disabled
    }

    /// Continue orbiting from an explicit look-at configuration
    pub fn sync_from_look_at(&mut self, eye: &Vec3, center: &Vec3, up: &Vec3) {
        self.orbit = Orbit::from_look_at(eye, center, up);
    }

    /// Continue orbiting from an arbitrary view matrix.
    ///
    /// The eye and viewing direction are recovered from the inverse view;
    /// the current orbit distance is kept. Singular matrices are ignored.
    pub fn sync_from_view(&mut self, view: &Mat4) {
        let Some(camera) = view.try_inverse() else {
            log::debug!("camera controller ignoring singular view matrix");
            return;
        };

        let eye = camera.transform_point(&Point3::origin()).coords;
        let forward = (camera * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz();
        let up = (camera * Vec4::new(0.0, 1.0, 0.0, 0.0)).xyz();

        if forward.norm() < f32::EPSILON || up.norm() < f32::EPSILON {
            return;
        }

        let center = eye + forward.normalize() * self.orbit.distance;
        self.orbit = Orbit::from_look_at(&eye, &center, &up.normalize());
    }

    /// Current view matrix of the orbit
    pub fn view_matrix(&self) -> Mat4 {
        self.orbit.view_matrix()
    }

    /// Distance between eye and target
    pub fn distance(&self) -> f32 {
        self.orbit.distance
    }

    /// Feed one window event. Returns the new view when the camera moved.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<Mat4> {
        if self.disabled {
            return None;
        }

        match *event {
            WindowEvent::MouseButton {
                button: MouseButton::Left,
                pressed,
            } => {
                self.rotating = pressed;
                None
            }
            WindowEvent::CursorMoved { x, y } => {
                let previous = self.last_cursor.replace((x, y));
                match previous {
                    Some((last_x, last_y)) if self.rotating => {
                        self.rotate((x - last_x) as f32, (y - last_y) as f32);
                        Some(self.view_matrix())
                    }
                    _ => None,
                }
            }
            WindowEvent::Scrolled { delta } if delta != 0.0 => {
                self.zoom(delta as f32);
                Some(self.view_matrix())
            }
            _ => None,
        }
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        self.orbit.yaw -= dx * ROTATE_SENSITIVITY;
        self.orbit.pitch = (self.orbit.pitch + dy * ROTATE_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);
    }

    fn zoom(&mut self, steps: f32) {
        self.orbit.distance =
            (self.orbit.distance * ZOOM_FACTOR.powf(steps)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn drag(controller: &mut CameraController, from: (f64, f64), to: (f64, f64)) -> Option<Mat4> {
        controller.handle_event(&WindowEvent::CursorMoved { x: from.0, y: from.1 });
        controller.handle_event(&WindowEvent::MouseButton {
            button: MouseButton::Left,
            pressed: true,
        });
        let view = controller.handle_event(&WindowEvent::CursorMoved { x: to.0, y: to.1 });
        controller.handle_event(&WindowEvent::MouseButton {
            button: MouseButton::Left,
            pressed: false,
        });
        view
    }

    #[test]
    fn test_default_orbit_is_identity_view() {
        let controller = CameraController::new();
        assert!(controller.enabled());
        assert_relative_eq!(controller.view_matrix(), Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_sync_from_look_at_reproduces_view() {
        let mut controller = CameraController::new();
        let eye = Vec3::new(2.0, 2.0, 3.0);
        let center = Vec3::zeros();
        controller.sync_from_look_at(&eye, &center, &Vec3::y());

        assert_relative_eq!(
            controller.view_matrix(),
            look_at(&eye, &center, &Vec3::y()),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_sync_from_view_recovers_eye() {
        let mut controller = CameraController::new();
        let view = look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());
        controller.sync_from_view(&view);

        assert_relative_eq!(controller.view_matrix(), view, epsilon = 1e-5);
    }

    #[test]
    fn test_drag_orbits_around_target() {
        let mut controller = CameraController::new();
        controller.sync_from_look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());

        let view = drag(&mut controller, (100.0, 100.0), (200.0, 100.0)).unwrap();

        // Orbiting keeps the eye on the sphere around the target.
        let eye = view.try_inverse().unwrap().transform_point(&Point3::origin());
        assert_relative_eq!(eye.coords.norm(), 5.0, epsilon = 1e-4);
        assert!(eye.x.abs() > 0.1);
    }

    #[test]
    fn test_cursor_without_button_does_nothing() {
        let mut controller = CameraController::new();
        assert!(controller
            .handle_event(&WindowEvent::CursorMoved { x: 1.0, y: 1.0 })
            .is_none());
        assert!(controller
            .handle_event(&WindowEvent::CursorMoved { x: 50.0, y: 9.0 })
            .is_none());
    }

    #[test]
    fn test_scroll_zooms_in() {
        let mut controller = CameraController::new();
        controller.sync_from_look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());

        assert!(controller
            .handle_event(&WindowEvent::Scrolled { delta: 1.0 })
            .is_some());
        assert_relative_eq!(controller.distance(), 4.5, epsilon = 1e-5);
    }

    #[test]
    fn test_zoom_out_is_bounded() {
        let mut controller = CameraController::new();
        controller.sync_from_look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());

        let view = controller
            .handle_event(&WindowEvent::Scrolled { delta: -10_000.0 })
            .unwrap();
        assert_relative_eq!(controller.distance(), MAX_DISTANCE);
        assert!(view.iter().all(|v| v.is_finite()));

        controller.handle_event(&WindowEvent::Scrolled { delta: 10_000.0 });
        assert_relative_eq!(controller.distance(), MIN_DISTANCE);
    }

    #[test]
    fn test_disabled_ignores_input() {
        let mut controller = CameraController::new();
        controller.set_enabled(false);

        assert!(drag(&mut controller, (0.0, 0.0), (300.0, 300.0)).is_none());
        assert!(controller
            .handle_event(&WindowEvent::Scrolled { delta: 3.0 })
            .is_none());
        assert_relative_eq!(controller.view_matrix(), Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut controller = CameraController::new();
        controller.sync_from_look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());

        let view = drag(&mut controller, (0.0, 0.0), (0.0, 100_000.0)).unwrap();
        assert!(view.iter().all(|v| v.is_finite()));
    }
}
