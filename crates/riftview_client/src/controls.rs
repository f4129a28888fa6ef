//! Free-fly camera controls.

use glam::Vec3;
use riftview_core::camera::CameraPose;
use riftview_core::settings::{MAX_FOV, MIN_FOV};
use winit::keyboard::KeyCode;

use crate::input::InputState;

const MAX_PITCH_DEGREES: f32 = 89.0;
const SPRINT_MULTIPLIER: f32 = 3.0;
/// Degrees of field of view per wheel line.
const ZOOM_STEP_DEGREES: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyControls {
    /// Radians of yaw/pitch per pixel of mouse motion.
    pub look_sensitivity: f32,
    /// World units per second.
    pub move_speed: f32,
}

impl FlyControls {
    /// `mouse_sensitivity` is in degrees per pixel, as stored in the settings file.
    pub fn new(mouse_sensitivity: f32, move_speed: f32) -> Self {
        Self {
            look_sensitivity: mouse_sensitivity.to_radians(),
            move_speed,
        }
    }

    pub fn update_look(&self, camera: &mut CameraPose, input: &InputState) {
        let max_pitch = MAX_PITCH_DEGREES.to_radians();
        camera.yaw += input.mouse_delta.x * self.look_sensitivity;
        camera.pitch -= input.mouse_delta.y * self.look_sensitivity;
        camera.pitch = camera.pitch.clamp(-max_pitch, max_pitch);
        camera.update_vectors();
    }

    /// Moves along the view direction; Space/Ctrl move along world up.
    pub fn update_position(&self, camera: &mut CameraPose, input: &InputState, dt: f32) {
        let mut direction = Vec3::ZERO;
        if input.is_pressed(KeyCode::KeyW) {
            direction += camera.front;
        }
        if input.is_pressed(KeyCode::KeyS) {
            direction -= camera.front;
        }
        if input.is_pressed(KeyCode::KeyD) {
            direction += camera.right;
        }
        if input.is_pressed(KeyCode::KeyA) {
            direction -= camera.right;
        }
        if input.is_pressed(KeyCode::Space) {
            direction += camera.world_up;
        }
        if input.is_pressed(KeyCode::ControlLeft) || input.is_pressed(KeyCode::ControlRight) {
            direction -= camera.world_up;
        }

        let Some(direction) = direction.try_normalize() else {
            return;
        };
        let mut speed = self.move_speed;
        if input.is_pressed(KeyCode::ShiftLeft) || input.is_pressed(KeyCode::ShiftRight) {
            speed *= SPRINT_MULTIPLIER;
        }
        camera.position += direction * speed * dt.max(0.0);
    }

    /// Wheel up narrows the field of view.
    pub fn update_zoom(&self, camera: &mut CameraPose, input: &InputState) {
        if input.scroll == 0.0 {
            return;
        }
        let fov = camera.fov.to_degrees() - input.scroll * ZOOM_STEP_DEGREES;
        camera.fov = fov.clamp(MIN_FOV, MAX_FOV).to_radians();
    }

    pub fn update(&self, camera: &mut CameraPose, input: &InputState, dt: f32) {
        self.update_look(camera, input);
        self.update_position(camera, input, dt);
        self.update_zoom(camera, input);
    }
}
