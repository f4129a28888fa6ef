use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use crate::draw::CameraState;
use crate::geometry::safe_normalize;

pub const DEFAULT_FOV_DEGREES: f32 = 45.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 100.0;

/// A viewer pose. Angles are in radians; `fov` is the vertical field of view.
///
/// `front`/`right`/`up` are the authoritative orientation. `yaw`/`pitch`
/// regenerate them through [`CameraPose::update_vectors`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub front: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub world_up: Vec3,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), -FRAC_PI_2, 0.0)
    }
}

impl CameraPose {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut pose = Self {
            position,
            yaw,
            pitch,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            world_up: Vec3::Y,
            fov: DEFAULT_FOV_DEGREES.to_radians(),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        };
        pose.update_vectors();
        pose
    }

    /// Rebuilds the basis from yaw and pitch.
    pub fn update_vectors(&mut self) {
        let front = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        );
        self.front = safe_normalize(front, Vec3::NEG_Z);
        self.right = safe_normalize(self.front.cross(self.world_up), Vec3::X);
        self.up = safe_normalize(self.right.cross(self.front), Vec3::Y);
    }

    /// Recovers yaw and pitch from the current `front`.
    pub fn sync_angles_from_front(&mut self) {
        let direction = self.front.normalize_or_zero();
        if direction.length_squared() == 0.0 {
            return;
        }
        self.yaw = direction.z.atan2(direction.x);
        self.pitch = direction.y.clamp(-1.0, 1.0).asin();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.front, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn camera_state(&self, projection: Mat4) -> CameraState {
        CameraState::new(self.view_matrix(), projection, self.position)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use glam::Vec3;

    use super::CameraPose;

    #[test]
    fn default_pose_looks_down_negative_z() {
        let pose = CameraPose::default();
        assert!((pose.front - Vec3::NEG_Z).length() < 1.0e-5);
        assert!((pose.right - Vec3::X).length() < 1.0e-5);
        assert!((pose.up - Vec3::Y).length() < 1.0e-5);
    }

    #[test]
    fn angles_survive_a_basis_round_trip() {
        let mut pose = CameraPose::new(Vec3::ZERO, 0.7, -0.3);
        let (yaw, pitch) = (pose.yaw, pose.pitch);
        pose.yaw = 0.0;
        pose.pitch = 0.0;
        pose.sync_angles_from_front();
        assert!((pose.yaw - yaw).abs() < 1.0e-5);
        assert!((pose.pitch - pitch).abs() < 1.0e-5);
    }

    #[test]
    fn view_matrix_moves_front_onto_negative_z() {
        let pose = CameraPose::new(Vec3::new(1.0, 2.0, 3.0), PI, 0.2);
        let ahead = pose.position + pose.front * 5.0;
        let view_space = pose.view_matrix().transform_point3(ahead);
        assert!(view_space.x.abs() < 1.0e-4);
        assert!(view_space.y.abs() < 1.0e-4);
        assert!((view_space.z + 5.0).abs() < 1.0e-4);
    }

    #[test]
    fn straight_up_pitch_keeps_a_finite_basis() {
        let pose = CameraPose::new(Vec3::ZERO, 0.0, FRAC_PI_2);
        assert!(pose.right.is_finite());
        assert!(pose.up.is_finite());
    }
}
