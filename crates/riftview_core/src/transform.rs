//! Moving a camera pose through a portal.
//!
//! Two policies exist. [`through_portal`] derives the whole pose from the
//! portal matrix and is used when the live camera is relocated.
//! [`through_portal_fixed`] pins the camera to a known anchor and only borrows
//! the rotation, which keeps recursive render passes free of drift from
//! chained inverses.

use std::f32::consts::PI;

use glam::{Mat3, Mat4};

use crate::camera::CameraPose;
use crate::geometry::safe_normalize;

pub fn rotation_part(transform: Mat4) -> Mat3 {
    Mat3::from_mat4(transform)
}

/// Matrix-derived policy: `V_dst = V_src · T⁻¹`.
///
/// Position and basis come from the inverted destination view. Yaw picks up
/// the half-turn facing convention; pitch, fov and clip planes carry over.
pub fn through_portal(source: &CameraPose, transform: Mat4) -> CameraPose {
    let view_dst = source.view_matrix() * transform.inverse();
    let world_dst = view_dst.inverse();

    let mut pose = *source;
    pose.position = world_dst.w_axis.truncate();
    pose.front = safe_normalize(-view_dst.row(2).truncate(), source.front);
    pose.right = safe_normalize(view_dst.row(0).truncate(), source.right);
    pose.up = safe_normalize(view_dst.row(1).truncate(), source.up);
    pose.yaw = source.yaw + PI;
    pose
}

/// Fixed-anchor policy: position := `anchor`, basis rotated by `T`'s rotation.
///
/// With `flip_view` the yaw is turned by 180° and the basis rebuilt from it.
pub fn through_portal_fixed(
    source: &CameraPose,
    transform: Mat4,
    anchor: glam::Vec3,
    flip_view: bool,
) -> CameraPose {
    let rotation = rotation_part(transform);

    let mut pose = *source;
    pose.position = anchor;
    pose.front = safe_normalize(rotation * source.front, source.front);
    pose.right = safe_normalize(rotation * source.right, source.right);
    pose.up = safe_normalize(rotation * source.up, source.up);
    pose.sync_angles_from_front();

    if flip_view {
        pose.yaw += PI;
        pose.update_vectors();
    }

    pose
}

/// Transform for a portal whose entry quad frame is `entry_model` and exit
/// frame is `exit_model`: turn half way around the entry's up axis, then carry
/// the entry frame onto the exit frame.
pub fn pair_transform(entry_model: Mat4, exit_model: Mat4) -> Mat4 {
    exit_model * Mat4::from_rotation_y(PI) * entry_model.inverse()
}

/// Plain frame-to-frame map. Portals authored this way set `flip_view`.
pub fn frame_transform(from_model: Mat4, to_model: Mat4) -> Mat4 {
    to_model * from_model.inverse()
}
