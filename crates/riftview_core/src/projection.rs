use glam::{Mat4, Vec3, Vec4};

use crate::geometry::PortalQuad;

/// Plane `(n, d)` with `n·p + d = 0` through `point`.
pub fn world_plane(normal: Vec3, point: Vec3) -> Vec4 {
    normal.extend(-normal.dot(point))
}

/// Planes transform by the inverse transpose of the point transform.
pub fn plane_to_view_space(view: Mat4, plane_world: Vec4) -> Vec4 {
    view.inverse().transpose() * plane_world
}

/// Replaces the near plane of `projection` with `clip_plane_view`.
///
/// Targets the 0..1 depth range produced by `Mat4::perspective_rh`: points on
/// the plane land on NDC z = 0 and the far corners keep z = 1. The plane is
/// given in view space and must have the camera on its negative side
/// (`w < 0`); otherwise `None` is returned and the caller keeps the regular
/// projection.
pub fn oblique_clip(projection: Mat4, clip_plane_view: Vec4) -> Option<Mat4> {
    if !(clip_plane_view.w < 0.0) {
        return None;
    }

    let q = projection.inverse()
        * Vec4::new(
            clip_plane_view.x.signum(),
            clip_plane_view.y.signum(),
            1.0,
            1.0,
        );
    let denom = clip_plane_view.dot(q);
    if denom.abs() < 1e-6 {
        return None;
    }

    let c = clip_plane_view * (projection.row(3).dot(q) / denom);
    let mut m = projection;
    m.x_axis.z = c.x;
    m.y_axis.z = c.y;
    m.z_axis.z = c.z;
    m.w_axis.z = c.w;
    Some(m)
}

/// View-space clip plane for rendering beyond `surface`.
///
/// The normal is oriented along `view_dir` and the plane is pushed `bias`
/// further along it, so geometry lying on the surface itself is dropped.
pub fn portal_clip_plane(surface: &PortalQuad, view: Mat4, view_dir: Vec3, bias: f32) -> Vec4 {
    let surface_normal = surface.normal();
    let normal = if surface_normal.dot(view_dir) >= 0.0 {
        surface_normal
    } else {
        -surface_normal
    };
    let point = surface.center() + normal * bias;
    plane_to_view_space(view, world_plane(normal, point))
}

/// Regular projection skewed so its near plane sits on `surface`, falling back
/// to the regular projection when the plane is not ahead of the camera.
pub fn clipped_projection(
    projection: Mat4,
    surface: &PortalQuad,
    view: Mat4,
    view_dir: Vec3,
    bias: f32,
) -> Mat4 {
    let plane = portal_clip_plane(surface, view, view_dir, bias);
    oblique_clip(projection, plane).unwrap_or(projection)
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec4};

    use super::{clipped_projection, oblique_clip, plane_to_view_space, world_plane};
    use crate::geometry::PortalQuad;

    fn ndc_depth(m: Mat4, p: Vec3) -> f32 {
        let clip = m * p.extend(1.0);
        clip.z / clip.w
    }

    fn projection() -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0)
    }

    #[test]
    fn points_on_an_axis_aligned_plane_map_to_zero_depth() {
        // Camera at the origin looking down -Z, plane z = -2 facing away.
        let plane = Vec4::new(0.0, 0.0, -1.0, -2.0);
        let m = oblique_clip(projection(), plane).unwrap();

        for p in [
            Vec3::new(0.0, 0.0, -2.0),
            Vec3::new(0.5, -0.3, -2.0),
            Vec3::new(-0.7, 0.4, -2.0),
        ] {
            assert!(ndc_depth(m, p).abs() < 1.0e-4, "depth at {p:?}");
        }
        assert!(ndc_depth(m, Vec3::new(0.0, 0.0, -1.0)) < 0.0);
        let beyond = ndc_depth(m, Vec3::new(0.0, 0.0, -10.0));
        assert!(beyond > 0.0 && beyond < 1.0);
    }

    #[test]
    fn tilted_plane_maps_to_zero_depth() {
        let normal = Vec3::new(0.3, 0.2, -1.0).normalize();
        let point = Vec3::new(0.1, 0.0, -3.0);
        let plane = world_plane(normal, point);
        let m = oblique_clip(projection(), plane).unwrap();

        let tangent = normal.cross(Vec3::Y).normalize();
        let bitangent = normal.cross(tangent).normalize();
        for (a, b) in [(0.0, 0.0), (0.4, 0.1), (-0.3, 0.5), (0.2, -0.6)] {
            let p = point + tangent * a + bitangent * b;
            assert!(ndc_depth(m, p).abs() < 1.0e-3, "depth at {p:?}");
        }
        assert!(ndc_depth(m, point + normal * 2.0) > 0.0);
        assert!(ndc_depth(m, point - normal * 1.0) < 0.0);
    }

    #[test]
    fn camera_on_the_positive_side_keeps_the_regular_projection() {
        let plane = Vec4::new(0.0, 0.0, 1.0, 2.0);
        assert!(oblique_clip(projection(), plane).is_none());

        let quad = PortalQuad::new(Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 1.0, 1.0).unwrap();
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let m = clipped_projection(projection(), &quad, view, Vec3::NEG_Z, 0.025);
        assert_eq!(m, projection());
    }

    #[test]
    fn view_space_plane_follows_the_camera() {
        let view = Mat4::look_to_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::Y);
        let plane = plane_to_view_space(view, world_plane(Vec3::NEG_Z, Vec3::ZERO));
        assert!((plane - Vec4::new(0.0, 0.0, -1.0, -5.0)).length() < 1.0e-5);
    }
}
