use std::fmt;

use glam::{Mat3, Mat4, Vec2, Vec3};

/// Above this |normal.y| the world X axis is used as the up hint instead of Y.
const NEAR_VERTICAL: f32 = 0.99;
const MIN_NORMAL_LENGTH_SQ: f32 = 1.0e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    DegenerateNormal,
    DegenerateExtent { half_width: f32, half_height: f32 },
    NonFiniteCenter,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateNormal => write!(f, "portal quad normal has zero length"),
            Self::DegenerateExtent {
                half_width,
                half_height,
            } => write!(
                f,
                "portal quad extent must be positive, got {half_width} x {half_height}"
            ),
            Self::NonFiniteCenter => write!(f, "portal quad center is not finite"),
        }
    }
}

impl std::error::Error for GeometryError {}

pub(crate) fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n.length_squared() > 0.0 {
        n
    } else {
        fallback
    }
}

/// Right and up axes spanning the plane of a unit `normal`.
///
/// The up hint is whichever world axis is least parallel to the normal, so
/// the cross products never collapse for floor or ceiling portals.
pub fn stable_basis(normal: Vec3) -> (Vec3, Vec3) {
    let up_hint = if normal.y.abs() > NEAR_VERTICAL {
        Vec3::X
    } else {
        Vec3::Y
    };
    let right = up_hint.cross(normal).normalize();
    let up = normal.cross(right).normalize();
    (right, up)
}

/// A bounded, oriented rectangle: the aperture of a portal.
///
/// The model matrix maps local +X/+Y/+Z onto right/up/normal and the local
/// origin onto the center. Local extents are `±half_width` by `±half_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalQuad {
    model: Mat4,
    half_width: f32,
    half_height: f32,
}

impl PortalQuad {
    pub fn new(
        center: Vec3,
        normal: Vec3,
        half_width: f32,
        half_height: f32,
    ) -> Result<Self, GeometryError> {
        if !center.is_finite() {
            return Err(GeometryError::NonFiniteCenter);
        }
        if !normal.is_finite() || normal.length_squared() < MIN_NORMAL_LENGTH_SQ {
            return Err(GeometryError::DegenerateNormal);
        }
        check_extent(half_width, half_height)?;

        let normal = normal.normalize();
        let (right, up) = stable_basis(normal);
        let model = Mat4::from_cols(
            right.extend(0.0),
            up.extend(0.0),
            normal.extend(0.0),
            center.extend(1.0),
        );

        Ok(Self {
            model,
            half_width,
            half_height,
        })
    }

    pub fn from_model(model: Mat4, half_width: f32, half_height: f32) -> Result<Self, GeometryError> {
        check_model(model)?;
        check_extent(half_width, half_height)?;
        Ok(Self {
            model,
            half_width,
            half_height,
        })
    }

    pub fn set_model(&mut self, model: Mat4) -> Result<(), GeometryError> {
        check_model(model)?;
        self.model = model;
        Ok(())
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    /// Model matrix scaled so a unit quad spanning [-1, 1] covers the aperture.
    pub fn surface_matrix(&self) -> Mat4 {
        self.model * Mat4::from_scale(Vec3::new(self.half_width, self.half_height, 1.0))
    }

    pub fn center(&self) -> Vec3 {
        self.model.transform_point3(Vec3::ZERO)
    }

    pub fn normal(&self) -> Vec3 {
        safe_normalize(Mat3::from_mat4(self.model) * Vec3::Z, Vec3::Z)
    }

    pub fn right(&self) -> Vec3 {
        safe_normalize(Mat3::from_mat4(self.model) * Vec3::X, Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        safe_normalize(Mat3::from_mat4(self.model) * Vec3::Y, Vec3::Y)
    }

    pub fn plane_d(&self) -> f32 {
        -self.normal().dot(self.center())
    }

    pub fn half_width(&self) -> f32 {
        self.half_width
    }

    pub fn half_height(&self) -> f32 {
        self.half_height
    }

    pub fn width(&self) -> f32 {
        self.half_width * 2.0
    }

    pub fn height(&self) -> f32 {
        self.half_height * 2.0
    }

    /// Positive in front of the surface, negative behind it.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.plane_d()
    }

    /// Coordinates of `point` along the quad's right and up axes, relative to its center.
    pub fn local_coords(&self, point: Vec3) -> Vec2 {
        let offset = point - self.center();
        Vec2::new(offset.dot(self.right()), offset.dot(self.up()))
    }

    pub fn aperture_contains(&self, local: Vec2) -> bool {
        local.x.abs() <= self.half_width && local.y.abs() <= self.half_height
    }

    /// True only when `eye` lies strictly on the front side of the surface.
    pub fn is_front_facing(&self, eye: Vec3) -> bool {
        self.normal().dot(eye - self.center()) > 0.0
    }
}

fn check_extent(half_width: f32, half_height: f32) -> Result<(), GeometryError> {
    let valid = |v: f32| v.is_finite() && v > 0.0;
    if valid(half_width) && valid(half_height) {
        Ok(())
    } else {
        Err(GeometryError::DegenerateExtent {
            half_width,
            half_height,
        })
    }
}

fn check_model(model: Mat4) -> Result<(), GeometryError> {
    if !model.w_axis.is_finite() {
        return Err(GeometryError::NonFiniteCenter);
    }
    let normal = Mat3::from_mat4(model) * Vec3::Z;
    if !normal.is_finite() || normal.length_squared() < MIN_NORMAL_LENGTH_SQ {
        return Err(GeometryError::DegenerateNormal);
    }
    Ok(())
}
