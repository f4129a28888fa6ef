use glam::{Mat4, Vec3};

use crate::geometry::PortalQuad;

/// View, projection and eye position pushed to every drawable before it renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye: Vec3::ZERO,
        }
    }
}

impl CameraState {
    pub fn new(view: Mat4, projection: Mat4, eye: Vec3) -> Self {
        Self {
            view,
            projection,
            eye,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    Unlit,
    /// Directional light plus a specular term that needs `CameraState::eye`.
    Lit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDraw {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub model: Mat4,
    pub camera: CameraState,
    pub shading: Shading,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyDraw {
    pub camera: CameraState,
    pub horizon: [f32; 4],
    pub zenith: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceSource {
    /// Sample pooled target `index`, projecting with the destination camera's view-projection.
    Target {
        index: usize,
        texture_view_projection: Mat4,
    },
    /// No destination content: flat fallback shading.
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDraw {
    pub model: Mat4,
    pub camera: CameraState,
    pub source: SurfaceSource,
}

/// Receives draw requests for whatever target is currently bound.
pub trait DrawSink {
    fn draw_mesh(&mut self, draw: MeshDraw);
    fn draw_sky(&mut self, draw: SkyDraw);
    fn draw_surface(&mut self, draw: SurfaceDraw);
}

/// Anything a cell can hold.
pub trait Renderable {
    /// Called with the active camera right before [`Renderable::render`].
    fn set_camera_state(&mut self, _camera: &CameraState) {}

    fn render(&self, sink: &mut dyn DrawSink);

    /// Present on shapes that can act as a portal aperture.
    fn portal_surface(&self) -> Option<&PortalQuad> {
        None
    }
}

/// The drawable side of a portal aperture.
///
/// Rendering it directly produces the blank fallback; textured draws are
/// issued by the portal renderer.
#[derive(Debug, Clone)]
pub struct PortalSurface {
    quad: PortalQuad,
    camera: CameraState,
}

impl PortalSurface {
    pub fn new(quad: PortalQuad) -> Self {
        Self {
            quad,
            camera: CameraState::default(),
        }
    }

    pub fn quad(&self) -> &PortalQuad {
        &self.quad
    }
}

impl Renderable for PortalSurface {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_surface(SurfaceDraw {
            model: self.quad.surface_matrix(),
            camera: self.camera,
            source: SurfaceSource::Blank,
        });
    }

    fn portal_surface(&self) -> Option<&PortalQuad> {
        Some(&self.quad)
    }
}
