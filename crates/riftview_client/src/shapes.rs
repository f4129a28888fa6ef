//! Concrete renderables placed in cells.
//!
//! Each shape keeps the camera state it was last given and emits one draw
//! request when rendered. Portal apertures use
//! [`riftview_core::draw::PortalSurface`] directly.

use glam::{Mat4, Vec3};
use riftview_core::draw::{
    CameraState, DrawSink, MaterialHandle, MeshDraw, MeshHandle, Renderable, Shading, SkyDraw,
};

/// Lit mesh; the specular term uses the eye position.
#[derive(Debug, Clone)]
pub struct ModelShape {
    mesh: MeshHandle,
    material: MaterialHandle,
    model: Mat4,
    camera: CameraState,
}

impl ModelShape {
    pub fn new(mesh: MeshHandle, material: MaterialHandle, model: Mat4) -> Self {
        Self {
            mesh,
            material,
            model,
            camera: CameraState::default(),
        }
    }
}

impl Renderable for ModelShape {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_mesh(MeshDraw {
            mesh: self.mesh,
            material: self.material,
            model: self.model,
            camera: self.camera,
            shading: Shading::Lit,
        });
    }
}

/// Unlit textured box; `mesh` is a unit cuboid scaled by `half_extents`.
#[derive(Debug, Clone)]
pub struct TexturedBox {
    mesh: MeshHandle,
    material: MaterialHandle,
    model: Mat4,
    camera: CameraState,
}

impl TexturedBox {
    pub fn new(mesh: MeshHandle, material: MaterialHandle, center: Vec3, half_extents: Vec3) -> Self {
        Self {
            mesh,
            material,
            model: Mat4::from_translation(center) * Mat4::from_scale(half_extents),
            camera: CameraState::default(),
        }
    }
}

impl Renderable for TexturedBox {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_mesh(MeshDraw {
            mesh: self.mesh,
            material: self.material,
            model: self.model,
            camera: self.camera,
            shading: Shading::Unlit,
        });
    }
}

/// Unlit textured rectangle such as a floor.
#[derive(Debug, Clone)]
pub struct TexturedQuad {
    mesh: MeshHandle,
    material: MaterialHandle,
    model: Mat4,
    camera: CameraState,
}

impl TexturedQuad {
    pub fn new(mesh: MeshHandle, material: MaterialHandle, model: Mat4) -> Self {
        Self {
            mesh,
            material,
            model,
            camera: CameraState::default(),
        }
    }
}

impl Renderable for TexturedQuad {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_mesh(MeshDraw {
            mesh: self.mesh,
            material: self.material,
            model: self.model,
            camera: self.camera,
            shading: Shading::Unlit,
        });
    }
}

/// Vertical gradient behind everything else in its cell.
#[derive(Debug, Clone)]
pub struct Skybox {
    horizon: [f32; 4],
    zenith: [f32; 4],
    camera: CameraState,
}

impl Skybox {
    pub fn new(horizon: [f32; 4], zenith: [f32; 4]) -> Self {
        Self {
            horizon,
            zenith,
            camera: CameraState::default(),
        }
    }
}

impl Renderable for Skybox {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_sky(SkyDraw {
            camera: self.camera,
            horizon: self.horizon,
            zenith: self.zenith,
        });
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use riftview_core::draw::{
        CameraState, DrawSink, MaterialHandle, MeshDraw, MeshHandle, Renderable, Shading, SkyDraw,
        SurfaceDraw,
    };

    use super::{ModelShape, Skybox, TexturedBox};

    #[derive(Default)]
    struct Collect {
        meshes: Vec<MeshDraw>,
        skies: Vec<SkyDraw>,
    }

    impl DrawSink for Collect {
        fn draw_mesh(&mut self, draw: MeshDraw) {
            self.meshes.push(draw);
        }

        fn draw_sky(&mut self, draw: SkyDraw) {
            self.skies.push(draw);
        }

        fn draw_surface(&mut self, _draw: SurfaceDraw) {}
    }

    fn camera_at(eye: Vec3) -> CameraState {
        CameraState::new(Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y), Mat4::IDENTITY, eye)
    }

    #[test]
    fn shapes_draw_with_the_latest_camera() {
        let mut shape = ModelShape::new(MeshHandle(1), MaterialHandle(2), Mat4::IDENTITY);
        let mut sink = Collect::default();

        shape.set_camera_state(&camera_at(Vec3::new(0.0, 0.0, 5.0)));
        shape.set_camera_state(&camera_at(Vec3::new(3.0, 1.0, 2.0)));
        shape.render(&mut sink);

        assert_eq!(sink.meshes.len(), 1);
        assert_eq!(sink.meshes[0].camera.eye, Vec3::new(3.0, 1.0, 2.0));
        assert_eq!(sink.meshes[0].shading, Shading::Lit);
    }

    #[test]
    fn boxes_are_unlit_and_scaled_about_their_center() {
        let shape = TexturedBox::new(
            MeshHandle(0),
            MaterialHandle(0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.5, 1.0, 2.0),
        );
        let mut sink = Collect::default();
        shape.render(&mut sink);

        let draw = sink.meshes[0];
        assert_eq!(draw.shading, Shading::Unlit);
        let corner = draw.model.transform_point3(Vec3::ONE);
        assert!((corner - Vec3::new(1.5, 3.0, 5.0)).length() < 1.0e-5);
    }

    #[test]
    fn skybox_emits_a_sky_draw() {
        let mut sky = Skybox::new([1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]);
        let mut sink = Collect::default();
        sky.set_camera_state(&camera_at(Vec3::X));
        sky.render(&mut sink);

        assert!(sink.meshes.is_empty());
        assert_eq!(sink.skies.len(), 1);
        assert_eq!(sink.skies[0].zenith, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(sink.skies[0].camera.eye, Vec3::X);
    }
}
