//! Demo content: a courtyard with a pair of facing side portals that lead
//! back into the courtyard, and a hall portal into a separate gallery cell.

use std::f32::consts::FRAC_PI_2;
use std::fmt;

use glam::{Mat4, Quat, Vec3};
use riftview_core::camera::CameraPose;
use riftview_core::draw::{MaterialHandle, MeshHandle, PortalSurface};
use riftview_core::geometry::{GeometryError, PortalQuad};
use riftview_core::scene::{CellId, Portal, PortalId, Scene, SceneError};
use riftview_core::transform::pair_transform;
use tracing::info;

use crate::renderer::mesh::{cuboid, plane};
use crate::renderer::registry::ResourceRegistry;
use crate::shapes::{ModelShape, Skybox, TexturedBox, TexturedQuad};

const PORTAL_HALF_WIDTH: f32 = 0.75;
const PORTAL_HALF_HEIGHT: f32 = 1.0;
const FLOOR_HALF_EXTENT: f32 = 8.0;
const GALLERY_ORIGIN: Vec3 = Vec3::new(50.0, 0.0, 0.0);
const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 1.2, 3.0);

#[derive(Debug)]
pub enum SceneBuildError {
    Geometry(GeometryError),
    Scene(SceneError),
}

impl fmt::Display for SceneBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry(err) => write!(f, "invalid portal geometry: {err}"),
            Self::Scene(err) => write!(f, "invalid portal graph: {err}"),
        }
    }
}

impl std::error::Error for SceneBuildError {}

impl From<GeometryError> for SceneBuildError {
    fn from(err: GeometryError) -> Self {
        Self::Geometry(err)
    }
}

impl From<SceneError> for SceneBuildError {
    fn from(err: SceneError) -> Self {
        Self::Scene(err)
    }
}

/// Registry handles the demo cells are built from.
#[derive(Debug, Clone, Copy)]
pub struct DemoAssets {
    pub cube: MeshHandle,
    pub floor: MeshHandle,
    pub courtyard_floor: MaterialHandle,
    pub gallery_floor: MaterialHandle,
    pub stone: MaterialHandle,
    pub brass: MaterialHandle,
    pub teal: MaterialHandle,
}

impl DemoAssets {
    pub fn load(registry: &mut ResourceRegistry) -> Self {
        Self {
            cube: registry.add_mesh("Cube", &cuboid(Vec3::ONE, false)),
            floor: registry.add_mesh("Floor", &plane(FLOOR_HALF_EXTENT, FLOOR_HALF_EXTENT, 8.0)),
            courtyard_floor: registry.add_checker_material(
                "Courtyard Floor",
                [200, 200, 190, 255],
                [90, 90, 100, 255],
                2,
            ),
            gallery_floor: registry.add_checker_material(
                "Gallery Floor",
                [220, 180, 140, 255],
                [120, 60, 40, 255],
                2,
            ),
            stone: registry.add_checker_material(
                "Stone",
                [150, 150, 150, 255],
                [110, 110, 115, 255],
                8,
            ),
            brass: registry.add_solid_material("Brass", [205, 160, 60, 255]),
            teal: registry.add_solid_material("Teal", [40, 170, 160, 255]),
        }
    }
}

pub struct DemoScene {
    pub scene: Scene,
    pub spawn: CameraPose,
    pub courtyard: CellId,
    pub gallery: CellId,
}

pub fn build_demo_scene(assets: &DemoAssets) -> Result<DemoScene, SceneBuildError> {
    let mut scene = Scene::new();
    let courtyard = scene.create_cell();
    let gallery = scene.create_cell();

    furnish_courtyard(&mut scene, courtyard, assets)?;
    furnish_gallery(&mut scene, gallery, assets)?;

    // Side pair: walking into the left aperture comes out of the right one.
    let left = PortalQuad::new(
        Vec3::new(-4.0, PORTAL_HALF_HEIGHT, 0.0),
        Vec3::X,
        PORTAL_HALF_WIDTH,
        PORTAL_HALF_HEIGHT,
    )?;
    let right = PortalQuad::new(
        Vec3::new(4.0, PORTAL_HALF_HEIGHT, 0.0),
        Vec3::NEG_X,
        PORTAL_HALF_WIDTH,
        PORTAL_HALF_HEIGHT,
    )?;
    add_portal_pair(&mut scene, courtyard, left, courtyard, right)?;

    let hall = PortalQuad::new(
        Vec3::new(0.0, PORTAL_HALF_HEIGHT, -4.0),
        Vec3::Z,
        PORTAL_HALF_WIDTH,
        PORTAL_HALF_HEIGHT,
    )?;
    let gallery_door = PortalQuad::new(
        GALLERY_ORIGIN + Vec3::new(0.0, PORTAL_HALF_HEIGHT, 4.0),
        Vec3::NEG_Z,
        PORTAL_HALF_WIDTH,
        PORTAL_HALF_HEIGHT,
    )?;
    add_portal_pair(&mut scene, courtyard, hall, gallery, gallery_door)?;

    scene.set_viewpoint(courtyard)?;
    scene.validate()?;
    info!(
        "Demo scene built: {} cells, viewpoint {courtyard}",
        scene.cells().len()
    );

    Ok(DemoScene {
        scene,
        spawn: CameraPose::new(SPAWN_POSITION, -FRAC_PI_2, 0.0),
        courtyard,
        gallery,
    })
}

/// Two linked apertures, each leading to the other's cell.
fn add_portal_pair(
    scene: &mut Scene,
    here: CellId,
    near: PortalQuad,
    there: CellId,
    far: PortalQuad,
) -> Result<(PortalId, PortalId), SceneError> {
    let near_surface = scene
        .cell_mut(here)
        .ok_or(SceneError::UnknownCell(here))?
        .add_geometry(Box::new(PortalSurface::new(near)));
    let far_surface = scene
        .cell_mut(there)
        .ok_or(SceneError::UnknownCell(there))?
        .add_geometry(Box::new(PortalSurface::new(far)));

    let forward = scene.add_portal(
        here,
        Portal::new(near_surface, there, pair_transform(near.model(), far.model())),
    )?;
    let back = scene.add_portal(
        there,
        Portal::new(far_surface, here, pair_transform(far.model(), near.model())),
    )?;
    scene.link_portals(forward, back)?;
    Ok((forward, back))
}

fn furnish_courtyard(
    scene: &mut Scene,
    cell: CellId,
    assets: &DemoAssets,
) -> Result<(), SceneError> {
    let cell = scene.cell_mut(cell).ok_or(SceneError::UnknownCell(cell))?;
    cell.add_geometry(Box::new(Skybox::new(
        [0.75, 0.85, 0.95, 1.0],
        [0.25, 0.45, 0.85, 1.0],
    )));
    cell.add_geometry(Box::new(TexturedQuad::new(
        assets.floor,
        assets.courtyard_floor,
        Mat4::IDENTITY,
    )));
    cell.add_geometry(Box::new(ModelShape::new(
        assets.cube,
        assets.brass,
        Mat4::from_scale_rotation_translation(
            Vec3::splat(0.4),
            Quat::from_rotation_y(0.6),
            Vec3::new(0.0, 0.4, 0.0),
        ),
    )));
    for corner in [
        Vec3::new(-6.0, 1.5, -6.0),
        Vec3::new(6.0, 1.5, -6.0),
        Vec3::new(-6.0, 1.5, 6.0),
        Vec3::new(6.0, 1.5, 6.0),
    ] {
        cell.add_geometry(Box::new(TexturedBox::new(
            assets.cube,
            assets.stone,
            corner,
            Vec3::new(0.3, 1.5, 0.3),
        )));
    }
    Ok(())
}

fn furnish_gallery(
    scene: &mut Scene,
    cell: CellId,
    assets: &DemoAssets,
) -> Result<(), SceneError> {
    let cell = scene.cell_mut(cell).ok_or(SceneError::UnknownCell(cell))?;
    cell.add_geometry(Box::new(Skybox::new(
        [0.95, 0.65, 0.45, 1.0],
        [0.35, 0.25, 0.55, 1.0],
    )));
    cell.add_geometry(Box::new(TexturedQuad::new(
        assets.floor,
        assets.gallery_floor,
        Mat4::from_translation(GALLERY_ORIGIN),
    )));
    for (index, x) in [-2.5_f32, 0.0, 2.5].into_iter().enumerate() {
        let height = 0.5 + index as f32 * 0.4;
        cell.add_geometry(Box::new(ModelShape::new(
            assets.cube,
            assets.teal,
            Mat4::from_scale_rotation_translation(
                Vec3::new(0.5, height, 0.5),
                Quat::from_rotation_y(index as f32 * 0.4),
                GALLERY_ORIGIN + Vec3::new(x, height, -2.0),
            ),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use glam::Vec3;
    use riftview_core::crossing::CrossingDetector;
    use riftview_core::draw::{
        DrawSink, MaterialHandle, MeshDraw, MeshHandle, SkyDraw, SurfaceDraw,
    };
    use riftview_core::pool::{Extent, RenderTargetPool, TargetResolution};
    use riftview_core::renderer::{PortalBackend, PortalRenderer, RenderSettings};

    use super::{build_demo_scene, DemoAssets, DemoScene};

    fn assets() -> DemoAssets {
        DemoAssets {
            cube: MeshHandle(0),
            floor: MeshHandle(1),
            courtyard_floor: MaterialHandle(0),
            gallery_floor: MaterialHandle(1),
            stone: MaterialHandle(2),
            brass: MaterialHandle(3),
            teal: MaterialHandle(4),
        }
    }

    fn demo() -> DemoScene {
        build_demo_scene(&assets()).unwrap()
    }

    #[derive(Default)]
    struct CountingBackend {
        passes: u32,
        meshes: u32,
        skies: u32,
    }

    impl DrawSink for CountingBackend {
        fn draw_mesh(&mut self, _draw: MeshDraw) {
            self.meshes += 1;
        }

        fn draw_sky(&mut self, _draw: SkyDraw) {
            self.skies += 1;
        }

        fn draw_surface(&mut self, _draw: SurfaceDraw) {}
    }

    impl PortalBackend for CountingBackend {
        type Error = Infallible;

        fn allocate_targets(&mut self, _count: usize, _extent: Extent) -> Result<(), Self::Error> {
            Ok(())
        }

        fn begin_offscreen(&mut self, _target: usize, _viewport: Extent) {
            self.passes += 1;
        }

        fn end_offscreen(&mut self, _viewport: Extent) {}
    }

    #[test]
    fn demo_scene_validates_and_starts_in_the_courtyard() {
        let demo = demo();
        assert_eq!(demo.scene.viewpoint(), Some(demo.courtyard));
        let courtyard = demo.scene.cell(demo.courtyard).unwrap();
        let gallery = demo.scene.cell(demo.gallery).unwrap();
        assert_eq!(courtyard.portals().len(), 3);
        assert_eq!(gallery.portals().len(), 1);
        assert!(demo.scene.validate().is_ok());
    }

    #[test]
    fn walking_through_the_hall_enters_the_gallery() {
        let mut demo = demo();
        let mut detector = CrossingDetector::new();
        let mut camera = demo.spawn;
        camera.position = Vec3::new(0.0, 1.2, -3.9);
        assert!(detector.update(&mut demo.scene, &mut camera).is_none());

        camera.position.z = -4.1;
        let crossing = detector.update(&mut demo.scene, &mut camera).unwrap();

        assert_eq!(crossing.to, demo.gallery);
        assert_eq!(demo.scene.viewpoint(), Some(demo.gallery));
        assert!((camera.position - Vec3::new(50.0, 1.2, 3.9)).length() < 1.0e-3);
        assert!((camera.front - Vec3::NEG_Z).length() < 1.0e-3);
    }

    #[test]
    fn side_portals_loop_back_into_the_courtyard() {
        let mut demo = demo();
        let mut detector = CrossingDetector::new();
        let mut camera = demo.spawn;
        camera.position = Vec3::new(-3.9, 1.0, 0.2);
        detector.update(&mut demo.scene, &mut camera);

        camera.position.x = -4.1;
        let crossing = detector.update(&mut demo.scene, &mut camera).unwrap();

        assert_eq!(crossing.to, demo.courtyard);
        assert!((camera.position - Vec3::new(3.9, 1.0, 0.2)).length() < 1.0e-3);
    }

    #[test]
    fn spawn_view_renders_every_courtyard_portal() {
        let mut demo = demo();
        let settings = RenderSettings {
            recursion_depth: 1,
            ..RenderSettings::default()
        };
        let pool = RenderTargetPool::new(2, TargetResolution::MatchScreen).unwrap();
        let mut renderer = PortalRenderer::new(settings, pool);
        let mut backend = CountingBackend::default();
        renderer.resize(&mut backend, 1280, 720).unwrap();

        let stats = renderer.render_scene(&mut demo.scene, &demo.spawn, &mut backend);

        assert_eq!(stats.offscreen_passes, 3);
        assert_eq!(stats.textured_surfaces, 3);
        assert_eq!(backend.passes, 3);
        // The courtyard sky once on screen and once per pass into it; the gallery sky once.
        assert_eq!(backend.skies, 4);
        assert!(backend.meshes > 0);
    }
}
