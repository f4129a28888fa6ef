//! Per-frame entry point for hosts.

use tracing::debug;

use crate::camera::CameraPose;
use crate::crossing::{Crossing, CrossingDetector};
use crate::pool::{Extent, RenderTargetPool};
use crate::renderer::{FrameStats, PortalBackend, PortalRenderer, ResizeError};
use crate::scene::Scene;

const STATS_LOG_INTERVAL_SECS: f32 = 1.0;

/// What one call to [`FrameDriver::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub stats: FrameStats,
    pub crossing: Option<Crossing>,
}

/// Running totals since the last stats log.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameCounters {
    pub frames: u32,
    pub teleports: u32,
    pub elapsed: f32,
}

/// Runs crossing detection and the recursive render in the right order.
#[derive(Debug)]
pub struct FrameDriver {
    renderer: PortalRenderer,
    crossing: CrossingDetector,
    counters: FrameCounters,
}

impl FrameDriver {
    pub fn new(renderer: PortalRenderer) -> Self {
        Self {
            renderer,
            crossing: CrossingDetector::new(),
            counters: FrameCounters::default(),
        }
    }

    pub fn renderer(&self) -> &PortalRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut PortalRenderer {
        &mut self.renderer
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    pub fn resize<B: PortalBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<Extent, ResizeError<B::Error>> {
        self.renderer.resize(backend, width, height)
    }

    /// Swaps in a new pool and sizes it for the current screen, if any.
    pub fn replace_pool<B: PortalBackend>(
        &mut self,
        backend: &mut B,
        pool: RenderTargetPool,
    ) -> Result<Option<Extent>, ResizeError<B::Error>> {
        let screen = self.renderer.screen();
        self.renderer.replace_pool(pool);
        match screen {
            Some(screen) => self.resize(backend, screen.width, screen.height).map(Some),
            None => Ok(None),
        }
    }

    /// Forgets the previous camera position, e.g. after the host moves the
    /// camera without walking.
    pub fn reset_crossing(&mut self) {
        self.crossing.reset();
    }

    /// Teleports `camera` if it walked through a portal since the last frame,
    /// then renders the (possibly new) viewpoint cell.
    pub fn render_frame<B: PortalBackend>(
        &mut self,
        scene: &mut Scene,
        camera: &mut CameraPose,
        dt: f32,
        backend: &mut B,
    ) -> FrameReport {
        let crossing = self.crossing.update(scene, camera);
        let stats = self.renderer.render_scene(scene, camera, backend);

        self.counters.frames += 1;
        self.counters.elapsed += dt.max(0.0);
        if crossing.is_some() {
            self.counters.teleports += 1;
        }
        if self.counters.elapsed >= STATS_LOG_INTERVAL_SECS {
            log_frame_stats(&stats, &self.counters);
            self.counters = FrameCounters::default();
        }

        FrameReport { stats, crossing }
    }
}

fn log_frame_stats(stats: &FrameStats, counters: &FrameCounters) {
    debug!(
        "{} frames in {:.2}s, {} teleports; last frame: {} passes, {} textured, {} blank, {} back-facing, {} draws, depth {}",
        counters.frames,
        counters.elapsed,
        counters.teleports,
        stats.offscreen_passes,
        stats.textured_surfaces,
        stats.blank_surfaces,
        stats.back_facing_portals,
        stats.geometry_draws,
        stats.deepest_level
    );
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec3;

    use super::FrameDriver;
    use crate::camera::CameraPose;
    use crate::draw::{PortalSurface, SurfaceSource};
    use crate::geometry::PortalQuad;
    use crate::pool::{Extent, RenderTargetPool, TargetResolution};
    use crate::renderer::{PortalRenderer, RenderSettings};
    use crate::scene::{CellId, Portal, Scene};
    use crate::test_support::{Event, RecordingBackend};
    use crate::transform::pair_transform;

    fn linked_rooms() -> (Scene, CellId, CellId) {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        let b = scene.create_cell();
        let near = PortalQuad::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, 0.5, 0.75).unwrap();
        let far = PortalQuad::new(Vec3::new(20.0, 1.0, 0.0), Vec3::Z, 0.5, 0.75).unwrap();
        let near_surface = scene
            .cell_mut(a)
            .unwrap()
            .add_geometry(Box::new(PortalSurface::new(near)));
        let far_surface = scene
            .cell_mut(b)
            .unwrap()
            .add_geometry(Box::new(PortalSurface::new(far)));
        let forward = scene
            .add_portal(
                a,
                Portal::new(near_surface, b, pair_transform(near.model(), far.model())),
            )
            .unwrap();
        let back = scene
            .add_portal(
                b,
                Portal::new(far_surface, a, pair_transform(far.model(), near.model())),
            )
            .unwrap();
        scene.link_portals(forward, back).unwrap();
        scene.set_viewpoint(a).unwrap();
        (scene, a, b)
    }

    fn driver(depth: u32) -> (FrameDriver, RecordingBackend) {
        let settings = RenderSettings {
            recursion_depth: depth,
            ..RenderSettings::default()
        };
        let pool = RenderTargetPool::new(2, TargetResolution::MatchScreen).unwrap();
        let mut driver = FrameDriver::new(PortalRenderer::new(settings, pool));
        let mut backend = RecordingBackend::default();
        driver.resize(&mut backend, 640, 480).unwrap();
        backend.clear();
        (driver, backend)
    }

    #[test]
    fn crossing_happens_before_rendering() {
        let (mut scene, _, b) = linked_rooms();
        let (mut driver, mut backend) = driver(1);
        let mut camera = CameraPose::new(Vec3::new(0.0, 1.0, 0.2), -FRAC_PI_2, 0.0);
        driver.render_frame(&mut scene, &mut camera, 0.016, &mut backend);

        backend.clear();
        camera.position.z = -0.2;
        let report = driver.render_frame(&mut scene, &mut camera, 0.016, &mut backend);

        let crossing = report.crossing.unwrap();
        assert_eq!(crossing.to, b);
        assert_eq!(scene.viewpoint(), Some(b));
        assert!((camera.position - Vec3::new(20.0, 1.0, 0.2)).length() < 1.0e-4);
        assert!((camera.front - Vec3::Z).length() < 1.0e-4);

        assert_eq!(report.stats.back_facing_portals, 0);
        assert_eq!(report.stats.offscreen_passes, 1);
        assert_eq!(driver.counters().teleports, 1);
    }

    #[test]
    fn stats_counters_reset_after_the_log_interval() {
        let (mut scene, _, _) = linked_rooms();
        let (mut driver, mut backend) = driver(2);
        let mut camera = CameraPose::new(Vec3::new(0.0, 1.0, 3.0), -FRAC_PI_2, 0.0);

        for _ in 0..3 {
            driver.render_frame(&mut scene, &mut camera, 0.25, &mut backend);
        }
        assert_eq!(driver.counters().frames, 3);

        driver.render_frame(&mut scene, &mut camera, 0.25, &mut backend);
        assert_eq!(driver.counters().frames, 0);
    }

    #[test]
    fn replacing_the_pool_reallocates_for_the_current_screen() {
        let (mut driver, mut backend) = driver(2);
        let pool = RenderTargetPool::new(4, TargetResolution::Scaled { factor: 0.5 }).unwrap();

        let extent = driver.replace_pool(&mut backend, pool).unwrap();

        assert_eq!(extent, Some(Extent::new(320, 240)));
        assert_eq!(
            backend.events,
            vec![Event::Allocate {
                count: 4,
                extent: Extent::new(320, 240)
            }]
        );
        assert_eq!(driver.renderer().pool().count(), 4);
    }

    #[test]
    fn surfaces_textured_from_the_first_frame() {
        let (mut scene, _, _) = linked_rooms();
        let (mut driver, mut backend) = driver(1);
        let mut camera = CameraPose::new(Vec3::new(0.0, 1.0, 3.0), -FRAC_PI_2, 0.0);

        let report = driver.render_frame(&mut scene, &mut camera, 0.016, &mut backend);

        assert!(report.crossing.is_none());
        assert!(matches!(
            backend.surfaces().last(),
            Some(SurfaceSource::Target { index: 0, .. })
        ));
    }
}
