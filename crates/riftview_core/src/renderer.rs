//! Recursive portal rendering.
//!
//! A cell draws its portals first, then its own geometry. Each front-facing
//! portal with depth budget left renders its destination cell into a pooled
//! offscreen target from a camera moved through the portal, then draws the
//! portal surface in the outer view sampling that target.

use std::fmt;

use glam::Mat4;
use tracing::trace;

use crate::camera::CameraPose;
use crate::draw::{CameraState, DrawSink, SurfaceDraw, SurfaceSource};
use crate::pool::{Extent, PoolError, RenderTargetPool};
use crate::projection::clipped_projection;
use crate::scene::{CellId, Portal, PortalId, Scene};
use crate::transform::{through_portal, through_portal_fixed};

pub const MAX_RECURSION_DEPTH: u32 = 10;
pub const DEFAULT_RECURSION_DEPTH: u32 = 3;
/// Distance the virtual camera sits in front of the exit aperture.
pub const DEFAULT_ANCHOR_OFFSET: f32 = 0.01;
/// Extra push of the oblique near plane past the exit aperture.
pub const DEFAULT_CLIP_BIAS: f32 = 0.025;

/// GPU-facing half of the renderer.
///
/// Draws land in whichever target is current: the screen until
/// `begin_offscreen`, then the pooled target until the matching
/// `end_offscreen`. Nested calls form a stack.
pub trait PortalBackend: DrawSink {
    type Error: std::error::Error;

    /// (Re)creates `count` color+depth targets of `extent`.
    fn allocate_targets(&mut self, count: usize, extent: Extent) -> Result<(), Self::Error>;

    /// Binds pooled target `target`, sets the viewport to `viewport` and clears color and depth.
    fn begin_offscreen(&mut self, target: usize, viewport: Extent);

    /// Returns to the target that was current before the matching `begin_offscreen`
    /// with the caller's `viewport`.
    fn end_offscreen(&mut self, viewport: Extent);
}

#[derive(Debug)]
pub enum ResizeError<E> {
    Pool(PoolError),
    Backend(E),
}

impl<E: fmt::Display> fmt::Display for ResizeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool(err) => write!(f, "failed to size portal targets: {err}"),
            Self::Backend(err) => write!(f, "failed to allocate portal targets: {err}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ResizeError<E> {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub recursion_depth: u32,
    pub anchor_offset: f32,
    pub clip_bias: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            recursion_depth: DEFAULT_RECURSION_DEPTH,
            anchor_offset: DEFAULT_ANCHOR_OFFSET,
            clip_bias: DEFAULT_CLIP_BIAS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub offscreen_passes: u32,
    pub textured_surfaces: u32,
    pub blank_surfaces: u32,
    pub back_facing_portals: u32,
    pub geometry_draws: u32,
    pub deepest_level: u32,
}

pub struct PortalRenderer {
    settings: RenderSettings,
    pool: RenderTargetPool,
    screen: Option<Extent>,
    viewports: Vec<Extent>,
    stats: FrameStats,
}

impl PortalRenderer {
    pub fn new(settings: RenderSettings, pool: RenderTargetPool) -> Self {
        let mut renderer = Self {
            settings,
            pool,
            screen: None,
            viewports: Vec::new(),
            stats: FrameStats::default(),
        };
        renderer.set_recursion_depth(settings.recursion_depth);
        renderer
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn recursion_depth(&self) -> u32 {
        self.settings.recursion_depth
    }

    pub fn set_recursion_depth(&mut self, depth: u32) {
        self.settings.recursion_depth = depth.min(MAX_RECURSION_DEPTH);
    }

    pub fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }

    pub fn screen(&self) -> Option<Extent> {
        self.screen
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.stats
    }

    /// Re-sizes the pool for a new output surface and reallocates the backend's targets.
    pub fn resize<B: PortalBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<Extent, ResizeError<B::Error>> {
        let extent = self.pool.init(width, height).map_err(ResizeError::Pool)?;
        backend
            .allocate_targets(self.pool.count(), extent)
            .map_err(ResizeError::Backend)?;
        self.screen = Some(Extent::new(width, height));
        Ok(extent)
    }

    /// Replaces the pool (new size or resolution policy); call `resize` afterwards.
    pub fn replace_pool(&mut self, pool: RenderTargetPool) {
        self.pool = pool;
        self.screen = None;
    }

    /// Renders the viewpoint cell and everything visible through its portals.
    pub fn render_scene<B: PortalBackend>(
        &mut self,
        scene: &mut Scene,
        camera: &CameraPose,
        backend: &mut B,
    ) -> FrameStats {
        self.stats = FrameStats::default();
        self.pool.begin_frame();

        let (Some(cell), Some(screen)) = (scene.viewpoint(), self.screen) else {
            return self.stats;
        };

        self.viewports.clear();
        self.viewports.push(screen);
        let projection = camera.projection(screen.aspect());
        let depth = self.settings.recursion_depth;
        self.render_cell(scene, cell, camera, projection, depth, None, backend);
        self.stats
    }

    fn render_cell<B: PortalBackend>(
        &mut self,
        scene: &mut Scene,
        cell: CellId,
        camera: &CameraPose,
        projection: Mat4,
        depth: u32,
        entry: Option<PortalId>,
        backend: &mut B,
    ) {
        let Some(portal_ids) = scene
            .cell(cell)
            .map(|cell| cell.portal_ids().collect::<Vec<_>>())
        else {
            return;
        };

        for id in portal_ids {
            if Some(id) == entry {
                continue;
            }
            self.render_portal(scene, id, camera, projection, depth, backend);
        }

        let state = camera.camera_state(projection);
        let Some(cell) = scene.cell_mut(cell) else {
            return;
        };
        for shape in cell.geometry_mut() {
            if shape.portal_surface().is_some() {
                continue;
            }
            shape.set_camera_state(&state);
            shape.render(&mut *backend);
            self.stats.geometry_draws += 1;
        }
    }

    fn render_portal<B: PortalBackend>(
        &mut self,
        scene: &mut Scene,
        id: PortalId,
        camera: &CameraPose,
        projection: Mat4,
        depth: u32,
        backend: &mut B,
    ) {
        let (Some(portal), Some(quad)) = (scene.portal(id).copied(), scene.portal_quad(id)) else {
            trace!("Skipping {id}: no portal surface");
            return;
        };

        if !quad.is_front_facing(camera.position) {
            self.stats.back_facing_portals += 1;
            return;
        }

        let outer = camera.camera_state(projection);
        let exit = portal
            .return_portal()
            .filter(|exit| exit.cell == portal.destination())
            .and_then(|exit| scene.portal_quad(exit));
        let (Some(exit), Some(extent), true) = (exit, self.pool.extent(), depth > 0) else {
            self.draw_blank_surface(scene, &portal, &outer, backend);
            return;
        };

        let target = self.pool.acquire();
        let anchor = exit.center() + exit.normal() * self.settings.anchor_offset;
        let virtual_camera =
            through_portal_fixed(camera, portal.transform(), anchor, portal.flip_view());
        let view = virtual_camera.view_matrix();
        // Same aspect as the caller so target texels line up with the outer view.
        let aspect = self.viewports.last().map_or(extent.aspect(), Extent::aspect);
        let clipped = clipped_projection(
            virtual_camera.projection(aspect),
            &exit,
            view,
            virtual_camera.front,
            self.settings.clip_bias,
        );
        // Source-surface points go through the portal first, then into the
        // destination camera's clip space.
        let texture_view_projection = clipped
            * through_portal(camera, portal.transform()).view_matrix()
            * portal.transform();

        self.stats.offscreen_passes += 1;
        let level = self.viewports.len() as u32;
        self.stats.deepest_level = self.stats.deepest_level.max(level);
        trace!("Rendering {id} into target {target} at level {level}");

        backend.begin_offscreen(target, extent);
        self.viewports.push(extent);
        self.render_cell(
            scene,
            portal.destination(),
            &virtual_camera,
            clipped,
            depth - 1,
            Some(id),
            backend,
        );
        self.viewports.pop();
        let caller = self.viewports.last().copied().unwrap_or(extent);
        backend.end_offscreen(caller);

        backend.draw_surface(SurfaceDraw {
            model: quad.surface_matrix(),
            camera: outer,
            source: SurfaceSource::Target {
                index: target,
                texture_view_projection,
            },
        });
        self.stats.textured_surfaces += 1;
    }

    fn draw_blank_surface<B: PortalBackend>(
        &mut self,
        scene: &mut Scene,
        portal: &Portal,
        outer: &CameraState,
        backend: &mut B,
    ) {
        let Some(surface) = scene.geometry_mut(portal.surface()) else {
            return;
        };
        surface.set_camera_state(outer);
        surface.render(&mut *backend);
        self.stats.blank_surfaces += 1;
    }
}

impl fmt::Debug for PortalRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalRenderer")
            .field("settings", &self.settings)
            .field("pool", &self.pool)
            .field("screen", &self.screen)
            .finish()
    }
}
