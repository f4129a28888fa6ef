use glam::{Vec2, Vec3};
use tracing::{info, trace, warn};

use crate::camera::CameraPose;
use crate::scene::{CellId, PortalId, Scene};
use crate::transform::through_portal;

/// A teleport that happened this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub portal: PortalId,
    pub from: CellId,
    pub to: CellId,
    /// Where the camera pierced the aperture, in the quad's right/up coordinates.
    pub aperture_point: Vec2,
}

/// Moves the viewer between cells when it passes through a portal aperture.
///
/// A crossing needs the previous position strictly in front of the aperture
/// plane, the current one strictly behind it, and the current position inside
/// the quad's bounds. Walking back out through the rear never triggers.
#[derive(Debug, Default, Clone)]
pub struct CrossingDetector {
    previous: Option<Vec3>,
}

impl CrossingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_position(&self) -> Option<Vec3> {
        self.previous
    }

    /// Forgets the stored position; the next update only primes it.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Checks the viewpoint cell's portals in insertion order; the first
    /// accepted crossing relocates the viewpoint and remaps `camera`.
    pub fn update(&mut self, scene: &mut Scene, camera: &mut CameraPose) -> Option<Crossing> {
        let previous = *self.previous.get_or_insert(camera.position);
        let crossing = self.apply(scene, camera, previous);
        self.previous = Some(camera.position);
        crossing
    }

    fn apply(&self, scene: &mut Scene, camera: &mut CameraPose, previous: Vec3) -> Option<Crossing> {
        let from = scene.viewpoint()?;
        let (portal_id, aperture_point) = find_crossing(scene, from, previous, camera.position)?;
        let portal = *scene.portal(portal_id)?;

        if let Err(err) = scene.set_viewpoint(portal.destination()) {
            warn!("Ignoring crossing through {portal_id}: {err}");
            return None;
        }
        *camera = through_portal(camera, portal.transform());

        info!(
            "Crossed {portal_id} from {from} into {} at ({:.2}, {:.2})",
            portal.destination(),
            camera.position.x,
            camera.position.z
        );
        Some(Crossing {
            portal: portal_id,
            from,
            to: portal.destination(),
            aperture_point,
        })
    }
}

/// First portal of `cell` whose aperture the segment `previous -> current` passes through front-to-back.
pub fn find_crossing(
    scene: &Scene,
    cell: CellId,
    previous: Vec3,
    current: Vec3,
) -> Option<(PortalId, Vec2)> {
    let portal_ids = scene.cell(cell)?.portal_ids();
    for id in portal_ids {
        let Some(quad) = scene.portal_quad(id) else {
            continue;
        };

        let was_front = quad.signed_distance(previous) > 0.0;
        let is_back = quad.signed_distance(current) < 0.0;
        if !(was_front && is_back) {
            continue;
        }

        let local = quad.local_coords(current);
        if !quad.aperture_contains(local) {
            trace!("Plane of {id} crossed outside its aperture at {local:?}");
            continue;
        }

        let destination_exists = scene
            .portal(id)
            .and_then(|portal| scene.cell(portal.destination()))
            .is_some();
        if destination_exists {
            return Some((id, local));
        }
    }
    None
}
