use std::fmt;

use glam::Mat4;
use tracing::{debug, warn};

use crate::draw::Renderable;
use crate::geometry::PortalQuad;

/// Tolerance for the `transform(B) == inverse(transform(A))` pairing check.
const PAIR_INVERSE_TOLERANCE: f32 = 1.0e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId {
    pub cell: CellId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId {
    pub cell: CellId,
    pub index: usize,
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}", self.0)
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal {}/{}", self.cell.0, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    UnknownCell(CellId),
    UnknownPortal(PortalId),
    MissingSurface { portal: PortalId, surface: GeometryId },
    SurfaceNotPortal { portal: PortalId, surface: GeometryId },
    UnknownDestination { portal: PortalId, destination: CellId },
    ReturnOutsideDestination { portal: PortalId, partner: PortalId },
    AsymmetricPair { portal: PortalId, partner: PortalId },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCell(cell) => write!(f, "{cell} does not exist"),
            Self::UnknownPortal(portal) => write!(f, "{portal} does not exist"),
            Self::MissingSurface { portal, surface } => write!(
                f,
                "{portal} uses geometry {} of {} which does not exist in its cell",
                surface.index, surface.cell
            ),
            Self::SurfaceNotPortal { portal, surface } => write!(
                f,
                "{portal} uses geometry {} of {} which is not a portal surface",
                surface.index, surface.cell
            ),
            Self::UnknownDestination {
                portal,
                destination,
            } => write!(f, "{portal} leads to missing {destination}"),
            Self::ReturnOutsideDestination { portal, partner } => write!(
                f,
                "{portal} returns through {partner}, which is not in its destination cell"
            ),
            Self::AsymmetricPair { portal, partner } => write!(
                f,
                "{portal} returns through {partner}, but {partner} does not return to it"
            ),
        }
    }
}

impl std::error::Error for SceneError {}

/// A directed link from a surface in one cell to another cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portal {
    surface: GeometryId,
    destination: CellId,
    transform: Mat4,
    return_portal: Option<PortalId>,
    flip_view: bool,
}

impl Portal {
    /// `transform` maps this side's camera frame into the destination's.
    pub fn new(surface: GeometryId, destination: CellId, transform: Mat4) -> Self {
        Self {
            surface,
            destination,
            transform,
            return_portal: None,
            flip_view: false,
        }
    }

    pub fn with_flip_view(mut self, flip_view: bool) -> Self {
        self.flip_view = flip_view;
        self
    }

    pub fn surface(&self) -> GeometryId {
        self.surface
    }

    pub fn destination(&self) -> CellId {
        self.destination
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn return_portal(&self) -> Option<PortalId> {
        self.return_portal
    }

    pub fn flip_view(&self) -> bool {
        self.flip_view
    }
}

/// One region of the world: geometry in draw order plus outgoing portals.
pub struct Cell {
    id: CellId,
    geometry: Vec<Box<dyn Renderable>>,
    portals: Vec<Portal>,
}

impl Cell {
    fn new(id: CellId) -> Self {
        Self {
            id,
            geometry: Vec::new(),
            portals: Vec::new(),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn add_geometry(&mut self, shape: Box<dyn Renderable>) -> GeometryId {
        self.geometry.push(shape);
        GeometryId {
            cell: self.id,
            index: self.geometry.len() - 1,
        }
    }

    pub fn add_portal(&mut self, portal: Portal) -> PortalId {
        self.portals.push(portal);
        PortalId {
            cell: self.id,
            index: self.portals.len() - 1,
        }
    }

    pub fn geometry(&self) -> &[Box<dyn Renderable>] {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut self.geometry
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn portal_ids(&self) -> impl Iterator<Item = PortalId> + '_ {
        (0..self.portals.len()).map(|index| PortalId {
            cell: self.id,
            index,
        })
    }
}

/// Owns every cell and tracks which one holds the viewer.
#[derive(Default)]
pub struct Scene {
    cells: Vec<Cell>,
    viewpoint: Option<CellId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_cell(&mut self) -> CellId {
        let id = CellId(self.cells.len());
        self.cells.push(Cell::new(id));
        id
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id.0)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn viewpoint(&self) -> Option<CellId> {
        self.viewpoint
    }

    pub fn set_viewpoint(&mut self, id: CellId) -> Result<(), SceneError> {
        if self.cell(id).is_none() {
            return Err(SceneError::UnknownCell(id));
        }
        self.viewpoint = Some(id);
        Ok(())
    }

    pub fn add_portal(&mut self, cell: CellId, portal: Portal) -> Result<PortalId, SceneError> {
        let cell = self.cell_mut(cell).ok_or(SceneError::UnknownCell(cell))?;
        Ok(cell.add_portal(portal))
    }

    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.cell(id.cell)?.portals.get(id.index)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Box<dyn Renderable>> {
        self.cell_mut(id.cell)?.geometry.get_mut(id.index)
    }

    /// Aperture of `id`, resolved through its surface geometry.
    pub fn portal_quad(&self, id: PortalId) -> Option<PortalQuad> {
        let portal = self.portal(id)?;
        let surface = portal.surface;
        self.cell(surface.cell)?
            .geometry
            .get(surface.index)?
            .portal_surface()
            .copied()
    }

    /// Makes `a` and `b` each other's return portal.
    pub fn link_portals(&mut self, a: PortalId, b: PortalId) -> Result<(), SceneError> {
        if self.portal(a).is_none() {
            return Err(SceneError::UnknownPortal(a));
        }
        if self.portal(b).is_none() {
            return Err(SceneError::UnknownPortal(b));
        }
        self.portal_mut(a)
            .ok_or(SceneError::UnknownPortal(a))?
            .return_portal = Some(b);
        self.portal_mut(b)
            .ok_or(SceneError::UnknownPortal(b))?
            .return_portal = Some(a);
        debug!("Linked {a} <-> {b}");
        Ok(())
    }

    /// Checks the authoring contracts that construction does not enforce.
    pub fn validate(&self) -> Result<(), SceneError> {
        if let Some(viewpoint) = self.viewpoint {
            if self.cell(viewpoint).is_none() {
                return Err(SceneError::UnknownCell(viewpoint));
            }
        }

        for cell in &self.cells {
            for id in cell.portal_ids() {
                let portal = &cell.portals[id.index];
                self.validate_portal(id, portal)?;
            }
        }

        Ok(())
    }

    fn validate_portal(&self, id: PortalId, portal: &Portal) -> Result<(), SceneError> {
        let surface = portal.surface;
        let shape = if surface.cell == id.cell {
            self.cell(surface.cell)
                .and_then(|cell| cell.geometry.get(surface.index))
        } else {
            None
        };
        let Some(shape) = shape else {
            return Err(SceneError::MissingSurface {
                portal: id,
                surface,
            });
        };
        if shape.portal_surface().is_none() {
            return Err(SceneError::SurfaceNotPortal {
                portal: id,
                surface,
            });
        }

        if self.cell(portal.destination).is_none() {
            return Err(SceneError::UnknownDestination {
                portal: id,
                destination: portal.destination,
            });
        }

        let Some(partner_id) = portal.return_portal else {
            return Ok(());
        };
        let partner = self
            .portal(partner_id)
            .ok_or(SceneError::UnknownPortal(partner_id))?;
        if partner_id.cell != portal.destination {
            return Err(SceneError::ReturnOutsideDestination {
                portal: id,
                partner: partner_id,
            });
        }
        if partner.return_portal != Some(id) {
            return Err(SceneError::AsymmetricPair {
                portal: id,
                partner: partner_id,
            });
        }

        let round_trip = portal.transform * partner.transform;
        if !round_trip.abs_diff_eq(Mat4::IDENTITY, PAIR_INVERSE_TOLERANCE) {
            warn!("{id} and {partner_id} have transforms that are not inverses of each other");
        }

        Ok(())
    }

    fn portal_mut(&mut self, id: PortalId) -> Option<&mut Portal> {
        self.cell_mut(id.cell)?.portals.get_mut(id.index)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::{Portal, Scene, SceneError};
    use crate::draw::PortalSurface;
    use crate::geometry::PortalQuad;
    use crate::test_support::Marker;

    fn surface(z: f32) -> Box<PortalSurface> {
        let quad = PortalQuad::new(Vec3::new(0.0, 1.0, z), Vec3::Z, 0.5, 0.75).unwrap();
        Box::new(PortalSurface::new(quad))
    }

    #[test]
    fn cells_and_portals_get_sequential_handles() {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        let b = scene.create_cell();
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
        assert!(scene.viewpoint().is_none());

        let cell = scene.cell_mut(a).unwrap();
        let first = cell.add_geometry(surface(0.0));
        let second = cell.add_geometry(surface(2.0));
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);

        let p0 = cell.add_portal(Portal::new(first, b, Mat4::IDENTITY));
        let p1 = scene
            .add_portal(a, Portal::new(second, b, Mat4::IDENTITY))
            .unwrap();
        assert_eq!((p0.cell, p0.index), (a, 0));
        assert_eq!((p1.cell, p1.index), (a, 1));
        assert_eq!(scene.cell(a).unwrap().portal_ids().collect::<Vec<_>>(), vec![p0, p1]);
        assert!(scene.portal_quad(p1).is_some());
    }

    #[test]
    fn viewpoint_must_exist() {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        assert!(scene.set_viewpoint(a).is_ok());
        assert_eq!(scene.viewpoint(), Some(a));
        assert_eq!(
            scene.set_viewpoint(super::CellId(7)),
            Err(SceneError::UnknownCell(super::CellId(7)))
        );
        assert_eq!(scene.viewpoint(), Some(a));
    }

    #[test]
    fn linked_pair_validates() {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        let b = scene.create_cell();
        let sa = scene.cell_mut(a).unwrap().add_geometry(surface(0.0));
        let sb = scene.cell_mut(b).unwrap().add_geometry(surface(0.0));
        let t = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
        let pa = scene.add_portal(a, Portal::new(sa, b, t)).unwrap();
        let pb = scene.add_portal(b, Portal::new(sb, a, t.inverse())).unwrap();

        scene.link_portals(pa, pb).unwrap();
        assert_eq!(scene.portal(pa).unwrap().return_portal(), Some(pb));
        assert_eq!(scene.portal(pb).unwrap().return_portal(), Some(pa));
        assert_eq!(scene.validate(), Ok(()));
    }

    #[test]
    fn validation_reports_broken_authoring() {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        let b = scene.create_cell();
        let plain = scene.cell_mut(a).unwrap().add_geometry(Box::new(Marker::new(1)));
        let portal = scene
            .add_portal(a, Portal::new(plain, b, Mat4::IDENTITY))
            .unwrap();
        assert_eq!(
            scene.validate(),
            Err(SceneError::SurfaceNotPortal {
                portal,
                surface: plain
            })
        );

        let mut scene = Scene::new();
        let a = scene.create_cell();
        let sa = scene.cell_mut(a).unwrap().add_geometry(surface(0.0));
        let portal = scene
            .add_portal(a, Portal::new(sa, super::CellId(4), Mat4::IDENTITY))
            .unwrap();
        assert_eq!(
            scene.validate(),
            Err(SceneError::UnknownDestination {
                portal,
                destination: super::CellId(4)
            })
        );
    }

    #[test]
    fn one_sided_pairing_is_rejected() {
        let mut scene = Scene::new();
        let a = scene.create_cell();
        let b = scene.create_cell();
        let sa = scene.cell_mut(a).unwrap().add_geometry(surface(0.0));
        let sb = scene.cell_mut(b).unwrap().add_geometry(surface(0.0));
        let pa = scene.add_portal(a, Portal::new(sa, b, Mat4::IDENTITY)).unwrap();
        let pb = scene.add_portal(b, Portal::new(sb, a, Mat4::IDENTITY)).unwrap();
        scene.link_portals(pa, pb).unwrap();
        // Re-point b at a third portal so the pair is one-sided.
        let sb2 = scene.cell_mut(b).unwrap().add_geometry(surface(3.0));
        let pb2 = scene.add_portal(b, Portal::new(sb2, a, Mat4::IDENTITY)).unwrap();
        scene.portal_mut(pa).unwrap().return_portal = Some(pb2);

        assert_eq!(
            scene.validate(),
            Err(SceneError::AsymmetricPair {
                portal: pa,
                partner: pb2
            })
        );
    }
}
