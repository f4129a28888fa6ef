use std::fmt;

use glam::{Mat4, Vec3};

use crate::draw::{
    CameraState, DrawSink, MaterialHandle, MeshDraw, MeshHandle, Renderable, Shading, SkyDraw,
    SurfaceDraw, SurfaceSource,
};
use crate::pool::Extent;
use crate::renderer::PortalBackend;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Allocate { count: usize, extent: Extent },
    Begin { target: usize, viewport: Extent },
    End { viewport: Extent },
    Mesh { mesh: MeshHandle, eye: Vec3 },
    Sky,
    Surface { model: Mat4, eye: Vec3, source: SurfaceSource },
}

#[derive(Debug)]
pub struct AllocationRefused;

impl fmt::Display for AllocationRefused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation refused")
    }
}

impl std::error::Error for AllocationRefused {}

/// Backend double that logs every call in order.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<Event>,
    pub refuse_allocation: bool,
}

impl RecordingBackend {
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn passes(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, Event::Begin { .. }))
            .count()
    }

    pub fn targets(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Begin { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn surfaces(&self) -> Vec<SurfaceSource> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Surface { source, .. } => Some(*source),
                _ => None,
            })
            .collect()
    }
}

impl DrawSink for RecordingBackend {
    fn draw_mesh(&mut self, draw: MeshDraw) {
        self.events.push(Event::Mesh {
            mesh: draw.mesh,
            eye: draw.camera.eye,
        });
    }

    fn draw_sky(&mut self, _draw: SkyDraw) {
        self.events.push(Event::Sky);
    }

    fn draw_surface(&mut self, draw: SurfaceDraw) {
        self.events.push(Event::Surface {
            model: draw.model,
            eye: draw.camera.eye,
            source: draw.source,
        });
    }
}

impl PortalBackend for RecordingBackend {
    type Error = AllocationRefused;

    fn allocate_targets(&mut self, count: usize, extent: Extent) -> Result<(), Self::Error> {
        if self.refuse_allocation {
            return Err(AllocationRefused);
        }
        self.events.push(Event::Allocate { count, extent });
        Ok(())
    }

    fn begin_offscreen(&mut self, target: usize, viewport: Extent) {
        self.events.push(Event::Begin { target, viewport });
    }

    fn end_offscreen(&mut self, viewport: Extent) {
        self.events.push(Event::End { viewport });
    }
}

/// Plain geometry that draws one mesh tagged with `id`.
pub struct Marker {
    id: u32,
    camera: CameraState,
}

impl Marker {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            camera: CameraState::default(),
        }
    }
}

impl Renderable for Marker {
    fn set_camera_state(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn render(&self, sink: &mut dyn DrawSink) {
        sink.draw_mesh(MeshDraw {
            mesh: MeshHandle(self.id),
            material: MaterialHandle(0),
            model: Mat4::IDENTITY,
            camera: self.camera,
            shading: Shading::Unlit,
        });
    }
}
