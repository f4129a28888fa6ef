//! `PortalBackend` for wgpu.
//!
//! wgpu render passes cannot nest, so the recursive renderer's calls are
//! recorded into a stack of pass records. A pass is finished when its
//! `end_offscreen` arrives, which means the deepest passes finish first and
//! every pass that samples a target is encoded after the pass that filled it.
//! The screen pass is finished last.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use riftview_core::draw::{
    DrawSink, MaterialHandle, MeshDraw, MeshHandle, Shading, SkyDraw, SurfaceDraw, SurfaceSource,
};
use riftview_core::pool::Extent;
use riftview_core::renderer::PortalBackend;
use tracing::{trace, warn};

use crate::renderer::targets::{PortalTargets, TargetError};

pub const BLANK_SURFACE_COLOR: [f32; 4] = [0.18, 0.16, 0.22, 1.0];
const MESH_TINT: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const MIN_ARENA_SLOTS: u64 = 64;

/// Per-draw uniform block shared by every pipeline; exactly one 256-byte slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    /// Sky draws store the inverse view-projection here.
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub texture_view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub color: [f32; 4],
    pub color_b: [f32; 4],
    /// x: 1.0 when a portal surface samples its target.
    pub params: [f32; 4],
}

pub const UNIFORM_STRIDE: u64 = std::mem::size_of::<DrawUniforms>() as u64;

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            texture_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            eye: [0.0; 4],
            color: MESH_TINT,
            color_b: [0.0; 4],
            params: [0.0; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Mesh {
        mesh: MeshHandle,
        material: MaterialHandle,
        shading: Shading,
        uniform: u32,
    },
    Sky {
        uniform: u32,
    },
    Surface {
        target: Option<usize>,
        uniform: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    /// `None` renders to the swapchain image.
    pub target: Option<usize>,
    pub viewport: Extent,
    pub draws: Vec<DrawCommand>,
}

impl RecordedPass {
    fn new(target: Option<usize>, viewport: Extent) -> Self {
        Self {
            target,
            viewport,
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PassRecorder {
    open: Vec<RecordedPass>,
    finished: Vec<RecordedPass>,
    uniforms: Vec<DrawUniforms>,
    downgraded_surfaces: u32,
}

impl PassRecorder {
    pub fn begin_frame(&mut self, screen: Extent) {
        self.open.clear();
        self.finished.clear();
        self.uniforms.clear();
        self.downgraded_surfaces = 0;
        self.open.push(RecordedPass::new(None, screen));
    }

    pub fn begin_pass(&mut self, target: usize, viewport: Extent) {
        self.open.push(RecordedPass::new(Some(target), viewport));
    }

    pub fn end_pass(&mut self, viewport: Extent) {
        if self.open.len() < 2 {
            warn!("Unbalanced end of offscreen pass ignored");
            return;
        }
        if let Some(pass) = self.open.pop() {
            self.finished.push(pass);
        }
        if let Some(caller) = self.open.last_mut() {
            caller.viewport = viewport;
        }
    }

    /// Closes whatever is still open and hands back passes in encode order.
    pub fn finish(&mut self) -> (Vec<RecordedPass>, &[DrawUniforms]) {
        while let Some(pass) = self.open.pop() {
            if pass.target.is_some() {
                warn!("Offscreen pass into target {:?} was never ended", pass.target);
            }
            self.finished.push(pass);
        }
        (std::mem::take(&mut self.finished), &self.uniforms)
    }

    pub fn downgraded_surfaces(&self) -> u32 {
        self.downgraded_surfaces
    }

    fn current_target(&self) -> Option<usize> {
        self.open.last().and_then(|pass| pass.target)
    }

    fn push(&mut self, uniforms: DrawUniforms, command: impl FnOnce(u32) -> DrawCommand) {
        let index = self.uniforms.len() as u32;
        self.uniforms.push(uniforms);
        let Some(pass) = self.open.last_mut() else {
            warn!("Draw recorded outside of a frame");
            return;
        };
        pass.draws.push(command(index));
    }
}

impl DrawSink for PassRecorder {
    fn draw_mesh(&mut self, draw: MeshDraw) {
        let uniforms = DrawUniforms {
            view_proj: draw.camera.view_projection().to_cols_array_2d(),
            model: draw.model.to_cols_array_2d(),
            eye: draw.camera.eye.extend(1.0).to_array(),
            ..DrawUniforms::default()
        };
        self.push(uniforms, |uniform| DrawCommand::Mesh {
            mesh: draw.mesh,
            material: draw.material,
            shading: draw.shading,
            uniform,
        });
    }

    fn draw_sky(&mut self, draw: SkyDraw) {
        let uniforms = DrawUniforms {
            view_proj: draw.camera.view_projection().inverse().to_cols_array_2d(),
            eye: draw.camera.eye.extend(1.0).to_array(),
            color: draw.horizon,
            color_b: draw.zenith,
            ..DrawUniforms::default()
        };
        self.push(uniforms, |uniform| DrawCommand::Sky { uniform });
    }

    fn draw_surface(&mut self, draw: SurfaceDraw) {
        let (target, texture_view_proj) = match draw.source {
            // A pass cannot sample its own color attachment.
            SurfaceSource::Target { index, .. } if self.current_target() == Some(index) => {
                trace!("Surface would sample target {index} while rendering into it; drawing blank");
                self.downgraded_surfaces += 1;
                (None, Mat4::IDENTITY)
            }
            SurfaceSource::Target {
                index,
                texture_view_projection,
            } => (Some(index), texture_view_projection),
            SurfaceSource::Blank => (None, Mat4::IDENTITY),
        };

        let uniforms = DrawUniforms {
            view_proj: draw.camera.view_projection().to_cols_array_2d(),
            model: draw.model.to_cols_array_2d(),
            texture_view_proj: texture_view_proj.to_cols_array_2d(),
            eye: draw.camera.eye.extend(1.0).to_array(),
            color: BLANK_SURFACE_COLOR,
            params: [if target.is_some() { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            ..DrawUniforms::default()
        };
        self.push(uniforms, |uniform| DrawCommand::Surface { target, uniform });
    }
}

/// Growable uniform buffer addressed with dynamic offsets, one slot per draw.
pub struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    slots: u64,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let (buffer, bind_group) = create_arena(device, layout, MIN_ARENA_SLOTS);
        Self {
            buffer,
            bind_group,
            slots: MIN_ARENA_SLOTS,
        }
    }

    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        uniforms: &[DrawUniforms],
    ) {
        let needed = uniforms.len() as u64;
        if needed > self.slots {
            let slots = needed.next_power_of_two();
            let (buffer, bind_group) = create_arena(device, layout, slots);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.slots = slots;
            trace!("Uniform arena grown to {slots} slots");
        }
        if !uniforms.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(uniforms));
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn offset(uniform: u32) -> wgpu::DynamicOffset {
        (u64::from(uniform) * UNIFORM_STRIDE) as wgpu::DynamicOffset
    }
}

fn create_arena(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    slots: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Arena"),
        size: slots * UNIFORM_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(UNIFORM_STRIDE),
            }),
        }],
    });
    (buffer, bind_group)
}

/// Records draws for one frame and owns the pooled offscreen targets.
pub struct WgpuBackend {
    device: wgpu::Device,
    targets: PortalTargets,
    recorder: PassRecorder,
}

impl WgpuBackend {
    pub fn new(device: &wgpu::Device, targets: PortalTargets) -> Self {
        Self {
            device: device.clone(),
            targets,
            recorder: PassRecorder::default(),
        }
    }

    pub fn targets(&self) -> &PortalTargets {
        &self.targets
    }

    pub fn begin_frame(&mut self, screen: Extent) {
        self.recorder.begin_frame(screen);
    }

    pub fn recorder_mut(&mut self) -> &mut PassRecorder {
        &mut self.recorder
    }
}

impl DrawSink for WgpuBackend {
    fn draw_mesh(&mut self, draw: MeshDraw) {
        self.recorder.draw_mesh(draw);
    }

    fn draw_sky(&mut self, draw: SkyDraw) {
        self.recorder.draw_sky(draw);
    }

    fn draw_surface(&mut self, draw: SurfaceDraw) {
        self.recorder.draw_surface(draw);
    }
}

impl PortalBackend for WgpuBackend {
    type Error = TargetError;

    fn allocate_targets(&mut self, count: usize, extent: Extent) -> Result<(), Self::Error> {
        self.targets.allocate(&self.device, count, extent)
    }

    fn begin_offscreen(&mut self, target: usize, viewport: Extent) {
        self.recorder.begin_pass(target, viewport);
    }

    fn end_offscreen(&mut self, viewport: Extent) {
        self.recorder.end_pass(viewport);
    }
}
