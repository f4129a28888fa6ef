pub mod backend;
pub mod mesh;
pub mod pipeline;
pub mod portal_surface;
pub mod registry;
pub mod sky;
pub mod targets;

use std::fmt;
use std::sync::Arc;

use riftview_core::camera::CameraPose;
use riftview_core::draw::Shading;
use riftview_core::frame::{FrameDriver, FrameReport};
use riftview_core::pool::{Extent, RenderTargetPool};
use riftview_core::renderer::ResizeError;
use riftview_core::scene::Scene;
use tracing::{debug, trace, warn};
use winit::window::Window;

use crate::renderer::backend::{DrawCommand, RecordedPass, UniformArena, WgpuBackend};
use crate::renderer::pipeline::{DrawLayouts, MeshPipelines};
use crate::renderer::portal_surface::PortalSurfacePipeline;
use crate::renderer::registry::ResourceRegistry;
use crate::renderer::sky::SkyPipeline;
use crate::renderer::targets::{PortalTargets, TargetError};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

#[derive(Debug)]
struct DepthTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Riftview Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: DepthTexture,
    layouts: DrawLayouts,
    mesh_pipelines: MeshPipelines,
    sky_pipeline: SkyPipeline,
    surface_pipeline: PortalSurfacePipeline,
    uniforms: UniformArena,
    backend: WgpuBackend,
    registry: ResourceRegistry,
}

#[derive(Debug)]
pub enum RendererInitError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RendererInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(err) => write!(f, "failed to create surface: {err}"),
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
            Self::UnsupportedSurface => write!(f, "adapter does not support this surface"),
        }
    }
}

impl std::error::Error for RendererInitError {}

impl Renderer {
    pub fn new(window: Arc<Window>, anisotropy: u16) -> Result<Self, RendererInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(RendererInitError::CreateSurface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(RendererInitError::RequestAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Riftview Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(RendererInitError::RequestDevice)?;

        let initial_size = window.inner_size();
        let surface_config = surface
            .get_default_config(&adapter, initial_size.width.max(1), initial_size.height.max(1))
            .ok_or(RendererInitError::UnsupportedSurface)?;

        surface.configure(&device, &surface_config);
        debug!(
            "Surface configured: {}x{} {:?}",
            surface_config.width, surface_config.height, surface_config.format
        );

        let layouts = DrawLayouts::new(&device);
        let mesh_pipelines =
            MeshPipelines::new(&device, &layouts, surface_config.format, DEPTH_FORMAT);
        let sky_pipeline = SkyPipeline::new(&device, &layouts, surface_config.format, DEPTH_FORMAT);
        let surface_pipeline = PortalSurfacePipeline::new(
            &device,
            &queue,
            &layouts,
            surface_config.format,
            DEPTH_FORMAT,
        );
        let uniforms = UniformArena::new(&device, &layouts.uniform);
        let targets = PortalTargets::new(&device, surface_config.format, &layouts.texture);
        let backend = WgpuBackend::new(&device, targets);
        let registry = ResourceRegistry::new(&device, &queue, &layouts.texture, anisotropy);
        let depth_texture = DepthTexture::new(&device, surface_config.width, surface_config.height);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            layouts,
            mesh_pipelines,
            sky_pipeline,
            surface_pipeline,
            uniforms,
            backend,
            registry,
        })
    }

    pub fn size(&self) -> Extent {
        Extent::new(self.surface_config.width, self.surface_config.height)
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    pub fn anisotropy(&self) -> u16 {
        self.registry.anisotropy()
    }

    pub fn set_anisotropy(&mut self, level: u16) -> u16 {
        self.registry.set_anisotropy(level)
    }

    /// Reconfigures the swapchain and depth buffer, then resizes the portal targets.
    pub fn resize(&mut self, driver: &mut FrameDriver, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture = DepthTexture::new(&self.device, width, height);
        if let Err(err) = driver.resize(&mut self.backend, width, height) {
            warn!("{err}");
        }
    }

    /// Installs a new target pool and allocates it for the current surface.
    pub fn replace_pool(
        &mut self,
        driver: &mut FrameDriver,
        pool: RenderTargetPool,
    ) -> Result<(), ResizeError<TargetError>> {
        driver.replace_pool(&mut self.backend, pool)?;
        if driver.renderer().screen().is_none() {
            let Extent { width, height } = self.size();
            driver.resize(&mut self.backend, width, height)?;
        }
        Ok(())
    }

    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &mut CameraPose,
        driver: &mut FrameDriver,
        dt: f32,
    ) -> Result<FrameReport, wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.backend.begin_frame(self.size());
        let report = driver.render_frame(scene, camera, dt, &mut self.backend);

        let downgraded = self.backend.recorder_mut().downgraded_surfaces();
        if downgraded > 0 {
            trace!("{downgraded} surfaces sampled their own pass and were drawn blank");
        }
        let (passes, uniforms) = self.backend.recorder_mut().finish();
        self.uniforms
            .upload(&self.device, &self.queue, &self.layouts.uniform, uniforms);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Riftview Command Encoder"),
            });
        for pass in &passes {
            self.encode_pass(&mut encoder, pass, &view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(report)
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &RecordedPass,
        screen_view: &wgpu::TextureView,
    ) {
        let (color_view, depth_view, label) = match pass.target {
            None => (screen_view, &self.depth_texture.view, "Riftview Screen Pass"),
            Some(index) => {
                let Some(target) = self.backend.targets().get(index) else {
                    warn!("Skipping pass into missing portal target {index}");
                    return;
                };
                (&target.color_view, &target.depth_view, "Portal RTT Pass")
            }
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_viewport(
            0.0,
            0.0,
            pass.viewport.width as f32,
            pass.viewport.height as f32,
            0.0,
            1.0,
        );

        for draw in &pass.draws {
            match *draw {
                DrawCommand::Mesh {
                    mesh,
                    material,
                    shading,
                    uniform,
                } => {
                    let Some(gpu_mesh) = self.registry.mesh(mesh) else {
                        trace!("Mesh {mesh:?} is not registered");
                        continue;
                    };
                    let material = self
                        .registry
                        .material_bind_group(material)
                        .unwrap_or_else(|| self.surface_pipeline.blank_bind_group());
                    let pipeline = match shading {
                        Shading::Lit => self.mesh_pipelines.lit(),
                        Shading::Unlit => self.mesh_pipelines.unlit(),
                    };
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(
                        0,
                        self.uniforms.bind_group(),
                        &[UniformArena::offset(uniform)],
                    );
                    render_pass.set_bind_group(1, material, &[]);
                    render_pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(
                        gpu_mesh.index_buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    render_pass.draw_indexed(0..gpu_mesh.index_count, 0, 0..1);
                }
                DrawCommand::Sky { uniform } => {
                    render_pass.set_pipeline(self.sky_pipeline.pipeline());
                    render_pass.set_bind_group(
                        0,
                        self.uniforms.bind_group(),
                        &[UniformArena::offset(uniform)],
                    );
                    render_pass.draw(0..3, 0..1);
                }
                DrawCommand::Surface { target, uniform } => {
                    let texture = target
                        .and_then(|index| self.backend.targets().get(index))
                        .map(|target| &target.sample_bind_group)
                        .unwrap_or_else(|| self.surface_pipeline.blank_bind_group());
                    render_pass.set_pipeline(self.surface_pipeline.pipeline());
                    render_pass.set_bind_group(
                        0,
                        self.uniforms.bind_group(),
                        &[UniformArena::offset(uniform)],
                    );
                    render_pass.set_bind_group(1, texture, &[]);
                    self.surface_pipeline.draw(&mut render_pass);
                }
            }
        }
    }
}
