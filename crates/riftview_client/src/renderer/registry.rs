//! GPU resources shared by every shape: meshes, textures and the material
//! bind groups that pair them with the anisotropic sampler.
//!
//! One registry lives next to the device. Scene construction receives it
//! explicitly and gets back small copyable handles.

use riftview_core::draw::{MaterialHandle, MeshHandle};
use riftview_core::settings::{MAX_ANISOTROPY, MIN_ANISOTROPY};
use rustc_hash::FxHashMap;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::renderer::mesh::MeshData;

const CHECKER_SIZE: u32 = 256;

#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Debug)]
struct Material {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

pub struct ResourceRegistry {
    device: wgpu::Device,
    queue: wgpu::Queue,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    anisotropy: u16,
    meshes: FxHashMap<MeshHandle, GpuMesh>,
    materials: FxHashMap<MaterialHandle, Material>,
    next_mesh: u32,
    next_material: u32,
}

impl ResourceRegistry {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture_layout: &wgpu::BindGroupLayout,
        anisotropy: u16,
    ) -> Self {
        let anisotropy = anisotropy.clamp(MIN_ANISOTROPY, MAX_ANISOTROPY);
        Self {
            device: device.clone(),
            queue: queue.clone(),
            texture_layout: texture_layout.clone(),
            sampler: create_material_sampler(device, anisotropy),
            anisotropy,
            meshes: FxHashMap::default(),
            materials: FxHashMap::default(),
            next_mesh: 0,
            next_material: 0,
        }
    }

    pub fn add_mesh(&mut self, label: &str, data: &MeshData) -> MeshHandle {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let handle = MeshHandle(self.next_mesh);
        self.next_mesh += 1;
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: data.indices.len() as u32,
            },
        );
        handle
    }

    /// Two-tone checkerboard with a full mip chain.
    pub fn add_checker_material(
        &mut self,
        label: &str,
        light: [u8; 4],
        dark: [u8; 4],
        cells: u32,
    ) -> MaterialHandle {
        let levels = checker_mip_chain(CHECKER_SIZE, cells, light, dark);
        self.add_material(label, CHECKER_SIZE, &levels)
    }

    pub fn add_solid_material(&mut self, label: &str, color: [u8; 4]) -> MaterialHandle {
        self.add_material(label, 1, &[color.to_vec()])
    }

    fn add_material(&mut self, label: &str, size: u32, levels: &[Vec<u8>]) -> MaterialHandle {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, pixels) in levels.iter().enumerate() {
            let extent = (size >> level).max(1);
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(extent * 4),
                    rows_per_image: Some(extent),
                },
                wgpu::Extent3d {
                    width: extent,
                    height: extent,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = create_texture_bind_group(
            &self.device,
            &self.texture_layout,
            &view,
            &self.sampler,
            label,
        );

        let handle = MaterialHandle(self.next_material);
        self.next_material += 1;
        self.materials.insert(
            handle,
            Material {
                _texture: texture,
                view,
                bind_group,
            },
        );
        handle
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    pub fn material_bind_group(&self, handle: MaterialHandle) -> Option<&wgpu::BindGroup> {
        self.materials.get(&handle).map(|material| &material.bind_group)
    }

    pub fn anisotropy(&self) -> u16 {
        self.anisotropy
    }

    /// Rebuilds the sampler and every material bind group that uses it.
    pub fn set_anisotropy(&mut self, level: u16) -> u16 {
        let level = level.clamp(MIN_ANISOTROPY, MAX_ANISOTROPY);
        if level == self.anisotropy {
            return level;
        }

        self.sampler = create_material_sampler(&self.device, level);
        for material in self.materials.values_mut() {
            material.bind_group = create_texture_bind_group(
                &self.device,
                &self.texture_layout,
                &material.view,
                &self.sampler,
                "Material Bind Group",
            );
        }
        self.anisotropy = level;
        debug!("Texture anisotropy set to {level}x");
        level
    }
}

fn create_material_sampler(device: &wgpu::Device, anisotropy: u16) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Material Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        anisotropy_clamp: anisotropy,
        ..Default::default()
    })
}

pub(crate) fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// RGBA8 levels from `size`x`size` down to 1x1; each level box-filters the previous one.
fn checker_mip_chain(size: u32, cells: u32, light: [u8; 4], dark: [u8; 4]) -> Vec<Vec<u8>> {
    let cell = (size / cells.max(1)).max(1);
    let mut base = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if ((x / cell) + (y / cell)) % 2 == 0 {
                light
            } else {
                dark
            };
            base.extend_from_slice(&texel);
        }
    }

    let mut levels = vec![base];
    let mut extent = size;
    while extent > 1 {
        let next = extent / 2;
        let Some(previous) = levels.last() else {
            break;
        };
        let mut level = Vec::with_capacity((next * next * 4) as usize);
        for y in 0..next {
            for x in 0..next {
                for channel in 0..4 {
                    let sample = |sx: u32, sy: u32| {
                        previous[((sy * extent + sx) * 4 + channel) as usize] as u32
                    };
                    let sum = sample(2 * x, 2 * y)
                        + sample(2 * x + 1, 2 * y)
                        + sample(2 * x, 2 * y + 1)
                        + sample(2 * x + 1, 2 * y + 1);
                    level.push(((sum + 2) / 4) as u8);
                }
            }
        }
        levels.push(level);
        extent = next;
    }
    levels
}
