use std::fmt;

use riftview_core::pool::Extent;
use tracing::info;

use crate::renderer::registry::create_texture_bind_group;
use crate::renderer::DEPTH_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    Empty,
    TooLarge { extent: Extent, max: u32 },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "portal target pool is empty"),
            Self::TooLarge { extent, max } => {
                write!(f, "portal target {extent} exceeds the device limit of {max}")
            }
        }
    }
}

impl std::error::Error for TargetError {}

pub struct PortalTarget {
    _color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub sample_bind_group: wgpu::BindGroup,
}

/// Offscreen color+depth pairs indexed by the pool's round-robin cursor.
pub struct PortalTargets {
    color_format: wgpu::TextureFormat,
    sample_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    targets: Vec<PortalTarget>,
    extent: Option<Extent>,
}

impl PortalTargets {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal RTT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            color_format,
            sample_layout: sample_layout.clone(),
            sampler,
            targets: Vec::new(),
            extent: None,
        }
    }

    pub fn allocate(
        &mut self,
        device: &wgpu::Device,
        count: usize,
        extent: Extent,
    ) -> Result<(), TargetError> {
        if count == 0 {
            return Err(TargetError::Empty);
        }
        let max = device.limits().max_texture_dimension_2d;
        if extent.width > max || extent.height > max {
            return Err(TargetError::TooLarge { extent, max });
        }
        if self.extent == Some(extent) && self.targets.len() == count {
            return Ok(());
        }

        self.targets = (0..count)
            .map(|index| self.create_target(device, index, extent))
            .collect();
        self.extent = Some(extent);
        info!("Allocated {count} portal render targets at {extent}");
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&PortalTarget> {
        self.targets.get(index)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    fn create_target(&self, device: &wgpu::Device, index: usize, extent: Extent) -> PortalTarget {
        let size = wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        };

        let color_label = format!("Portal RTT Color Texture {index}");
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&color_label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_label = format!("Portal RTT Depth Texture {index}");
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&depth_label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group_label = format!("Portal RTT Sample Bind Group {index}");
        let sample_bind_group = create_texture_bind_group(
            device,
            &self.sample_layout,
            &color_view,
            &self.sampler,
            &bind_group_label,
        );

        PortalTarget {
            _color_texture: color_texture,
            color_view,
            _depth_texture: depth_texture,
            depth_view,
            sample_bind_group,
        }
    }
}
