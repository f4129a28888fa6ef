use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (2 * mem::size_of::<[f32; 3]>()) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Appends one quad. Corners run counter-clockwise when seen from `normal`.
    fn push_face(&mut self, center: Vec3, right: Vec3, up: Vec3, normal: Vec3, uv_scale: Vec2) {
        let base = self.vertices.len() as u32;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (x, y) in corners {
            let position = center + right * x + up * y;
            self.vertices.push(MeshVertex {
                position: position.to_array(),
                normal: normal.to_array(),
                uv: [
                    (x + 1.0) * 0.5 * uv_scale.x,
                    (1.0 - y) * 0.5 * uv_scale.y,
                ],
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Flat rectangle in the XZ plane facing +Y, `uv_repeat` texture tiles across.
pub fn plane(half_x: f32, half_z: f32, uv_repeat: f32) -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_face(
        Vec3::ZERO,
        Vec3::X * half_x,
        Vec3::NEG_Z * half_z,
        Vec3::Y,
        Vec2::splat(uv_repeat),
    );
    mesh
}

/// Axis-aligned box centered at the origin.
///
/// With `inward` the faces and normals point into the box, for rooms seen from inside.
pub fn cuboid(half: Vec3, inward: bool) -> MeshData {
    let mut mesh = MeshData::default();
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    for (normal, right, up) in faces {
        let center = normal * half;
        let right_extent = right * half;
        let up_extent = up * half;
        let uv_scale = Vec2::new(right_extent.length(), up_extent.length()).max(Vec2::ONE);
        if inward {
            mesh.push_face(center, -right_extent, up_extent, -normal, uv_scale);
        } else {
            mesh.push_face(center, right_extent, up_extent, normal, uv_scale);
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{cuboid, plane, MeshData};

    fn triangle_normal(mesh: &MeshData, triangle: usize) -> Vec3 {
        let corner = |i: usize| Vec3::from(mesh.vertices[mesh.indices[triangle * 3 + i] as usize].position);
        let (a, b, c) = (corner(0), corner(1), corner(2));
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn plane_faces_up() {
        let mesh = plane(2.0, 3.0, 4.0);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!((triangle_normal(&mesh, 0) - Vec3::Y).length() < 1.0e-5);
        let max = mesh
            .vertices
            .iter()
            .map(|v| Vec3::from(v.position))
            .fold(Vec3::ZERO, |acc, p| acc.max(p.abs()));
        assert!((max - Vec3::new(2.0, 0.0, 3.0)).length() < 1.0e-5);
    }

    #[test]
    fn cuboid_winding_matches_vertex_normals() {
        for inward in [false, true] {
            let mesh = cuboid(Vec3::new(1.0, 2.0, 3.0), inward);
            assert_eq!(mesh.vertices.len(), 24);
            assert_eq!(mesh.indices.len(), 36);
            for triangle in 0..12 {
                let geometric = triangle_normal(&mesh, triangle);
                let stored = Vec3::from(mesh.vertices[mesh.indices[triangle * 3] as usize].normal);
                assert!((geometric - stored).length() < 1.0e-5, "inward {inward}, triangle {triangle}");
            }
        }
    }

    #[test]
    fn inward_normals_point_at_the_center() {
        let mesh = cuboid(Vec3::splat(2.0), true);
        for vertex in &mesh.vertices {
            let position = Vec3::from(vertex.position);
            let normal = Vec3::from(vertex.normal);
            assert!(normal.dot(-position) > 0.0);
        }
    }
}
