use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use wgpu::util::DeviceExt;

/// Largest grid [`Mesh::plane`] builds. At this size both the vertex and the
/// index buffer stay under wgpu's default `max_buffer_size`.
pub const MAX_PLANE_RESOLUTION: u32 = 2048;

/// Per-vertex attributes shared by both passes (locations 0..=3).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub normal: [f32; 4],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x4,
        1 => Float32x4,
        2 => Float32x4,
        3 => Float32x2,
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };

    pub fn new(position: Vec3, normal: Vec3, tex_coords: [f32; 2]) -> Self {
        Self {
            position: position.extend(1.0).into(),
            color: [1.0; 4],
            normal: normal.extend(1.0).into(),
            tex_coords,
        }
    }
}

/// CPU-side triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit grid over `[0, 1]²` in the XY plane, facing +Z.
    ///
    /// The surface pass treats `position.xy` as the `(u, v)` parameters of
    /// the height field, so the grid is emitted flat and displaced on the GPU.
    /// `resolution` is clamped to `1..=MAX_PLANE_RESOLUTION`.
    pub fn plane(resolution: u32) -> Self {
        let resolution = resolution.clamp(1, MAX_PLANE_RESOLUTION);
        let step = 1.0 / resolution as f32;
        let stride = resolution + 1;

        let vertices = (0..stride)
            .flat_map(|row| {
                (0..stride).map(move |col| {
                    let u = col as f32 * step;
                    let v = row as f32 * step;
                    Vertex::new(Vec3::new(u, v, 0.0), Vec3::Z, [u, v])
                })
            })
            .collect();

        let indices = (0..resolution)
            .flat_map(|row| {
                (0..resolution).flat_map(move |col| {
                    let i0 = row * stride + col;
                    let i1 = i0 + 1;
                    let i2 = i0 + stride;
                    let i3 = i2 + 1;
                    [i0, i1, i3, i0, i3, i2]
                })
            })
            .collect();

        Self { vertices, indices }
    }

    /// Cube with half-extent 1, four vertices per face so normals stay sharp.
    pub fn cube() -> Self {
        // (normal, u axis, v axis) with u x v == normal, giving CCW faces from outside.
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];
        const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut mesh = Mesh::default();
        for (normal, u_axis, v_axis) in FACES {
            let base = mesh.vertices.len() as u32;
            for (du, dv) in CORNERS {
                let position = normal + u_axis * du + v_axis * dv;
                let tex_coords = [(du + 1.0) * 0.5, (dv + 1.0) * 0.5];
                mesh.vertices.push(Vertex::new(position, normal, tex_coords));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Replaces every vertex color.
    pub fn with_color(mut self, color: Vec4) -> Self {
        let color: [f32; 4] = color.into();
        for vertex in &mut self.vertices {
            vertex.color = color;
        }
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// GPU copies of a [`Mesh`].
pub struct MeshBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}
