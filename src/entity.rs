use std::path::PathBuf;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};

use crate::texture::TextureSource;

/// Which pipeline draws an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Displaced, normal-mapped, lit heightfield.
    Surface,
    /// Unlit mesh in its vertex colors.
    Flat,
}

/// Where an entity's geometry comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSource {
    Plane { resolution: u32 },
    Cube,
    Obj(PathBuf),
}

/// Textures bound at group 2 for surface entities.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSource {
    pub diffuse: TextureSource,
    pub normal: TextureSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Builds a transform from Euler angles in degrees, applied X, then Y, then Z.
    pub fn from_euler_degrees(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        let rotation = Quat::from_rotation_z(rotation.z.to_radians())
            * Quat::from_rotation_y(rotation.y.to_radians())
            * Quat::from_rotation_x(rotation.x.to_radians());
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse-transpose of the model's upper 3x3, with an identity last row
    /// and column.
    pub fn normal_matrix(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.model_matrix()).inverse().transpose())
    }

    pub fn instance_data(&self) -> InstanceData {
        InstanceData {
            model: self.model_matrix().to_cols_array_2d(),
            normal: self.normal_matrix().to_cols_array_2d(),
        }
    }
}

/// A drawable object: geometry, transform, and the pass that shades it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub pass: PassKind,
    pub mesh: MeshSource,
    pub transform: Transform,
    pub color: glam::Vec4,
    pub material: Option<MaterialSource>,
    /// Tracks the light's position every frame (light markers).
    pub follows_light: bool,
}

/// Per-instance vertex stream (locations 4..=11).
///
/// Each matrix travels as four `vec4` attributes holding its columns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

impl InstanceData {
    const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
        11 => Float32x4,
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &Self::ATTRIBUTES,
    };

    pub fn model(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    pub fn normal_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn instance_layout_covers_locations_four_to_eleven() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 128);
        let locations: Vec<_> = InstanceData::LAYOUT
            .attributes
            .iter()
            .map(|a| a.shader_location)
            .collect();
        assert_eq!(locations, (4..=11).collect::<Vec<_>>());
        assert_eq!(InstanceData::LAYOUT.step_mode, wgpu::VertexStepMode::Instance);
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_non_uniform_scale() {
        let transform = Transform {
            position: Vec3::new(3.0, -1.0, 2.0),
            rotation: Quat::from_rotation_y(0.7),
            scale: Vec3::new(4.0, 1.0, 0.25),
        };
        let model = transform.model_matrix();
        let normal_matrix = transform.normal_matrix();

        // Tangent lying in a slanted surface and that surface's normal.
        let tangent = Vec3::new(1.0, 1.0, 0.0).normalize();
        let normal = Vec3::new(1.0, -1.0, 0.0).normalize();
        let world_tangent = model.transform_vector3(tangent);
        let world_normal = normal_matrix.transform_vector3(normal);
        assert!(world_tangent.dot(world_normal).abs() < 1e-4);

        // The plain model matrix gets this wrong.
        let naive = model.transform_vector3(normal);
        assert!(world_tangent.dot(naive).abs() > 1e-2);
    }

    #[test]
    fn normal_matrix_has_no_translation() {
        let transform = Transform {
            position: Vec3::new(10.0, 20.0, 30.0),
            ..Transform::default()
        };
        let normal_matrix = transform.normal_matrix();
        assert_eq!(normal_matrix.w_axis, Vec4::W);
        assert_eq!(normal_matrix.row(3), Vec4::W);
    }

    #[test]
    fn euler_degrees_rotate_plane_to_face_up() {
        let transform =
            Transform::from_euler_degrees(Vec3::ZERO, Vec3::new(-90.0, 0.0, 0.0), Vec3::ONE);
        let up = transform.normal_matrix().transform_vector3(Vec3::Z);
        assert!((up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn scale_applies_along_local_axes_before_rotation() {
        let transform = Transform::from_euler_degrees(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 90.0),
            Vec3::new(2.0, 1.0, 1.0),
        );
        // Local +x is stretched to length 2, then turned onto world +y.
        let p = transform.model_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn instance_data_round_trips_matrices() {
        let transform =
            Transform::from_euler_degrees(Vec3::X, Vec3::new(10.0, 20.0, 30.0), Vec3::splat(2.0));
        let data = transform.instance_data();
        assert_eq!(data.model(), transform.model_matrix());
        assert_eq!(data.normal_matrix(), transform.normal_matrix());
    }
}
