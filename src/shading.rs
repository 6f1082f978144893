//! CPU model of the two render passes.
//!
//! Each function mirrors one WGSL entry point in `render/shaders` line for
//! line, over the same `Pod` structs the renderer uploads. The GPU remains
//! the source of truth for pixels; this module exists so the numeric
//! behavior can be checked and probed without a device.
//!
//! Zero-length direction vectors normalize to zero here. On the GPU the
//! result is implementation-defined.

use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::CameraUniform;
use crate::entity::InstanceData;
use crate::light::PointLightUniform;
use crate::mesh::Vertex;

/// Parameter offset used for the finite-difference tangent frame.
pub const EPSILON: f32 = 0.001;
/// Largest displacement `plane_func` can produce.
pub const MAX_HEIGHT: f32 = 0.06;
pub const AMBIENT_STRENGTH: f32 = 0.1;
pub const SPECULAR_STRENGTH: f32 = 0.5;
pub const SHININESS: f32 = 32.0;
pub const MIN_LIGHT_DISTANCE: f32 = 0.01;

/// Height field over parameter space; `(u, v)` pass through as x and y.
pub fn plane_func(u: f32, v: f32) -> Vec3 {
    let z = (u * 10.0 * PI).sin() * 0.01 + (v * 5.0 * PI).sin() * 0.05;
    Vec3::new(u, v, z)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    pub position: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

pub fn tangent_frame(u: f32, v: f32) -> TangentFrame {
    let position = plane_func(u, v);
    let n1 = plane_func(u + EPSILON, v);
    let n2 = plane_func(u, v + EPSILON);
    let tangent = (n1 - position).normalize_or_zero();
    let bitangent = (n2 - position).normalize_or_zero();
    let normal = tangent.cross(bitangent).normalize_or_zero();
    TangentFrame {
        position,
        tangent,
        bitangent,
        normal,
    }
}

/// Interpolants written by the surface vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceVarying {
    pub clip_position: Vec4,
    pub world_position: Vec4,
    pub color: Vec4,
    pub normal: Vec3,
    pub tex_coords: Vec2,
    pub normal_matrix: Mat4,
}

/// What the two material samplers returned for one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSample {
    pub diffuse: Vec4,
    pub normal: Vec4,
}

impl MaterialSample {
    /// White diffuse and an undisturbed normal map.
    pub const NEUTRAL: Self = Self {
        diffuse: Vec4::ONE,
        normal: Vec4::new(0.5, 0.5, 1.0, 1.0),
    };
}

pub fn surface_vertex(
    camera: &CameraUniform,
    vertex: &Vertex,
    instance: &InstanceData,
) -> SurfaceVarying {
    let model = instance.model();
    let normal_matrix = instance.normal_matrix();
    let frame = tangent_frame(vertex.position[0], vertex.position[1]);

    let world_position = model * frame.position.extend(1.0);
    SurfaceVarying {
        clip_position: camera.projection() * camera.view() * world_position,
        world_position,
        color: Vec4::from(vertex.color),
        normal: (normal_matrix * frame.normal.extend(1.0)).truncate(),
        tex_coords: Vec2::from(vertex.tex_coords),
        normal_matrix,
    }
}

/// Maps a `[0, 1]` encoded normal-map texel to `[-1, 1]`.
pub fn decode_normal_sample(sample: Vec3) -> Vec3 {
    sample * 2.0 - 1.0
}

/// Inverse-square falloff, held constant inside [`MIN_LIGHT_DISTANCE`].
pub fn attenuation(dist: f32) -> f32 {
    1.0 / dist.max(MIN_LIGHT_DISTANCE).powi(2)
}

/// Per-term contributions before modulation by the diffuse texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightTerms {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightTerms {
    pub fn total(&self) -> Vec3 {
        self.ambient + self.diffuse + self.specular
    }
}

pub fn light_terms(
    normal: Vec3,
    world_position: Vec3,
    camera_position: Vec3,
    light_position: Vec3,
    light_color: Vec3,
) -> LightTerms {
    let to_light = light_position - world_position;
    let light_dir = to_light.normalize_or_zero();
    let view_dir = (camera_position - world_position).normalize_or_zero();
    let reflect_dir = reflect(-light_dir, normal);

    let attenuation = attenuation(to_light.length());
    LightTerms {
        ambient: light_color * AMBIENT_STRENGTH,
        diffuse: normal.dot(light_dir).max(0.0) * attenuation * light_color,
        specular: view_dir.dot(reflect_dir).max(0.0).powf(SHININESS)
            * SPECULAR_STRENGTH
            * light_color,
    }
}

/// Surface fragment stage: normal-mapped ambient + diffuse + specular.
pub fn surface_fragment(
    camera: &CameraUniform,
    light: &PointLightUniform,
    input: &SurfaceVarying,
    sample: MaterialSample,
) -> Vec4 {
    let transformed = (input.normal_matrix * sample.normal.truncate().extend(1.0)).truncate();
    let normal = decode_normal_sample(transformed).normalize_or_zero();

    let terms = light_terms(
        normal,
        input.world_position.truncate(),
        Vec4::from(camera.position).truncate(),
        Vec4::from(light.position).truncate(),
        Vec4::from(light.diffuse_color).truncate(),
    );
    (terms.total() * sample.diffuse.truncate()).extend(1.0)
}

/// Interpolants written by the flat vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatVarying {
    pub clip_position: Vec4,
    pub color: Vec4,
    pub normal: Vec3,
}

pub fn flat_vertex(camera: &CameraUniform, vertex: &Vertex, instance: &InstanceData) -> FlatVarying {
    FlatVarying {
        clip_position: camera.projection()
            * camera.view()
            * instance.model()
            * Vec4::from(vertex.position),
        color: Vec4::from(vertex.color),
        normal: (instance.normal_matrix() * Vec4::from(vertex.normal)).truncate(),
    }
}

/// Flat fragment stage. The normal is normalized and dropped, as on the GPU.
pub fn flat_fragment(input: &FlatVarying) -> Vec4 {
    let _normal = input.normal.normalize_or_zero();
    input.color
}

/// WGSL `reflect`: `i - 2 * dot(n, i) * n`.
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::entity::Transform;
    use crate::light::PointLight;
    use crate::mesh::Mesh;

    fn grid(steps: u32) -> impl Iterator<Item = (f32, f32)> {
        (0..=steps).flat_map(move |i| {
            (0..=steps).map(move |j| (i as f32 / steps as f32, j as f32 / steps as f32))
        })
    }

    fn assert_unit(v: Vec3) {
        assert!((v.length() - 1.0).abs() < 1e-4, "{v} is not unit length");
    }

    #[test]
    fn height_is_bounded_on_unit_square() {
        for (u, v) in grid(200) {
            let z = plane_func(u, v).z;
            assert!(z.abs() <= MAX_HEIGHT + 1e-6, "z({u}, {v}) = {z}");
        }
        // Both sines peak together at u = 0.05, v = 0.1.
        assert!((plane_func(0.05, 0.1).z - MAX_HEIGHT).abs() < 1e-5);
    }

    #[test]
    fn plane_func_passes_parameters_through() {
        let p = plane_func(0.25, 0.75);
        assert_eq!((p.x, p.y), (0.25, 0.75));
    }

    #[test]
    fn tangent_frame_is_unit_length() {
        for (u, v) in grid(40) {
            let frame = tangent_frame(u, v);
            assert_unit(frame.tangent);
            assert_unit(frame.bitangent);
            assert_unit(frame.normal);
            assert!(frame.normal.z > 0.0);
        }
    }

    #[test]
    fn attenuation_is_clamped_then_decreasing() {
        let clamped = attenuation(MIN_LIGHT_DISTANCE);
        assert_eq!(attenuation(0.0), clamped);
        assert_eq!(attenuation(0.005), clamped);
        assert!((clamped - 10_000.0).abs() < 1e-1);

        let mut previous = clamped;
        for step in 1..500 {
            let dist = MIN_LIGHT_DISTANCE + step as f32 * 0.05;
            let value = attenuation(dist);
            assert!(value < previous, "attenuation grew at {dist}");
            previous = value;
        }
    }

    #[test]
    fn diffuse_and_specular_are_never_negative() {
        let directions = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::new(1.0, -2.0, 0.5).normalize(),
            Vec3::ZERO,
        ];
        for normal in directions {
            for light in directions {
                for eye in directions {
                    let terms = light_terms(normal, Vec3::ZERO, eye * 3.0, light * 2.0, Vec3::ONE);
                    assert!(terms.diffuse.min_element() >= 0.0);
                    assert!(terms.specular.min_element() >= 0.0);
                }
            }
        }
    }

    #[test]
    fn flat_normal_sample_decodes_to_positive_z() {
        let decoded = decode_normal_sample(Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(decoded, Vec3::Z);
    }

    #[test]
    fn flat_fragment_is_identity_on_color() {
        let colors = [
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.2, 0.4, 0.6, 0.3),
            Vec4::ZERO,
        ];
        for color in colors {
            let varying = FlatVarying {
                clip_position: Vec4::W,
                color,
                normal: Vec3::new(0.0, 3.0, 4.0),
            };
            assert_eq!(flat_fragment(&varying), color);
        }
    }

    #[test]
    fn flat_vertex_passes_color_and_transforms_position() {
        let camera = Camera::default().uniform(1.0);
        let transform = Transform {
            position: Vec3::new(0.0, 0.0, -5.0),
            ..Transform::default()
        };
        let instance = transform.instance_data();
        let mut vertex = Mesh::cube().vertices[0];
        vertex.color = [0.1, 0.2, 0.3, 0.4];

        let out = flat_vertex(&camera, &vertex, &instance);
        assert_eq!(out.color, Vec4::new(0.1, 0.2, 0.3, 0.4));
        let expected = camera.projection()
            * camera.view()
            * transform.model_matrix()
            * Vec4::from(vertex.position);
        assert!((out.clip_position - expected).length() < 1e-5);
        // Front face normal (0, 0, 1, 1) under an identity normal matrix.
        assert_eq!(out.normal, Vec3::Z);
    }

    #[test]
    fn surface_vertex_displaces_and_keeps_attributes() {
        let camera = Camera::default().uniform(1.0);
        let instance = Transform::default().instance_data();
        let vertex = Vertex::new(Vec3::new(0.05, 0.1, 0.7), Vec3::Z, [0.05, 0.1]);

        let out = surface_vertex(&camera, &vertex, &instance);
        // position.z is ignored; z comes from the height field.
        assert!((out.world_position.z - MAX_HEIGHT).abs() < 1e-5);
        assert_eq!(out.world_position.w, 1.0);
        assert_eq!(out.tex_coords, Vec2::new(0.05, 0.1));
        assert_eq!(out.color, Vec4::ONE);
        assert_eq!(out.normal_matrix, Mat4::IDENTITY);
        assert!(out.normal.z > 0.99);
    }

    #[test]
    fn lit_quad_center_is_brighter_than_ambient() {
        // Camera at the origin looking down -Z, white light at (0, 0, 5),
        // flat quad at z = 0 facing +Z.
        let camera = Camera::default().uniform(1.0);
        let light = PointLight {
            position: Vec3::new(0.0, 0.0, 5.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
        .uniform();
        let quad_center = SurfaceVarying {
            clip_position: Vec4::W,
            world_position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            color: Vec4::ONE,
            normal: Vec3::Z,
            tex_coords: Vec2::splat(0.5),
            normal_matrix: Mat4::IDENTITY,
        };

        let color = surface_fragment(&camera, &light, &quad_center, MaterialSample::NEUTRAL);
        let ambient = AMBIENT_STRENGTH;
        assert!(color.x > ambient && color.y > ambient && color.z > ambient);
        assert_eq!(color.w, 1.0);
        // ambient 0.1 + diffuse 1/25
        assert!((color.x - 0.14).abs() < 1e-4);
    }

    #[test]
    fn fragment_alpha_is_forced_opaque() {
        let camera = Camera::default().uniform(1.0);
        let light = PointLight::default().uniform();
        let varying = surface_vertex(
            &camera,
            &Vertex::new(Vec3::new(0.3, 0.6, 0.0), Vec3::Z, [0.3, 0.6]),
            &Transform::default().instance_data(),
        );
        let sample = MaterialSample {
            diffuse: Vec4::new(0.8, 0.7, 0.5, 0.2),
            normal: Vec4::new(0.5, 0.5, 1.0, 1.0),
        };
        let color = surface_fragment(&camera, &light, &varying, sample);
        assert_eq!(color.w, 1.0);
        assert!(color.truncate().is_finite());
    }

    #[test]
    fn specular_peaks_along_mirror_direction() {
        let light = Vec3::new(-1.0, 0.0, 1.0);
        let mirror = Vec3::new(1.0, 0.0, 1.0);
        let off_axis = Vec3::new(0.0, 1.0, 0.2);
        let at_mirror = light_terms(Vec3::Z, Vec3::ZERO, mirror, light, Vec3::ONE);
        let elsewhere = light_terms(Vec3::Z, Vec3::ZERO, off_axis, light, Vec3::ONE);
        assert!((at_mirror.specular.x - SPECULAR_STRENGTH).abs() < 1e-4);
        assert!(elsewhere.specular.x < at_mirror.specular.x);
    }
}
