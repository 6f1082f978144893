use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Single point light feeding the surface pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl PointLight {
    pub fn uniform(&self) -> PointLightUniform {
        PointLightUniform {
            position: self.position.extend(1.0).into(),
            diffuse_color: (self.color * self.intensity).extend(1.0).into(),
        }
    }
}

/// Circular path in the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightOrbit {
    pub center: Vec3,
    pub radius: f32,
    pub degrees_per_second: f32,
}

impl LightOrbit {
    pub fn position_at(&self, seconds: f32) -> Vec3 {
        let (s, c) = (self.degrees_per_second * seconds).to_radians().sin_cos();
        self.center + Vec3::new(s * self.radius, 0.0, c * self.radius)
    }
}

/// Group 1, binding 0 of the surface pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightUniform {
    pub position: [f32; 4],
    pub diffuse_color: [f32; 4],
}
