use std::time::Duration;

use glam::{Vec2, Vec3, Vec4};
use log::debug;

use crate::camera::{Camera, CameraController, CameraUniform};
use crate::entity::{Entity, InstanceData, MaterialSource, MeshSource, PassKind, Transform};
use crate::light::{LightOrbit, PointLight, PointLightUniform};
use crate::mesh::Vertex;
use crate::scene::{ObjectType, Scene, SceneObject};
use crate::shading::{self, MaterialSample};
use crate::texture::{TextureSource, FLAT_NORMAL};

/// Everything that changes from frame to frame, independent of the GPU.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub camera: Camera,
    pub controller: CameraController,
    pub light: PointLight,
    pub orbit: Option<LightOrbit>,
    pub entities: Vec<Entity>,
    elapsed: Duration,
}

impl SceneState {
    pub fn from_scene(scene: &Scene) -> Self {
        let camera = camera_from_scene(scene);
        let (light, orbit, marker) = light_from_scene(scene);

        let mut entities: Vec<Entity> = scene
            .objects
            .iter()
            .filter_map(|object| entity_from_object(scene, object))
            .collect();
        if let Some((name, scale)) = marker {
            entities.push(Entity {
                name,
                pass: PassKind::Flat,
                mesh: MeshSource::Cube,
                transform: Transform {
                    position: light.position,
                    scale: Vec3::splat(scale),
                    ..Transform::default()
                },
                color: light.color.extend(1.0),
                material: None,
                follows_light: true,
            });
        }

        let mut state = Self {
            camera,
            controller: CameraController::default(),
            light,
            orbit,
            entities,
            elapsed: Duration::ZERO,
        };
        state.sync_light();
        state
    }

    /// Advances animation and camera movement by `dt`.
    pub fn update(&mut self, dt: Duration) {
        self.elapsed += dt;
        self.sync_light();
        self.controller.update_camera(&mut self.camera, dt);
    }

    fn sync_light(&mut self) {
        if let Some(orbit) = self.orbit {
            self.light.position = orbit.position_at(self.elapsed.as_secs_f32());
        }
        let position = self.light.position;
        for entity in self.entities.iter_mut().filter(|e| e.follows_light) {
            entity.transform.position = position;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn camera_uniform(&self, aspect: f32) -> CameraUniform {
        self.camera.uniform(aspect)
    }

    pub fn light_uniform(&self) -> PointLightUniform {
        self.light.uniform()
    }

    /// One entry per entity, in entity order.
    pub fn instance_data(&self) -> Vec<InstanceData> {
        self.entities
            .iter()
            .map(|entity| entity.transform.instance_data())
            .collect()
    }

    /// Runs the surface pass on the CPU for one surface parameter.
    ///
    /// Solid textures return what the renderer's sampler would: the diffuse
    /// texel decoded from sRGB, the normal texel as stored. File textures are
    /// treated as white with a flat normal map. Returns `None` for flat
    /// entities.
    pub fn surface_probe(&self, entity: &Entity, uv: Vec2, aspect: f32) -> Option<Vec4> {
        if entity.pass != PassKind::Surface {
            return None;
        }
        let sample = entity
            .material
            .as_ref()
            .map(|material| MaterialSample {
                diffuse: material.diffuse.solid_linear_value().unwrap_or(Vec4::ONE),
                normal: material
                    .normal
                    .solid_value()
                    .unwrap_or(MaterialSample::NEUTRAL.normal),
            })
            .unwrap_or(MaterialSample::NEUTRAL);
        Some(self.shade_surface(entity, uv, aspect, sample))
    }

    fn shade_surface(&self, entity: &Entity, uv: Vec2, aspect: f32, sample: MaterialSample) -> Vec4 {
        let camera = self.camera_uniform(aspect);
        let light = self.light_uniform();
        let instance = entity.transform.instance_data();
        let vertex = Vertex::new(uv.extend(0.0), Vec3::Z, uv.into());

        let varying = shading::surface_vertex(&camera, &vertex, &instance);
        shading::surface_fragment(&camera, &light, &varying, sample)
    }
}

fn camera_from_scene(scene: &Scene) -> Camera {
    let Some(object) = scene.find(ObjectType::Camera) else {
        return Camera::default();
    };
    // Rotation is (pitch, yaw, roll) in degrees relative to looking down -Z.
    Camera {
        position: object.position,
        yaw: (-90.0 - object.rotation.y).to_radians(),
        pitch: object.rotation.x.to_radians(),
        fovy: object.fov.clamp(1.0, 179.0).to_radians(),
    }
}

fn light_from_scene(scene: &Scene) -> (PointLight, Option<LightOrbit>, Option<(String, f32)>) {
    let Some(object) = scene.find(ObjectType::Light) else {
        debug!("scene has no light; using the default point light");
        return (PointLight::default(), None, None);
    };
    let light = PointLight {
        position: object.position,
        color: object.color,
        intensity: object.intensity.max(0.0),
    };
    let orbit = object.orbit.map(|orbit| LightOrbit {
        center: object.position,
        radius: orbit.x,
        degrees_per_second: orbit.y,
    });
    let marker = object
        .marker
        .map(|scale| (format!("{}.marker", object.name), scale));
    (light, orbit, marker)
}

fn entity_from_object(scene: &Scene, object: &SceneObject) -> Option<Entity> {
    let pass = match object.object_type {
        ObjectType::Surface => PassKind::Surface,
        ObjectType::Flat => PassKind::Flat,
        ObjectType::Light | ObjectType::Camera => return None,
    };
    let mesh = match pass {
        PassKind::Surface => MeshSource::Plane {
            resolution: object.resolution,
        },
        PassKind::Flat => match object.mesh.as_deref() {
            None | Some("cube") => MeshSource::Cube,
            Some(path) => MeshSource::Obj(scene.resolve(path)),
        },
    };
    let material = (pass == PassKind::Surface).then(|| MaterialSource {
        diffuse: object
            .diffuse
            .as_deref()
            .map(|path| TextureSource::File(scene.resolve(path)))
            .unwrap_or_else(|| TextureSource::Solid(color_texel(object.color))),
        normal: object
            .normal
            .as_deref()
            .map(|path| TextureSource::File(scene.resolve(path)))
            .unwrap_or(TextureSource::Solid(FLAT_NORMAL)),
    });

    Some(Entity {
        name: object.name.clone(),
        pass,
        mesh,
        transform: Transform::from_euler_degrees(object.position, object.rotation, object.scale),
        color: object.color.extend(1.0),
        material,
        follows_light: false,
    })
}

fn color_texel(color: Vec3) -> [u8; 4] {
    let [r, g, b] = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round().to_array();
    [r as u8, g as u8, b as u8, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::srgb_to_linear;

    fn builtin_state() -> SceneState {
        SceneState::from_scene(&Scene::builtin())
    }

    #[test]
    fn builtin_scene_has_surface_and_light_marker() {
        let state = builtin_state();
        assert_eq!(state.entities.len(), 2);
        let surface = &state.entities[0];
        assert_eq!(surface.name, "Sand");
        assert_eq!(surface.pass, PassKind::Surface);
        assert_eq!(surface.mesh, MeshSource::Plane { resolution: 256 });
        let material = surface.material.as_ref().unwrap();
        assert_eq!(material.diffuse, TextureSource::Solid([230, 200, 150, 255]));
        assert_eq!(material.normal, TextureSource::Solid(FLAT_NORMAL));

        let marker = &state.entities[1];
        assert_eq!(marker.name, "Light.marker");
        assert_eq!(marker.pass, PassKind::Flat);
        assert!(marker.follows_light);
        assert_eq!(marker.transform.position, state.light.position);
    }

    #[test]
    fn marker_follows_orbiting_light() {
        let mut state = builtin_state();
        let start = state.light.position;
        state.update(Duration::from_millis(500));
        assert_ne!(state.light.position, start);
        assert_eq!(state.entities[1].transform.position, state.light.position);
        assert_eq!(state.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn instance_data_matches_entity_order() {
        let state = builtin_state();
        let instances = state.instance_data();
        assert_eq!(instances.len(), state.entities.len());
        assert_eq!(
            instances[1].model(),
            state.entities[1].transform.model_matrix()
        );
    }

    #[test]
    fn camera_rotation_maps_to_yaw_and_pitch() {
        let state = builtin_state();
        let front = state.camera.front();
        // Pitched 30 degrees down while facing -Z.
        assert!(front.z < 0.0);
        assert!((front.y + 0.5).abs() < 1e-5);
    }

    #[test]
    fn missing_camera_and_light_fall_back_to_defaults() {
        let scene = Scene::from_xml("<scene><object><name>Box</name></object></scene>").unwrap();
        let state = SceneState::from_scene(&scene);
        assert_eq!(state.camera, Camera::default());
        assert_eq!(state.light, PointLight::default());
        assert_eq!(state.entities.len(), 1);
        assert_eq!(state.entities[0].mesh, MeshSource::Cube);
        assert!(state.entities[0].material.is_none());
    }

    #[test]
    fn obj_meshes_resolve_against_scene_directory() {
        let mut scene = Scene::from_xml(
            "<scene><object><name>Rock</name><mesh>rock.obj</mesh></object></scene>",
        )
        .unwrap();
        scene.base_dir = Some("/assets".into());
        let state = SceneState::from_scene(&scene);
        assert_eq!(
            state.entities[0].mesh,
            MeshSource::Obj("/assets/rock.obj".into())
        );
    }

    #[test]
    fn surface_probe_decodes_srgb_diffuse() {
        let state = builtin_state();
        let sand = &state.entities[0];
        let uv = Vec2::splat(0.5);
        let normal = TextureSource::Solid(FLAT_NORMAL).solid_value().unwrap();
        let linear = Vec4::new(
            srgb_to_linear(230.0 / 255.0),
            srgb_to_linear(200.0 / 255.0),
            srgb_to_linear(150.0 / 255.0),
            1.0,
        );

        let probed = state.surface_probe(sand, uv, 1.0).unwrap();
        let expected = state.shade_surface(sand, uv, 1.0, MaterialSample { diffuse: linear, normal });
        assert_eq!(probed, expected);

        let raw = Vec4::new(230.0, 200.0, 150.0, 255.0) / 255.0;
        let unconverted = state.shade_surface(sand, uv, 1.0, MaterialSample { diffuse: raw, normal });
        assert!(probed.x < unconverted.x);
    }

    #[test]
    fn surface_probe_is_finite_and_opaque() {
        let state = builtin_state();
        let color = state
            .surface_probe(&state.entities[0], Vec2::splat(0.5), 16.0 / 9.0)
            .unwrap();
        assert!(color.is_finite());
        assert_eq!(color.w, 1.0);
        assert!(state
            .surface_probe(&state.entities[1], Vec2::splat(0.5), 1.0)
            .is_none());
    }
}
