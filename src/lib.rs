//! Procedural sand surface renderer built on wgpu.
//!
//! Two passes share one vertex and instance layout: a surface pass that
//! displaces a flat grid into a rippled height field and lights it with a
//! normal-mapped point light, and a flat pass that draws meshes in their
//! vertex colors. Everything except [`render`] runs without a GPU, so scene
//! loading, animation and the CPU shading reference stay testable in
//! headless tools.

pub mod app;
pub mod camera;
pub mod entity;
pub mod error;
pub mod light;
pub mod mesh;
pub mod obj;
pub mod render;
pub mod scene;
pub mod shading;
pub mod texture;

pub use app::SceneState;
pub use camera::{Camera, CameraController, CameraUniform, Movement};
pub use entity::{Entity, InstanceData, MaterialSource, MeshSource, PassKind, Transform};
pub use error::{SceneError, WindowInitError};
pub use light::{LightOrbit, PointLight, PointLightUniform};
pub use mesh::{Mesh, Vertex};
pub use obj::load_obj_from_str;
pub use render::Renderer;
pub use scene::{Light, ObjectType, Scene, SceneObject};
pub use texture::{TextureSource, FLAT_NORMAL};
