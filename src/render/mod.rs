//! GPU side: WGSL sources, bind group and pipeline layouts, and the
//! window-backed renderer that draws a [`SceneState`](crate::app::SceneState).

pub mod layout;
pub mod native;
pub mod shaders;

pub use layout::{PassPipelines, DEPTH_FORMAT};
pub use native::Renderer;
