/// Procedural surface pass (`vs_main` / `fs_main`).
///
/// Bindings: group 0 camera, group 1 point light, group 2 diffuse texture,
/// diffuse sampler, normal texture, normal sampler.
pub const SURFACE_SHADER: &str = include_str!("shaders/surface.wgsl");

/// Flat entity pass (`vs_main` / `fs_main`). Bindings: group 0 camera.
pub const FLAT_SHADER: &str = include_str!("shaders/flat.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
