use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::app::SceneState;
use crate::camera::CameraUniform;
use crate::entity::{Entity, MaterialSource, MeshSource, PassKind};
use crate::light::PointLightUniform;
use crate::mesh::{Mesh, MeshBuffers};
use crate::obj::load_obj_from_str;
use crate::render::layout::{
    PassPipelines, CAMERA_GROUP, DEPTH_FORMAT, INSTANCE_SLOT, LIGHT_GROUP, MATERIAL_GROUP,
    VERTEX_SLOT,
};
use crate::texture::{Texture, TextureSource, FLAT_NORMAL};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.2,
    b: 0.3,
    a: 1.0,
};

/// GPU renderer backed by wgpu that draws a [`SceneState`] with the surface
/// and flat passes.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    pipelines: PassPipelines,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    draws: Vec<DrawItem>,
}

struct DrawItem {
    pass: PassKind,
    mesh: MeshBuffers,
    material: Option<Material>,
}

struct Material {
    _diffuse: Texture,
    _normal: Texture,
    bind_group: wgpu::BindGroup,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window and uploads every
    /// entity in `state`.
    pub async fn new(window: Arc<Window>, state: &SceneState) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("using adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let pipelines = PassPipelines::new(&device, surface_format);

        let aspect = size.width as f32 / size.height as f32;
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera-uniform"),
            contents: bytes_of(&state.camera_uniform(aspect)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera-bind-group"),
            layout: &pipelines.layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("light-uniform"),
            contents: bytes_of(&state.light_uniform()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light-bind-group"),
            layout: &pipelines.layouts.light,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let instances = state.instance_data();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("instance-buffer"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let draws = state
            .entities
            .iter()
            .map(|entity| {
                let mesh = MeshBuffers::from_mesh(&device, &entity_mesh(entity), &entity.name);
                let material = (entity.pass == PassKind::Surface).then(|| {
                    let source = entity
                        .material
                        .clone()
                        .unwrap_or_else(|| default_material(entity));
                    create_material(&device, &queue, &pipelines, entity, &source)
                });
                DrawItem {
                    pass: entity.pass,
                    mesh,
                    material,
                }
            })
            .collect();

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            pipelines,
            camera_buffer,
            camera_bind_group,
            light_buffer,
            light_bind_group,
            instance_buffer,
            draws,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn aspect(&self) -> f32 {
        self.size.width as f32 / self.size.height.max(1) as f32
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Uploads camera, light and per-entity transforms for the next frame.
    pub fn update(&self, state: &SceneState) {
        let camera: CameraUniform = state.camera_uniform(self.aspect());
        let light: PointLightUniform = state.light_uniform();
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytes_of(&camera));
        self.queue.write_buffer(&self.light_buffer, 0, bytes_of(&light));

        let instances = state.instance_data();
        if instances.len() != self.draws.len() {
            warn!(
                "scene has {} entities but {} were uploaded; skipping transform update",
                instances.len(),
                self.draws.len()
            );
            return;
        }
        self.queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
    }

    /// Draws every entity: surfaces first, then flat entities, each with its
    /// own instance.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if !self.draws.is_empty() {
                pass.set_vertex_buffer(INSTANCE_SLOT, self.instance_buffer.slice(..));

                pass.set_pipeline(&self.pipelines.surface);
                pass.set_bind_group(CAMERA_GROUP, &self.camera_bind_group, &[]);
                pass.set_bind_group(LIGHT_GROUP, &self.light_bind_group, &[]);
                for (index, draw) in self.draws_for(PassKind::Surface) {
                    if let Some(material) = &draw.material {
                        pass.set_bind_group(MATERIAL_GROUP, &material.bind_group, &[]);
                    }
                    draw_mesh(&mut pass, &draw.mesh, index);
                }

                pass.set_pipeline(&self.pipelines.flat);
                pass.set_bind_group(CAMERA_GROUP, &self.camera_bind_group, &[]);
                for (index, draw) in self.draws_for(PassKind::Flat) {
                    draw_mesh(&mut pass, &draw.mesh, index);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn draws_for(&self, kind: PassKind) -> impl Iterator<Item = (u32, &DrawItem)> {
        self.draws
            .iter()
            .enumerate()
            .filter(move |(_, draw)| draw.pass == kind)
            .map(|(index, draw)| (index as u32, draw))
    }
}

fn draw_mesh(pass: &mut wgpu::RenderPass<'_>, mesh: &MeshBuffers, instance: u32) {
    if mesh.index_count == 0 {
        return;
    }
    pass.set_vertex_buffer(VERTEX_SLOT, mesh.vertex.slice(..));
    pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..mesh.index_count, 0, instance..instance + 1);
}

/// CPU geometry for an entity. Flat meshes take the entity color; OBJ files
/// that fail to load are replaced by a cube.
fn entity_mesh(entity: &Entity) -> Mesh {
    let mesh = match &entity.mesh {
        MeshSource::Plane { resolution } => Mesh::plane(*resolution),
        MeshSource::Cube => Mesh::cube(),
        MeshSource::Obj(path) => match load_obj_file(path) {
            Ok(mesh) => mesh,
            Err(err) => {
                warn!("{}: {err:#}; drawing a cube instead", entity.name);
                Mesh::cube()
            }
        },
    };
    debug!(
        "{}: {} vertices, {} triangles",
        entity.name,
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    match entity.pass {
        PassKind::Flat => mesh.with_color(entity.color),
        PassKind::Surface => mesh,
    }
}

fn load_obj_file(path: &std::path::Path) -> Result<Mesh> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    load_obj_from_str(&contents)
        .with_context(|| format!("failed to parse OBJ mesh {}", path.display()))
}

fn default_material(entity: &Entity) -> MaterialSource {
    let [r, g, b, _] = (entity.color.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0)
        .round()
        .to_array();
    MaterialSource {
        diffuse: TextureSource::Solid([r as u8, g as u8, b as u8, 255]),
        normal: TextureSource::Solid(FLAT_NORMAL),
    }
}

fn create_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipelines: &PassPipelines,
    entity: &Entity,
    source: &MaterialSource,
) -> Material {
    let fallback = default_material(entity);
    let diffuse = load_texture_or(
        device,
        queue,
        &source.diffuse,
        &fallback.diffuse,
        &format!("{}-diffuse", entity.name),
        wgpu::TextureFormat::Rgba8UnormSrgb,
    );
    let normal = load_texture_or(
        device,
        queue,
        &source.normal,
        &fallback.normal,
        &format!("{}-normal", entity.name),
        wgpu::TextureFormat::Rgba8Unorm,
    );
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{}-material", entity.name)),
        layout: &pipelines.layouts.material,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&diffuse.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&normal.sampler),
            },
        ],
    });
    Material {
        _diffuse: diffuse,
        _normal: normal,
        bind_group,
    }
}

fn load_texture_or(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &TextureSource,
    fallback: &TextureSource,
    label: &str,
    format: wgpu::TextureFormat,
) -> Texture {
    match Texture::load(device, queue, source, label, format) {
        Ok(texture) => texture,
        Err(err) => {
            warn!("{label}: {err:#}; using a solid texture");
            let rgba = match fallback.decode() {
                Ok(rgba) => rgba,
                Err(_) => image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4])),
            };
            Texture::from_rgba(device, queue, &rgba, label, format)
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
