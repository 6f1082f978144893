use std::num::NonZeroU64;

use crate::camera::CameraUniform;
use crate::entity::InstanceData;
use crate::light::PointLightUniform;
use crate::mesh::Vertex;
use crate::render::shaders::{FLAT_SHADER, FRAGMENT_ENTRY, SURFACE_SHADER, VERTEX_ENTRY};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub const CAMERA_GROUP: u32 = 0;
pub const LIGHT_GROUP: u32 = 1;
pub const MATERIAL_GROUP: u32 = 2;

/// Vertex buffer slots used by both pipelines.
pub const VERTEX_SLOT: u32 = 0;
pub const INSTANCE_SLOT: u32 = 1;

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Bind group layouts shared by the passes, in group order.
pub struct BindLayouts {
    pub camera: wgpu::BindGroupLayout,
    pub light: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
}

impl BindLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera-bind-layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<CameraUniform>())],
        });
        let light = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light-bind-layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<PointLightUniform>())],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });
        Self {
            camera,
            light,
            material,
        }
    }
}

/// Both render pipelines, built against one set of layouts.
pub struct PassPipelines {
    pub layouts: BindLayouts,
    pub surface: wgpu::RenderPipeline,
    pub flat: wgpu::RenderPipeline,
}

impl PassPipelines {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        let layouts = BindLayouts::new(device);

        let surface_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("surface-pipeline-layout"),
            bind_group_layouts: &[&layouts.camera, &layouts.light, &layouts.material],
            push_constant_ranges: &[],
        });
        let flat_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("flat-pipeline-layout"),
            bind_group_layouts: &[&layouts.camera],
            push_constant_ranges: &[],
        });

        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("surface-shader"),
            source: wgpu::ShaderSource::Wgsl(SURFACE_SHADER.into()),
        });
        let flat_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("flat-shader"),
            source: wgpu::ShaderSource::Wgsl(FLAT_SHADER.into()),
        });

        let surface = create_pipeline(
            device,
            "surface-pipeline",
            &surface_layout,
            &surface_shader,
            color_format,
        );
        let flat = create_pipeline(
            device,
            "flat-pipeline",
            &flat_layout,
            &flat_shader,
            color_format,
        );

        Self {
            layouts,
            surface,
            flat,
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &[Vertex::LAYOUT, InstanceData::LAYOUT],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}
