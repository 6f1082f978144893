use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbaImage;

/// Encoded tangent-space normal pointing straight out of the surface.
pub const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];

/// Where a texture's texels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource {
    File(PathBuf),
    /// A single texel, stretched over the whole surface by the sampler.
    Solid([u8; 4]),
}

impl TextureSource {
    pub fn decode(&self) -> Result<RgbaImage> {
        match self {
            TextureSource::File(path) => {
                let img = image::open(path)
                    .with_context(|| format!("failed to decode texture {}", path.display()))?;
                Ok(img.to_rgba8())
            }
            TextureSource::Solid(texel) => Ok(RgbaImage::from_pixel(1, 1, image::Rgba(*texel))),
        }
    }

    /// Texel value the sampler returns at the center of a solid texture
    /// stored in a linear format such as `Rgba8Unorm`. `None` for file
    /// textures.
    pub fn solid_value(&self) -> Option<glam::Vec4> {
        match self {
            TextureSource::Solid(texel) => Some(glam::Vec4::from_array(texel.map(f32::from)) / 255.0),
            TextureSource::File(_) => None,
        }
    }

    /// Like [`solid_value`](Self::solid_value), for a texture stored as
    /// `Rgba8UnormSrgb`: color channels are decoded to linear, alpha is not.
    pub fn solid_linear_value(&self) -> Option<glam::Vec4> {
        self.solid_value().map(|value| {
            glam::Vec4::new(
                srgb_to_linear(value.x),
                srgb_to_linear(value.y),
                srgb_to_linear(value.z),
                value.w,
            )
        })
    }
}

/// sRGB transfer function decode, as applied when sampling an `*Srgb` format.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// GPU texture with the view and sampler bound next to it.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &TextureSource,
        label: &str,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let rgba = source.decode()?;
        Ok(Self::from_rgba(device, queue, &rgba, label, format))
    }

    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &RgbaImage,
        label: &str,
        format: wgpu::TextureFormat,
    ) -> Self {
        let (width, height) = rgba.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_source_decodes_to_single_texel() {
        let img = TextureSource::Solid([10, 20, 30, 255]).decode().unwrap();
        assert_eq!(img.dimensions(), (1, 1));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn flat_normal_is_close_to_half_half_one() {
        let value = TextureSource::Solid(FLAT_NORMAL).solid_value().unwrap();
        assert!((value.x - 0.5).abs() < 0.01);
        assert!((value.y - 0.5).abs() < 0.01);
        assert_eq!(value.z, 1.0);
    }

    #[test]
    fn srgb_solid_value_is_decoded_to_linear() {
        let value = TextureSource::Solid([230, 0, 255, 128])
            .solid_linear_value()
            .unwrap();
        assert!((value.x - 0.7913).abs() < 1e-3);
        assert_eq!(value.y, 0.0);
        assert!((value.z - 1.0).abs() < 1e-6);
        assert_eq!(value.w, 128.0 / 255.0);
        assert!(TextureSource::File("a.png".into()).solid_linear_value().is_none());
    }

    #[test]
    fn srgb_decode_is_linear_near_black() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(0.04) - 0.04 / 12.92).abs() < 1e-7);
        assert!(srgb_to_linear(0.5) < 0.5);
    }

    #[test]
    fn missing_file_reports_path() {
        let source = TextureSource::File(PathBuf::from("/nonexistent/sand.png"));
        let err = source.decode().unwrap_err();
        assert!(format!("{err:#}").contains("sand.png"));
    }

    #[test]
    fn file_source_decodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 4]))
            .save(&path)
            .unwrap();
        let img = TextureSource::File(path).decode().unwrap();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(1, 2).0, [1, 2, 3, 4]);
    }
}
