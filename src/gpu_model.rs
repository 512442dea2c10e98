// gpu_model.rs - 模型上传到 GPU：顶点/索引缓冲、材质 uniform 与纹理

use std::collections::HashMap;

use image::{DynamicImage, RgbaImage};
use wgpu::util::DeviceExt;

use crate::model::{MaterialData, ModelData, TextureData, TextureRef, Vertex};

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute { shader_location: 0, offset: 0, format: wgpu::VertexFormat::Float32x3 },
            wgpu::VertexAttribute { shader_location: 1, offset: 12, format: wgpu::VertexFormat::Float32x3 },
            wgpu::VertexAttribute { shader_location: 2, offset: 24, format: wgpu::VertexFormat::Float32x2 },
        ],
    };
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 4],
    params: [f32; 4], // x=metallic, y=roughness, z=occlusion strength
}

impl From<&MaterialData> for MaterialUniform {
    fn from(m: &MaterialData) -> Self {
        let [er, eg, eb] = m.emissive_factor;
        Self {
            base_color: m.base_color_factor,
            emissive: [er, eg, eb, 0.0],
            params: [
                m.metallic_factor,
                m.roughness_factor,
                if m.occlusion_texture.is_some() { m.occlusion_strength } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// Bind group layout (group 1) shared by every material, plus fallbacks.
pub struct MaterialLayout {
    pub layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::TextureView,
}

impl MaterialLayout {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1), // base color
                texture_entry(2), // metallic-roughness
                texture_entry(3), // emissive
                texture_entry(4), // occlusion
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // 1x1 白色：缺失的贴图都用它，乘上材质因子后即为因子本身
        let white = upload_rgba8(
            device,
            queue,
            1,
            1,
            &[255, 255, 255, 255],
            wgpu::TextureFormat::Rgba8Unorm,
            "white_texture",
        );

        Self {
            layout,
            sampler,
            white,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material: usize,
}

pub struct GpuModel {
    meshes: Vec<GpuMesh>,
    materials: Vec<wgpu::BindGroup>,
}

impl GpuModel {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &MaterialLayout,
        data: &ModelData,
    ) -> Self {
        let max_dim = device.limits().max_texture_dimension_2d;
        let mut views: HashMap<(usize, bool), wgpu::TextureView> = HashMap::new();
        let mut view_for = |texture: Option<TextureRef>, srgb: bool| -> Option<(usize, bool)> {
            let texture = texture?;
            let source = data.textures.get(texture.image)?;
            let key = (texture.image, srgb);
            if !views.contains_key(&key) {
                let view = upload_texture(device, queue, source, srgb, max_dim)?;
                views.insert(key, view);
            }
            Some(key)
        };

        let mut keys = Vec::with_capacity(data.materials.len());
        for material in &data.materials {
            keys.push([
                view_for(material.base_color_texture, true),
                view_for(material.metallic_roughness_texture, false),
                view_for(material.emissive_texture, true),
                view_for(material.occlusion_texture, false),
            ]);
        }

        let materials = data
            .materials
            .iter()
            .zip(&keys)
            .enumerate()
            .map(|(i, (material, keys))| {
                let uniform = MaterialUniform::from(material);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("material_uniform"),
                    contents: bytemuck::cast_slice(&[uniform]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let [base, mr, emissive, occlusion] =
                    keys.map(|k| pick_view(&views, k, &layout.white));
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("material_bind_group_{i}")),
                    layout: &layout.layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(base) },
                        wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(mr) },
                        wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(emissive) },
                        wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(occlusion) },
                        wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(&layout.sampler) },
                    ],
                })
            })
            .collect();

        let meshes = data
            .meshes
            .iter()
            .map(|mesh| GpuMesh {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("model_vertices"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("model_indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.indices.len() as u32,
                material: mesh.material,
            })
            .collect();

        Self { meshes, materials }
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        for mesh in &self.meshes {
            let Some(material) = self.materials.get(mesh.material) else {
                continue;
            };
            pass.set_bind_group(1, material, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

fn pick_view<'a>(
    views: &'a HashMap<(usize, bool), wgpu::TextureView>,
    key: Option<(usize, bool)>,
    fallback: &'a wgpu::TextureView,
) -> &'a wgpu::TextureView {
    key.and_then(|k| views.get(&k)).unwrap_or(fallback)
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &TextureData,
    srgb: bool,
    max_dim: u32,
) -> Option<wgpu::TextureView> {
    let pixels = source.pixels.as_ref()?;
    let img = RgbaImage::from_raw(source.width, source.height, pixels.clone())?;

    // 超过 GPU 纹理尺寸限制时等比缩小
    let img = if img.width() > max_dim || img.height() > max_dim {
        let scale = max_dim as f32 / img.width().max(img.height()) as f32;
        let new_w = ((img.width() as f32 * scale) as u32).max(1);
        let new_h = ((img.height() as f32 * scale) as u32).max(1);
        log::warn!(
            "texture {}x{} exceeds GPU limit {max_dim}, scaled to {new_w}x{new_h}",
            img.width(),
            img.height()
        );
        DynamicImage::ImageRgba8(img)
            .resize(new_w, new_h, image::imageops::FilterType::Lanczos3)
            .to_rgba8()
    } else {
        img
    };

    let format = if srgb {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };
    Some(upload_rgba8(
        device,
        queue,
        img.width(),
        img.height(),
        &img,
        format,
        "model_texture",
    ))
}

fn upload_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::TextureView {
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
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
