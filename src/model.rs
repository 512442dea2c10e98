// model.rs - glTF / GLB 解码为 CPU 端网格、材质与纹理
//
// 节点变换在加载时烘焙进顶点，渲染端只需要一个模型矩阵（朝向）。

use glam::{Mat3, Mat4, Vec3};
use gltf::mesh::Mode;
use std::path::Path;

use crate::error::ViewerError;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub nrm: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRef {
    /// Index into `ModelData::textures`.
    pub image: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureRef>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub emissive_factor: [f32; 3],
    pub emissive_texture: Option<TextureRef>,
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            emissive_factor: [0.0; 3],
            emissive_texture: None,
            occlusion_texture: None,
            occlusion_strength: 1.0,
        }
    }
}

/// RGBA8 pixels, `None` when the source format is not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: usize,
}

#[derive(Debug, Clone)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    /// Last entry is the default material for primitives without one.
    pub materials: Vec<MaterialData>,
    pub textures: Vec<TextureData>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl ModelData {
    /// Decode `.gltf` or `.glb` bytes. External buffers and images resolve against `source`'s directory.
    pub fn decode(bytes: &[u8], source: &Path) -> Result<Self, ViewerError> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        let base = source.parent();
        let buffers = gltf::import_buffers(&document, base, blob)?;
        let images = gltf::import_images(&document, base, &buffers)?;

        let mut materials: Vec<MaterialData> = document.materials().map(convert_material).collect();
        let default_material = materials.len();
        materials.push(MaterialData::default());

        let textures = images.into_iter().map(convert_image).collect();

        let mut model = ModelData {
            meshes: Vec::new(),
            materials,
            textures,
            bounds_min: Vec3::splat(f32::INFINITY),
            bounds_max: Vec3::splat(f32::NEG_INFINITY),
        };

        let scene = document.default_scene().or_else(|| document.scenes().next());
        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    model.visit_node(&node, Mat4::IDENTITY, &buffers, default_material);
                }
            }
            None => {
                for mesh in document.meshes() {
                    model.add_mesh(&mesh, Mat4::IDENTITY, &buffers, default_material);
                }
            }
        }

        if model.triangle_count() == 0 {
            return Err(ViewerError::EmptyModel(source.to_path_buf()));
        }

        log::info!(
            "model {}: meshes={}, triangles={}, materials={}, textures={}",
            source.display(),
            model.meshes.len(),
            model.triangle_count(),
            model.materials.len() - 1,
            model.textures.len()
        );
        Ok(model)
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }

    fn visit_node(
        &mut self,
        node: &gltf::Node,
        parent: Mat4,
        buffers: &[gltf::buffer::Data],
        default_material: usize,
    ) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            self.add_mesh(&mesh, world, buffers, default_material);
        }
        for child in node.children() {
            self.visit_node(&child, world, buffers, default_material);
        }
    }

    fn add_mesh(
        &mut self,
        mesh: &gltf::Mesh,
        world: Mat4,
        buffers: &[gltf::buffer::Data],
        default_material: usize,
    ) {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

        for prim in mesh.primitives() {
            if prim.mode() != Mode::Triangles {
                log::debug!("skipping {:?} primitive in mesh {:?}", prim.mode(), mesh.name());
                continue;
            }

            let reader = prim.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(it) => it.map(|p| world.transform_point3(Vec3::from(p))).collect(),
                None => continue,
            };
            let indices: Vec<u32> = match reader.read_indices() {
                Some(it) => it.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let indices: Vec<u32> = indices
                .chunks_exact(3)
                .filter(|tri| tri.iter().all(|i| (*i as usize) < positions.len()))
                .flatten()
                .copied()
                .collect();
            if indices.is_empty() {
                continue;
            }

            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(it) => it
                    .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                    .collect(),
                None => face_normals(&positions, &indices),
            };
            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(it) => it.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, p)| Vertex {
                    pos: p.to_array(),
                    nrm: normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            for p in &positions {
                self.bounds_min = self.bounds_min.min(*p);
                self.bounds_max = self.bounds_max.max(*p);
            }

            self.meshes.push(MeshData {
                vertices,
                indices,
                material: prim.material().index().unwrap_or(default_material),
            });
        }
    }
}

/// Area-weighted vertex normals for primitives that ship without them.
fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO {
                Vec3::Y
            } else {
                n
            }
        })
        .collect()
}

fn texture_ref(texture: gltf::Texture) -> TextureRef {
    TextureRef {
        image: texture.source().index(),
    }
}

fn convert_material(material: gltf::Material) -> MaterialData {
    let pbr = material.pbr_metallic_roughness();
    MaterialData {
        base_color_factor: pbr.base_color_factor(),
        base_color_texture: pbr.base_color_texture().map(|i| texture_ref(i.texture())),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|i| texture_ref(i.texture())),
        emissive_factor: material.emissive_factor(),
        emissive_texture: material.emissive_texture().map(|i| texture_ref(i.texture())),
        occlusion_strength: material
            .occlusion_texture()
            .map(|o| o.strength())
            .unwrap_or(1.0),
        occlusion_texture: material.occlusion_texture().map(|o| texture_ref(o.texture())),
    }
}

fn convert_image(image: gltf::image::Data) -> TextureData {
    use gltf::image::Format;

    let pixels = match image.format {
        Format::R8G8B8A8 => Some(image.pixels),
        Format::R8G8B8 => Some(
            image
                .pixels
                .chunks_exact(3)
                .flat_map(|c| [c[0], c[1], c[2], 255])
                .collect(),
        ),
        Format::R8G8 => Some(
            image
                .pixels
                .chunks_exact(2)
                .flat_map(|c| [c[0], c[1], 0, 255])
                .collect(),
        ),
        Format::R8 => Some(image.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect()),
        other => {
            log::warn!(
                "unsupported texture format {other:?} ({}x{}), using fallback",
                image.width,
                image.height
            );
            None
        }
    };

    TextureData {
        width: image.width,
        height: image.height,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single-triangle GLB: one node translated by +1 on X, no normals, no material.
    fn triangle_glb(with_indices: bool) -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let bin_len = bin.len();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let indices = if with_indices { r#","indices":1"# } else { "" };
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],
"nodes":[{{"mesh":0,"translation":[1.0,0.0,0.0]}}],
"meshes":[{{"primitives":[{{"attributes":{{"POSITION":0}}{indices}}}]}}],
"buffers":[{{"byteLength":{bin_len}}}],
"bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},{{"buffer":0,"byteOffset":36,"byteLength":6}}],
"accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0.0,0.0,0.0],"max":[1.0,1.0,0.0]}},
{{"bufferView":1,"componentType":5123,"count":3,"type":"SCALAR"}}]}}"#
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn decodes_glb_and_bakes_node_transform() {
        let model = ModelData::decode(&triangle_glb(true), Path::new("tri.glb")).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.triangle_count(), 1);
        assert_eq!(model.bounds_min, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(model.bounds_max, Vec3::new(2.0, 1.0, 0.0));

        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        for v in &mesh.vertices {
            assert_eq!(v.nrm, [0.0, 0.0, 1.0]);
            assert_eq!(v.uv, [0.0, 0.0]);
        }
    }

    #[test]
    fn primitive_without_material_uses_default() {
        let model = ModelData::decode(&triangle_glb(true), Path::new("tri.glb")).unwrap();
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.meshes[0].material, 0);
        assert_eq!(model.materials[0], MaterialData::default());
    }

    #[test]
    fn missing_indices_are_generated() {
        let model = ModelData::decode(&triangle_glb(false), Path::new("tri.glb")).unwrap();
        assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn invalid_bytes_are_an_error() {
        assert!(ModelData::decode(b"{ nope", Path::new("bad.gltf")).is_err());
    }

    #[test]
    fn rgb_images_are_expanded_to_rgba() {
        let texture = convert_image(gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        });
        assert_eq!(texture.pixels, Some(vec![10, 20, 30, 255, 40, 50, 60, 255]));
    }
}
