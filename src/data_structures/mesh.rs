//! Meshes: host-side descriptors and their device-resident counterpart.
//!
//! A [`MeshDescriptor`] is what the importer hands over: vertices, 32-bit
//! indices and up to three RGBA8 textures (albedo, normal, ARM). [`Mesh`] owns
//! the uploaded vertex/index buffers, the three textures and their sampler
//! bindings, plus a model transform the caller may edit between frames.

use anyhow::Context as _;
use cgmath::{InnerSpace, SquareMatrix};

use crate::device::{BufferUsage, GpuDevice, TextureDesc, TextureUsage};
use crate::resources::{Buffer, CommandScope, MaterialBindings, Sampler, Texture};

/// One vertex as provided by the importer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Derived from positions and UVs when missing and tangents are enabled.
    pub tangent: Option<[f32; 3]>,
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tangent: None,
            tex_coord,
        }
    }
}

/// Device layout without tangents.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Device layout with a per-vertex tangent.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertexTangent {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// A single texel.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new(rgba.to_vec(), 1, 1)
    }
}

/// The three material texture slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Normal,
    /// Ambient occlusion, roughness, metallic.
    Arm,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 3] = [TextureSlot::Albedo, TextureSlot::Normal, TextureSlot::Arm];

    pub fn index(self) -> usize {
        match self {
            TextureSlot::Albedo => 0,
            TextureSlot::Normal => 1,
            TextureSlot::Arm => 2,
        }
    }

    /// Albedo is color data; normal and ARM are linear data.
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            TextureSlot::Albedo => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureSlot::Normal | TextureSlot::Arm => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    /// Texel used when a descriptor leaves the slot empty.
    pub fn fallback_texel(self) -> [u8; 4] {
        match self {
            TextureSlot::Albedo => [255, 255, 255, 255],
            // flat tangent-space normal
            TextureSlot::Normal => [127, 127, 255, 255],
            // full occlusion term, full roughness, no metal
            TextureSlot::Arm => [255, 255, 0, 255],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureSlot::Albedo => "albedo",
            TextureSlot::Normal => "normal",
            TextureSlot::Arm => "arm",
        }
    }
}

/// Everything needed to create a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDescriptor {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Indexed by [`TextureSlot::index`].
    pub textures: [Option<TextureData>; 3],
}

impl MeshDescriptor {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            textures: [None, None, None],
        }
    }

    pub fn with_texture(mut self, slot: TextureSlot, data: TextureData) -> Self {
        self.textures[slot.index()] = Some(data);
        self
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureData> {
        self.textures[slot.index()].as_ref()
    }

    /// Checks the descriptor before anything is allocated.
    pub fn validate(&self) -> Result<(), String> {
        if self.vertices.is_empty() {
            return Err("no vertices".to_string());
        }
        if u32::try_from(self.vertices.len()).is_err() {
            return Err(format!("{} vertices exceed 32-bit indexing", self.vertices.len()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a non-zero multiple of 3",
                self.indices.len()
            ));
        }
        if let Some(index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(format!(
                "index {} out of range for {} vertices",
                index,
                self.vertices.len()
            ));
        }
        for slot in TextureSlot::ALL {
            let Some(data) = self.texture(slot) else {
                continue;
            };
            if data.width == 0 || data.height == 0 {
                return Err(format!("{} texture has zero area", slot.name()));
            }
            let expected = data.width as usize * data.height as usize * 4;
            if data.pixels.len() != expected {
                return Err(format!(
                    "{} texture is {}x{} but has {} bytes, expected {}",
                    slot.name(),
                    data.width,
                    data.height,
                    data.pixels.len(),
                    expected
                ));
            }
        }
        Ok(())
    }

    /// Packs the vertices into the device layout.
    ///
    /// With `tangents` set, vertices without a tangent get one derived from the
    /// triangles; supplied tangents are kept.
    pub fn vertex_bytes(&self, tangents: bool) -> Vec<u8> {
        if !tangents {
            let packed: Vec<GpuVertex> = self
                .vertices
                .iter()
                .map(|v| GpuVertex {
                    position: v.position,
                    normal: v.normal,
                    tex_coord: v.tex_coord,
                })
                .collect();
            return bytemuck::cast_slice(&packed).to_vec();
        }

        let derived = if self.vertices.iter().all(|v| v.tangent.is_some()) {
            Vec::new()
        } else {
            derive_tangents(&self.vertices, &self.indices)
        };
        let packed: Vec<GpuVertexTangent> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| GpuVertexTangent {
                position: v.position,
                normal: v.normal,
                tangent: v
                    .tangent
                    .or_else(|| derived.get(i).copied())
                    .unwrap_or_default(),
                tex_coord: v.tex_coord,
            })
            .collect();
        bytemuck::cast_slice(&packed).to_vec()
    }
}

/// Computes one tangent per vertex by accumulating the tangents of the
/// triangles it belongs to and averaging them.
///
/// Triangles with degenerate UVs contribute nothing. Vertices without any
/// contribution get an arbitrary unit vector perpendicular to their normal.
pub fn derive_tangents(vertices: &[Vertex], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let pos0: cgmath::Vector3<f32> = vertices[i0].position.into();
        let pos1: cgmath::Vector3<f32> = vertices[i1].position.into();
        let pos2: cgmath::Vector3<f32> = vertices[i2].position.into();
        let uv0: cgmath::Vector2<f32> = vertices[i0].tex_coord.into();
        let uv1: cgmath::Vector2<f32> = vertices[i1].tex_coord.into();
        let uv2: cgmath::Vector2<f32> = vertices[i2].tex_coord.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;

        for i in [i0, i1, i2] {
            sums[i] += tangent;
            triangles_included[i] += 1;
        }
    }

    sums.into_iter()
        .zip(triangles_included)
        .zip(vertices)
        .map(|((sum, n), vertex)| -> [f32; 3] {
            if n == 0 || sum.magnitude2() <= f32::EPSILON {
                return perpendicular(vertex.normal.into()).into();
            }
            (sum / n as f32).normalize().into()
        })
        .collect()
}

fn perpendicular(normal: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
    let axis = if normal.x.abs() < 0.9 {
        cgmath::Vector3::unit_x()
    } else {
        cgmath::Vector3::unit_y()
    };
    let tangent = axis - normal * normal.dot(axis);
    if tangent.magnitude2() <= f32::EPSILON {
        cgmath::Vector3::unit_x()
    } else {
        tangent.normalize()
    }
}

/// A device-resident mesh.
///
/// Fields drop in declaration order: bindings before the textures they
/// reference, buffers last.
pub struct Mesh<'d, D: GpuDevice> {
    /// Model matrix, identity on creation.
    pub transform: cgmath::Matrix4<f32>,
    bindings: MaterialBindings<'d, D>,
    textures: [Texture<'d, D>; 3],
    vertex_buffer: Buffer<'d, D>,
    index_buffer: Buffer<'d, D>,
    index_count: u32,
}

impl<'d, D: GpuDevice> Mesh<'d, D> {
    /// Allocates and uploads everything a descriptor describes on `scope`.
    ///
    /// On error every object created so far is released when the partial
    /// state drops; the caller cancels the scope.
    pub fn upload(
        scope: &mut CommandScope<'d, D>,
        sampler: &Sampler<'d, D>,
        descriptor: &MeshDescriptor,
        name: &str,
        tangents: bool,
    ) -> anyhow::Result<Self> {
        let device = scope.device();

        let vertices = descriptor.vertex_bytes(tangents);
        let vertex_buffer = Buffer::new(
            device,
            BufferUsage::Vertex,
            vertices.len() as u64,
            &format!("{name} vertex buffer"),
        )?;
        vertex_buffer
            .upload(scope, &vertices)
            .context("vertex upload failed")?;

        let indices: &[u8] = bytemuck::cast_slice(&descriptor.indices);
        let index_buffer = Buffer::new(
            device,
            BufferUsage::Index,
            indices.len() as u64,
            &format!("{name} index buffer"),
        )?;
        index_buffer
            .upload(scope, indices)
            .context("index upload failed")?;

        let [albedo, normal, arm] = TextureSlot::ALL;
        let textures = [
            Self::upload_texture(scope, descriptor, albedo, name)?,
            Self::upload_texture(scope, descriptor, normal, name)?,
            Self::upload_texture(scope, descriptor, arm, name)?,
        ];
        let bindings = MaterialBindings::new(
            device,
            &[&textures[0], &textures[1], &textures[2]],
            sampler,
        )
        .context("failed to bind material textures")?;

        Ok(Self {
            transform: cgmath::Matrix4::identity(),
            bindings,
            textures,
            vertex_buffer,
            index_buffer,
            index_count: descriptor.indices.len() as u32,
        })
    }

    fn upload_texture(
        scope: &mut CommandScope<'d, D>,
        descriptor: &MeshDescriptor,
        slot: TextureSlot,
        name: &str,
    ) -> anyhow::Result<Texture<'d, D>> {
        let device = scope.device();
        let label = format!("{name} {} texture", slot.name());
        let texture = match descriptor.texture(slot) {
            Some(data) => {
                let texture = Texture::new(
                    device,
                    &TextureDesc {
                        label: &label,
                        width: data.width,
                        height: data.height,
                        format: slot.format(),
                        usage: TextureUsage::Sampled,
                    },
                )?;
                texture.upload(scope, &data.pixels)?;
                texture
            }
            None => Texture::solid_color(device, scope, slot.fallback_texel(), slot.format(), &label)?,
        };
        Ok(texture)
    }

    pub fn vertex_buffer(&self) -> &Buffer<'d, D> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer<'d, D> {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn texture(&self, slot: TextureSlot) -> &Texture<'d, D> {
        &self.textures[slot.index()]
    }

    pub fn bindings(&self) -> &MaterialBindings<'d, D> {
        &self.bindings
    }
}
