//! The device seam.
//!
//! [`GpuDevice`] is the narrow set of operations the renderer needs from a GPU:
//! allocate and release objects, stage uploads, record copy passes, acquire the
//! swapchain, and open a render pass. Every resource primitive and the frame
//! orchestrator are generic over it and only ever *borrow* the device, so its
//! lifetime strictly exceeds every buffer, texture and pipeline at compile time.
//!
//! [`crate::context::Context`] implements it on top of `wgpu`.

use std::path::PathBuf;

/// What a device buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Read-only storage visible to the graphics stages.
    Storage,
}

impl BufferUsage {
    pub fn wgpu_usages(self) -> wgpu::BufferUsages {
        let kind = match self {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
        };
        kind | wgpu::BufferUsages::COPY_DST
    }
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    pub size: u64,
}

/// What a texture is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Sampled by the fragment stage, filled through copy passes.
    Sampled,
    /// Depth-stencil attachment. Never uploaded to.
    DepthStencilTarget,
}

impl TextureUsage {
    pub fn wgpu_usages(self) -> wgpu::TextureUsages {
        match self {
            TextureUsage::Sampled => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
            TextureUsage::DepthStencilTarget => wgpu::TextureUsages::RENDER_ATTACHMENT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TextureUsage,
}

/// A rectangle of texels inside mip level 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

/// A staged texture copy: the target region and the staged row pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopy {
    pub region: TextureRegion,
    pub bytes_per_row: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub min_filter: wgpu::FilterMode,
    pub mag_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,
    pub address_mode: wgpu::AddressMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: wgpu::FilterMode::Linear,
            mag_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode: wgpu::AddressMode::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Encoding of a shader blob read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderFormat {
    SpirV,
    Wgsl,
}

#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    pub path: PathBuf,
    pub code: &'a [u8],
    pub format: ShaderFormat,
    pub stage: ShaderStage,
    pub entry_point: &'a str,
}

/// Fixed per-vertex attribute layout of the forward material model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// position, normal, texCoord
    PositionNormalUv,
    /// position, normal, tangent, texCoord
    PositionNormalTangentUv,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub test: bool,
    pub write: bool,
    pub compare: wgpu::CompareFunction,
}

pub struct PipelineDesc<'a, D: GpuDevice + ?Sized> {
    pub label: &'a str,
    pub vertex_shader: &'a D::Shader,
    pub fragment_shader: &'a D::Shader,
    pub vertex_layout: VertexLayout,
    pub color_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    pub depth: Option<DepthState>,
}

/// Clear values of the color and depth-stencil attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassClear {
    pub color: wgpu::Color,
    pub depth: f32,
    pub stencil: u32,
}

/// Vertex uniform slots pushed by the orchestrator.
pub mod uniform_slot {
    pub const PROJECTION: u32 = 0;
    pub const MODEL: u32 = 1;
    pub const VIEW: u32 = 2;
    pub const COUNT: usize = 3;
}

/// Fragment storage slot of the per-frame data block.
pub const FRAME_DATA_STORAGE_SLOT: u32 = 0;

/// Commands recorded while a render pass is open.
///
/// A pass borrows its command buffer mutably, so nothing else (in particular no
/// copy pass) can be recorded on that command buffer until [`end`](Self::end).
pub trait RenderPassEncoder<D: GpuDevice + ?Sized> {
    fn bind_pipeline(&mut self, pipeline: &D::Pipeline);

    /// Binds the sampler-texture pairs of one material.
    fn bind_fragment_samplers(&mut self, bindings: &D::SamplerBindings);

    fn bind_fragment_storage_buffer(&mut self, slot: u32, buffer: &D::Buffer);

    fn bind_vertex_buffer(&mut self, buffer: &D::Buffer);

    /// Binds a buffer of 32-bit indices.
    fn bind_index_buffer(&mut self, buffer: &D::Buffer);

    /// Pushes a small uniform value; it is observed by every following draw
    /// until pushed again.
    fn push_vertex_uniform(&mut self, slot: u32, data: &[u8]) -> anyhow::Result<()>;

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);

    fn end(self)
    where
        Self: Sized;
}

/// A GPU device able to back the forward renderer.
///
/// `create_*` methods report allocation failure as `Err`; it is up to the caller
/// to decide whether that is fatal. `release_*` methods free the device object
/// behind a handle; the handle itself is dropped right after and never used again.
pub trait GpuDevice {
    type Buffer;
    type StagingBuffer;
    type Texture;
    type Sampler;
    type Shader;
    type Pipeline;
    type SamplerBindings;
    type CommandBuffer;
    type SwapchainImage;
    type RenderPass<'a>: RenderPassEncoder<Self>
    where
        Self: 'a;

    /// Required alignment (bytes) of buffer copy sizes and offsets.
    fn copy_alignment(&self) -> u64 {
        1
    }

    /// Required alignment (bytes) of staged texture rows.
    fn texture_row_alignment(&self) -> u32 {
        1
    }

    fn max_buffer_size(&self) -> u64 {
        u64::MAX
    }

    fn max_texture_dimension(&self) -> u32 {
        u32::MAX
    }

    /// Makes room for `draws` draw calls in the next render pass. Called
    /// before the pass begins.
    fn reserve_draws(&self, _draws: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Format of the swapchain color target.
    fn color_target_format(&self) -> wgpu::TextureFormat;

    /// Reconfigures the swapchain for a new drawable size. Zero-area sizes are
    /// remembered but not applied.
    fn resize_swapchain(&self, _width: u32, _height: u32) {}

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> anyhow::Result<Self::Buffer>;
    fn release_buffer(&self, buffer: &Self::Buffer);

    /// Allocates a host-visible buffer of exactly `data.len()` bytes, maps it,
    /// copies `data` in and unmaps it.
    fn create_staging_buffer(&self, data: &[u8]) -> anyhow::Result<Self::StagingBuffer>;
    fn release_staging_buffer(&self, staging: &Self::StagingBuffer);

    fn create_texture(&self, desc: &TextureDesc<'_>) -> anyhow::Result<Self::Texture>;
    fn release_texture(&self, texture: &Self::Texture);

    fn create_sampler(&self, desc: &SamplerDesc) -> anyhow::Result<Self::Sampler>;
    fn release_sampler(&self, sampler: &Self::Sampler);

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<Self::Shader>;
    fn release_shader(&self, shader: &Self::Shader);

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> anyhow::Result<Self::Pipeline>;
    fn release_pipeline(&self, pipeline: &Self::Pipeline);

    /// Groups the texture slots of one material with the shared sampler.
    fn create_sampler_bindings(
        &self,
        textures: &[&Self::Texture],
        sampler: &Self::Sampler,
    ) -> anyhow::Result<Self::SamplerBindings>;
    fn release_sampler_bindings(&self, bindings: &Self::SamplerBindings);

    fn acquire_command_buffer(&self) -> anyhow::Result<Self::CommandBuffer>;

    /// Records one copy pass moving `size` bytes from staging into `dst`.
    fn copy_to_buffer(
        &self,
        cmd: &mut Self::CommandBuffer,
        src: &Self::StagingBuffer,
        dst: &Self::Buffer,
        dst_offset: u64,
        size: u64,
    );

    /// Records one copy pass moving staged rows into a texture region.
    fn copy_to_texture(
        &self,
        cmd: &mut Self::CommandBuffer,
        src: &Self::StagingBuffer,
        dst: &Self::Texture,
        copy: TextureCopy,
    );

    /// Acquires the image to render into this frame.
    ///
    /// `Ok(None)` means no image is available right now (minimized window or a
    /// transiently unavailable surface); the caller skips the frame and polls
    /// again next iteration.
    fn acquire_swapchain_image(
        &self,
        cmd: &mut Self::CommandBuffer,
    ) -> anyhow::Result<Option<Self::SwapchainImage>>;

    fn begin_render_pass<'a>(
        &'a self,
        cmd: &'a mut Self::CommandBuffer,
        color: &Self::SwapchainImage,
        depth: Option<&Self::Texture>,
        clear: PassClear,
    ) -> anyhow::Result<Self::RenderPass<'a>>;

    /// Hands the command buffer to the queue and presents any acquired image.
    fn submit(&self, cmd: Self::CommandBuffer);

    /// Discards a command buffer without executing it.
    fn cancel(&self, cmd: Self::CommandBuffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bounds() {
        assert!(TextureRegion::full(4, 4).fits_in(4, 4));
        let region = TextureRegion {
            x: 2,
            y: 1,
            width: 2,
            height: 3,
        };
        assert!(region.fits_in(4, 4));
        assert!(!region.fits_in(3, 4));
        assert!(!TextureRegion::full(0, 1).fits_in(4, 4));
        let overflow = TextureRegion {
            x: u32::MAX,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(!overflow.fits_in(4, 4));
    }

    #[test]
    fn uploads_need_copy_dst() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index, BufferUsage::Storage] {
            assert!(usage.wgpu_usages().contains(wgpu::BufferUsages::COPY_DST));
        }
        assert!(!TextureUsage::DepthStencilTarget
            .wgpu_usages()
            .contains(wgpu::TextureUsages::COPY_DST));
    }
}
