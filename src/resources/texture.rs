//! Device textures.
//!
//! [`Texture`] wraps one fixed-size 2D image. Sampled textures are filled
//! through staged copy passes; the depth-stencil texture is a render target
//! with no initial content and is recreated whenever the drawable resizes.

use anyhow::Context as _;

use crate::device::{GpuDevice, TextureCopy, TextureDesc, TextureRegion, TextureUsage};
use crate::resources::command::CommandScope;
use crate::resources::staging::{Staging, pad_rows};

/// A fixed width/height/format/usage device texture.
pub struct Texture<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::Texture,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: TextureUsage,
    label: String,
}

impl<'d, D: GpuDevice> Texture<'d, D> {
    /// Depth-stencil format of the render target.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    /// Creates a texture. Failure is logged and returned; it is not fatal.
    pub fn new(device: &'d D, desc: &TextureDesc<'_>) -> anyhow::Result<Self> {
        let result = Self::allocate(device, desc);
        if let Err(e) = &result {
            log::error!("Failed to create texture `{}`: {:#}", desc.label, e);
        }
        result
    }

    fn allocate(device: &'d D, desc: &TextureDesc<'_>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            desc.width > 0 && desc.height > 0,
            "texture size {}x{} has zero area",
            desc.width,
            desc.height
        );
        let max = device.max_texture_dimension();
        anyhow::ensure!(
            desc.width <= max && desc.height <= max,
            "texture size {}x{} exceeds the device limit of {}",
            desc.width,
            desc.height,
            max
        );
        let raw = device.create_texture(desc)?;
        Ok(Self {
            device,
            raw,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            label: desc.label.to_string(),
        })
    }

    /// Creates the write-only depth-stencil target of the forward pass.
    pub fn depth_stencil(device: &'d D, width: u32, height: u32) -> anyhow::Result<Self> {
        Self::new(
            device,
            &TextureDesc {
                label: "depth_texture",
                width,
                height,
                format: Self::DEPTH_FORMAT,
                usage: TextureUsage::DepthStencilTarget,
            },
        )
    }

    /// Creates a 1x1 sampled texture filled with `rgba`.
    ///
    /// Used for material slots a mesh does not provide.
    pub fn solid_color(
        device: &'d D,
        scope: &mut CommandScope<'d, D>,
        rgba: [u8; 4],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> anyhow::Result<Self> {
        let texture = Self::new(
            device,
            &TextureDesc {
                label,
                width: 1,
                height: 1,
                format,
                usage: TextureUsage::Sampled,
            },
        )?;
        texture.upload(scope, &rgba)?;
        Ok(texture)
    }

    /// Overwrites the whole image with tightly packed texels.
    pub fn upload(&self, scope: &mut CommandScope<'d, D>, pixels: &[u8]) -> anyhow::Result<()> {
        self.upload_region(scope, pixels, TextureRegion::full(self.width, self.height))
    }

    /// Overwrites `region` with tightly packed texels.
    pub fn upload_region(
        &self,
        scope: &mut CommandScope<'d, D>,
        pixels: &[u8],
        region: TextureRegion,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.usage == TextureUsage::Sampled,
            "`{}` is a render target and cannot be uploaded to",
            self.label
        );
        anyhow::ensure!(
            region.fits_in(self.width, self.height),
            "region {:?} is outside of `{}` ({}x{})",
            region,
            self.label,
            self.width,
            self.height
        );
        let texel = self.bytes_per_texel()?;
        let row_bytes = region.width as usize * texel as usize;
        let rows = region.height as usize;
        anyhow::ensure!(
            pixels.len() == row_bytes * rows,
            "`{}` expects {} bytes for {}x{} texels, got {}",
            self.label,
            row_bytes * rows,
            region.width,
            region.height,
            pixels.len()
        );

        let pitch = crate::resources::staging::align_to(
            row_bytes as u64,
            self.device.texture_row_alignment() as u64,
        ) as usize;
        let staged = pad_rows(pixels, row_bytes, rows, pitch);
        let staging = Staging::new(self.device, &staged)
            .with_context(|| format!("failed to stage upload into `{}`", self.label))?;
        scope.copy_to_texture(
            &staging,
            &self.raw,
            TextureCopy {
                region,
                bytes_per_row: pitch as u32,
            },
        )
    }

    fn bytes_per_texel(&self) -> anyhow::Result<u32> {
        self.format
            .block_copy_size(None)
            .with_context(|| format!("{:?} has no single copy size", self.format))
    }

    pub fn raw(&self) -> &D::Texture {
        &self.raw
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<D: GpuDevice> Drop for Texture<'_, D> {
    fn drop(&mut self) {
        log::trace!("Releasing texture `{}`", self.label);
        self.device.release_texture(&self.raw);
    }
}
