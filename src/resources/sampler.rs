//! Samplers and per-material sampler bindings.

use crate::device::{GpuDevice, SamplerDesc};
use crate::resources::texture::Texture;

/// The shared sampler: linear filtering and mipmapping, repeat addressing.
pub struct Sampler<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::Sampler,
}

impl<'d, D: GpuDevice> Sampler<'d, D> {
    pub fn new(device: &'d D) -> anyhow::Result<Self> {
        Self::with_desc(device, &SamplerDesc::default())
    }

    pub fn with_desc(device: &'d D, desc: &SamplerDesc) -> anyhow::Result<Self> {
        let raw = device.create_sampler(desc)?;
        Ok(Self { device, raw })
    }

    pub fn raw(&self) -> &D::Sampler {
        &self.raw
    }
}

impl<D: GpuDevice> Drop for Sampler<'_, D> {
    fn drop(&mut self) {
        self.device.release_sampler(&self.raw);
    }
}

/// The sampler-texture pairs of one material, bound together in a draw.
pub struct MaterialBindings<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::SamplerBindings,
}

impl<'d, D: GpuDevice> MaterialBindings<'d, D> {
    pub fn new(
        device: &'d D,
        textures: &[&Texture<'d, D>],
        sampler: &Sampler<'d, D>,
    ) -> anyhow::Result<Self> {
        let raws: Vec<&D::Texture> = textures.iter().map(|t| t.raw()).collect();
        let raw = device.create_sampler_bindings(&raws, sampler.raw())?;
        Ok(Self { device, raw })
    }

    pub fn raw(&self) -> &D::SamplerBindings {
        &self.raw
    }
}

impl<D: GpuDevice> Drop for MaterialBindings<'_, D> {
    fn drop(&mut self) {
        self.device.release_sampler_bindings(&self.raw);
    }
}
