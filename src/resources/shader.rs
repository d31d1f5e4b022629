//! Shader stages loaded from disk.

use std::path::Path;

use anyhow::Context as _;

use crate::device::{GpuDevice, ShaderDesc, ShaderFormat, ShaderStage};

/// One compiled shader stage.
///
/// Shaders are only needed while the pipeline is created and are released
/// right after.
pub struct Shader<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::Shader,
    stage: ShaderStage,
}

impl<'d, D: GpuDevice> Shader<'d, D> {
    /// Reads a precompiled stage and compiles it.
    ///
    /// Files with the `spv` extension are SPIR-V bytecode, everything else is
    /// WGSL source.
    pub fn from_file(
        device: &'d D,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> anyhow::Result<Self> {
        let code = std::fs::read(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;
        Self::from_bytes(device, path, &code, stage, entry_point)
    }

    pub fn from_bytes(
        device: &'d D,
        path: &Path,
        code: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> anyhow::Result<Self> {
        let format = shader_format(path);
        let raw = device
            .create_shader(&ShaderDesc {
                path: path.to_path_buf(),
                code,
                format,
                stage,
                entry_point,
            })
            .with_context(|| format!("failed to compile {:?} shader {}", stage, path.display()))?;
        log::debug!("Loaded {:?} shader {} ({:?})", stage, path.display(), format);
        Ok(Self { device, raw, stage })
    }

    pub fn raw(&self) -> &D::Shader {
        &self.raw
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl<D: GpuDevice> Drop for Shader<'_, D> {
    fn drop(&mut self) {
        self.device.release_shader(&self.raw);
    }
}

pub fn shader_format(path: &Path) -> ShaderFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("spv") => ShaderFormat::SpirV,
        _ => ShaderFormat::Wgsl,
    }
}
