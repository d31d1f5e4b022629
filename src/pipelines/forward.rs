//! The forward-lit material pipeline.

use crate::config::RendererConfig;
use crate::device::{DepthState, GpuDevice, PipelineDesc, ShaderStage, VertexLayout};
use crate::error::FatalError;
use crate::resources::{Shader, Texture};

/// Alpha blending: src-alpha / one-minus-src-alpha, added, for color and alpha.
pub const ALPHA_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

/// The compiled forward pipeline.
///
/// Triangle lists, no culling, counter-clockwise front faces, alpha blending
/// and, with the depth buffer enabled, depth test and write with `Less`.
pub struct ForwardPipeline<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::Pipeline,
    vertex_layout: VertexLayout,
    depth: bool,
}

impl<'d, D: GpuDevice> ForwardPipeline<'d, D> {
    pub fn new(device: &'d D, config: &RendererConfig) -> Result<Self, FatalError> {
        let load = |path: std::path::PathBuf, stage, entry: &str| {
            Shader::from_file(device, &path, stage, entry).map_err(|e| FatalError::Shader {
                path: path.display().to_string(),
                reason: FatalError::chain(&e),
            })
        };
        let vertex_shader = load(
            config.vertex_shader(),
            ShaderStage::Vertex,
            &config.shaders.vertex_entry,
        )?;
        let fragment_shader = load(
            config.fragment_shader(),
            ShaderStage::Fragment,
            &config.shaders.fragment_entry,
        )?;

        let vertex_layout = if config.features.tangents {
            VertexLayout::PositionNormalTangentUv
        } else {
            VertexLayout::PositionNormalUv
        };
        let depth = config.features.depth_buffer.then(|| DepthState {
            format: Texture::<D>::DEPTH_FORMAT,
            test: true,
            write: true,
            compare: wgpu::CompareFunction::Less,
        });

        let raw = device
            .create_pipeline(&PipelineDesc {
                label: "forward pipeline",
                vertex_shader: vertex_shader.raw(),
                fragment_shader: fragment_shader.raw(),
                vertex_layout,
                color_format: device.color_target_format(),
                blend: Some(ALPHA_BLENDING),
                depth,
            })
            .map_err(|e| FatalError::Pipeline(FatalError::chain(&e)))?;
        log::info!(
            "Created forward pipeline ({:?}, depth buffer {})",
            vertex_layout,
            if depth.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            device,
            raw,
            vertex_layout,
            depth: depth.is_some(),
        })
    }

    pub fn raw(&self) -> &D::Pipeline {
        &self.raw
    }

    pub fn vertex_layout(&self) -> VertexLayout {
        self.vertex_layout
    }

    pub fn has_depth(&self) -> bool {
        self.depth
    }
}

impl<D: GpuDevice> Drop for ForwardPipeline<'_, D> {
    fn drop(&mut self) {
        self.device.release_pipeline(&self.raw);
    }
}
