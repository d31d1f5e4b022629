//! Graphics pipelines.
//!
//! One pipeline exists: [`forward::ForwardPipeline`], the single supported
//! forward material model. This module also holds the `wgpu` building blocks
//! the context uses to realize it: vertex buffer layouts and the render
//! pipeline descriptor.

pub mod forward;

use crate::data_structures::mesh::{GpuVertex, GpuVertexTangent};
use crate::device::{DepthState, VertexLayout};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 3 => Float32x2];

const VERTEX_TANGENT_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3, 3 => Float32x2];

/// Attribute layout of one vertex buffer.
///
/// Locations: 0 position, 1 normal, 2 tangent (when present), 3 texCoord.
pub fn vertex_buffer_layout(layout: VertexLayout) -> wgpu::VertexBufferLayout<'static> {
    match layout {
        VertexLayout::PositionNormalUv => wgpu::VertexBufferLayout {
            array_stride: size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        },
        VertexLayout::PositionNormalTangentUv => wgpu::VertexBufferLayout {
            array_stride: size_of::<GpuVertexTangent>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_TANGENT_ATTRIBUTES,
        },
    }
}

/// Shader modules and entry points of the two stages.
pub struct StageModules<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment: &'a wgpu::ShaderModule,
    pub fragment_entry: &'a str,
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    stages: StageModules<'_>,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth: Option<DepthState>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: stages.vertex,
            entry_point: Some(stages.vertex_entry),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: stages.fragment,
            entry_point: Some(stages.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth.map(|depth| wgpu::DepthStencilState {
            format: depth.format,
            depth_write_enabled: Some(depth.write),
            depth_compare: Some(if depth.test {
                depth.compare
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
