//! Checks the bundled WGSL against the bind group and vertex layouts the
//! device creates, without needing a GPU.

use std::path::Path;

use forward_core::context::{FRAME_BLOCK_MIN_BINDING_SIZE, PUSH_SLOT_SIZE};
use forward_core::data_structures::light::frame_block_size;
use forward_core::device::{VertexLayout, uniform_slot};
use forward_core::pipelines::vertex_buffer_layout;
use wgpu::naga;

fn load(name: &str) -> naga::Module {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders").join(name);
    let source = std::fs::read_to_string(&path).unwrap();
    let module = naga::front::wgsl::parse_str(&source)
        .unwrap_or_else(|e| panic!("{}: {}", name, e.emit_to_string(&source)));
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{}: {:?}", name, e));
    module
}

/// Binding size of every resource global, keyed by (group, binding).
fn binding_sizes(module: &naga::Module) -> Vec<((u32, u32), String, u64)> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, global)| {
            let binding = global.binding.as_ref()?;
            let size = module.types[global.ty].inner.size(module.to_ctx()) as u64;
            Some((
                (binding.group, binding.binding),
                global.name.clone().unwrap_or_default(),
                size,
            ))
        })
        .collect()
}

fn vertex_format(module: &naga::Module, ty: naga::Handle<naga::Type>) -> wgpu::VertexFormat {
    match module.types[ty].inner {
        naga::TypeInner::Vector {
            size: naga::VectorSize::Tri,
            scalar: naga::Scalar::F32,
        } => wgpu::VertexFormat::Float32x3,
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar: naga::Scalar::F32,
        } => wgpu::VertexFormat::Float32x2,
        ref other => panic!("unexpected vertex input type {:?}", other),
    }
}

/// (location, format) of every input of the vertex entry point.
fn vertex_inputs(module: &naga::Module, entry: &str) -> Vec<(u32, wgpu::VertexFormat)> {
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry)
        .unwrap();
    let mut inputs = Vec::new();
    for argument in &entry_point.function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), _) => {
                inputs.push((*location, vertex_format(module, argument.ty)));
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = member.binding {
                        inputs.push((location, vertex_format(module, member.ty)));
                    }
                }
            }
            _ => {}
        }
    }
    inputs.sort_unstable_by_key(|(location, _)| *location);
    inputs
}

fn layout_attributes(layout: VertexLayout) -> Vec<(u32, wgpu::VertexFormat)> {
    let mut attributes: Vec<_> = vertex_buffer_layout(layout)
        .attributes
        .iter()
        .map(|a| (a.shader_location, a.format))
        .collect();
    attributes.sort_unstable_by_key(|(location, _)| *location);
    attributes
}

#[test]
fn frame_block_fits_the_storage_layout() {
    for name in ["forward.wgsl", "forward_tangent.wgsl"] {
        let module = load(name);
        let (_, _, size) = binding_sizes(&module)
            .into_iter()
            .find(|(binding, _, _)| *binding == (2, 0))
            .unwrap();
        assert!(
            size <= FRAME_BLOCK_MIN_BINDING_SIZE,
            "{name}: frame block needs {size} bytes, layout guarantees {FRAME_BLOCK_MIN_BINDING_SIZE}"
        );
    }
    // A frame buffer without point lights still satisfies the layout.
    assert!(frame_block_size(0) >= FRAME_BLOCK_MIN_BINDING_SIZE);
}

#[test]
fn pushed_uniforms_fit_their_slots() {
    for name in ["forward.wgsl", "forward_tangent.wgsl"] {
        let module = load(name);
        let mut pushed: Vec<(u32, String)> = binding_sizes(&module)
            .into_iter()
            .filter(|((group, _), _, _)| *group == 1)
            .map(|((_, binding), global, size)| {
                assert!(size <= PUSH_SLOT_SIZE, "{name}: {global} is {size} bytes");
                (binding, global)
            })
            .collect();
        pushed.sort_unstable();
        assert_eq!(
            pushed,
            vec![
                (uniform_slot::PROJECTION, "projection".to_string()),
                (uniform_slot::MODEL, "model".to_string()),
                (uniform_slot::VIEW, "view".to_string()),
            ]
        );
    }
}

#[test]
fn material_bindings_match_the_material_layout() {
    for name in ["forward.wgsl", "forward_tangent.wgsl"] {
        let module = load(name);
        let mut material: Vec<(u32, u32)> = binding_sizes(&module)
            .into_iter()
            .filter(|((group, _), _, _)| *group == 0)
            .map(|(binding, _, _)| binding)
            .collect();
        material.sort_unstable();
        assert_eq!(material, vec![(0, 0), (0, 1), (0, 2), (0, 3)], "{name}");
    }
}

#[test]
fn vertex_inputs_match_the_buffer_layouts() {
    assert_eq!(
        vertex_inputs(&load("forward_tangent.wgsl"), "vs_main"),
        layout_attributes(VertexLayout::PositionNormalTangentUv)
    );
    assert_eq!(
        vertex_inputs(&load("forward.wgsl"), "vs_main"),
        layout_attributes(VertexLayout::PositionNormalUv)
    );
}

#[test]
fn tangent_shader_cannot_run_on_the_plain_layout() {
    let inputs = vertex_inputs(&load("forward_tangent.wgsl"), "vs_main");
    let provided = layout_attributes(VertexLayout::PositionNormalUv);
    assert!(inputs.iter().any(|input| !provided.contains(input)));
}
