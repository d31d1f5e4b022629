#![allow(dead_code)]

pub mod recording;

use forward_core::{MeshDescriptor, TextureData, TextureSlot, Vertex};

/// One triangle with 1x1 textures in every slot.
pub fn triangle() -> MeshDescriptor {
    let n = [0.0, 0.0, 1.0];
    MeshDescriptor::new(
        vec![
            Vertex::new([0.0, 0.0, 0.0], n, [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], n, [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], n, [0.0, 1.0]),
        ],
        vec![0, 1, 2],
    )
    .with_texture(TextureSlot::Albedo, TextureData::solid([255, 0, 0, 255]))
    .with_texture(TextureSlot::Normal, TextureData::solid([127, 127, 255, 255]))
    .with_texture(TextureSlot::Arm, TextureData::solid([255, 128, 0, 255]))
}

/// A triangle without any textures.
pub fn bare_triangle() -> MeshDescriptor {
    let mut mesh = triangle();
    mesh.textures = [None, None, None];
    mesh
}
