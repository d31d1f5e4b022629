//! Host-side data: meshes, the mesh registry and point lights.

pub mod light;
pub mod mesh;
pub mod registry;
