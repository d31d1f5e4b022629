//! Flat registry of named meshes.

use indexmap::IndexMap;

use crate::data_structures::mesh::Mesh;
use crate::device::GpuDevice;
use crate::error::MeshError;

/// Named meshes in insertion order.
///
/// The order is the draw order and survives deletions. Names are unique; a
/// failed operation never mutates the registry.
pub struct MeshRegistry<'d, D: GpuDevice> {
    meshes: IndexMap<String, Mesh<'d, D>>,
}

impl<D: GpuDevice> Default for MeshRegistry<'_, D> {
    fn default() -> Self {
        Self {
            meshes: IndexMap::new(),
        }
    }
}

impl<'d, D: GpuDevice> MeshRegistry<'d, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, mesh: Mesh<'d, D>) -> Result<(), MeshError> {
        if self.meshes.contains_key(name) {
            return Err(MeshError::Duplicate(name.to_string()));
        }
        self.meshes.insert(name.to_string(), mesh);
        Ok(())
    }

    /// Removes a mesh, keeping the relative order of the others.
    pub fn remove(&mut self, name: &str) -> Result<Mesh<'d, D>, MeshError> {
        self.meshes
            .shift_remove(name)
            .ok_or_else(|| MeshError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&Mesh<'d, D>, MeshError> {
        self.meshes
            .get(name)
            .ok_or_else(|| MeshError::NotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Mesh<'d, D>, MeshError> {
        self.meshes
            .get_mut(name)
            .ok_or_else(|| MeshError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    /// Meshes in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mesh<'d, D>)> {
        self.meshes.iter().map(|(name, mesh)| (name.as_str(), mesh))
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}
