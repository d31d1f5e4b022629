//! Point lights and the per-frame storage block.
//!
//! The fragment stage reads one storage block per frame:
//!
//! ```text
//! struct FrameData {
//!     camera_pos: vec3<f32>,
//!     point_light_count: u32,
//!     point_lights: array<PointLight>,
//! }
//! ```
//!
//! The block is rebuilt from the current camera position and light list before
//! every render pass.

use crate::error::LightError;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLight {
    pub position: [f32; 3],
    /// Distance at which the contribution falls off to zero.
    pub radius: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl PointLight {
    pub fn new(position: [f32; 3], color: [f32; 3], intensity: f32, radius: f32) -> Self {
        Self {
            position,
            radius,
            color,
            intensity,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameHeader {
    pub camera_pos: [f32; 3],
    pub point_light_count: u32,
}

/// A point-light list with a fixed capacity.
///
/// Updates beyond the capacity are rejected, never truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLights {
    lights: Vec<PointLight>,
    capacity: usize,
}

impl PointLights {
    /// A capacity of zero means point lights are disabled.
    pub fn new(capacity: usize) -> Self {
        Self {
            lights: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, light: PointLight) -> Result<(), LightError> {
        self.check(self.lights.len() + 1)?;
        self.lights.push(light);
        Ok(())
    }

    /// Replaces the whole list, or leaves it untouched on error.
    pub fn set(&mut self, lights: &[PointLight]) -> Result<(), LightError> {
        if lights.is_empty() {
            self.lights.clear();
            return Ok(());
        }
        self.check(lights.len())?;
        self.lights.clear();
        self.lights.extend_from_slice(lights);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    fn check(&self, count: usize) -> Result<(), LightError> {
        if self.capacity == 0 {
            return Err(LightError::Disabled);
        }
        if count > self.capacity {
            return Err(LightError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Serializes the frame block for the current lights.
    pub fn frame_block(&self, camera_pos: [f32; 3]) -> Vec<u8> {
        let header = FrameHeader {
            camera_pos,
            point_light_count: self.lights.len() as u32,
        };
        let mut bytes = Vec::with_capacity(frame_block_size(self.capacity) as usize);
        bytes.extend_from_slice(bytemuck::bytes_of(&header));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.lights));
        bytes
    }
}

/// Byte size of a frame block with room for `capacity` lights.
///
/// Always leaves room for one light so the light array never binds empty.
pub const fn frame_block_size(capacity: usize) -> u64 {
    let lights = if capacity == 0 { 1 } else { capacity };
    (size_of::<FrameHeader>() + lights * size_of::<PointLight>()) as u64
}
