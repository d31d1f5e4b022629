//! Push-style vertex uniforms on top of dynamic uniform offsets.
//!
//! Every push writes its bytes into the next free slot of a per-frame uniform
//! arena through the queue and remembers the slot offset. Draws bind the arena
//! with the most recent offset of each uniform slot, so a value pushed once is
//! observed by every following draw until pushed again. The cursor rewinds when
//! a render pass begins.

use std::cell::{Cell, RefCell};
use std::num::NonZeroU64;

use crate::device::{RenderPassEncoder, uniform_slot};

use super::{Context, WgpuBuffer};

/// Largest value one slot holds: a 4x4 f32 matrix.
pub const PUSH_SLOT_SIZE: u64 = 64;

/// Slot count after growing a `current`-slot arena to hold `needed` slots, or
/// `None` when it already fits.
pub(crate) fn grown_slot_count(current: u64, needed: u64) -> Option<u64> {
    if needed <= current {
        return None;
    }
    Some(needed.next_power_of_two().max(current.saturating_mul(2)))
}

struct ArenaStorage {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    slots: u64,
}

pub(crate) struct PushArena {
    storage: RefCell<ArenaStorage>,
    stride: u64,
    cursor: Cell<u64>,
}

impl PushArena {
    pub(crate) fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..uniform_slot::COUNT as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(PUSH_SLOT_SIZE),
                },
                count: None,
            })
            .collect();
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("push_uniform_bind_group_layout"),
            entries: &entries,
        })
    }

    /// Room for the per-pass uniforms plus `initial_draws` model matrices.
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        initial_draws: u32,
    ) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = PUSH_SLOT_SIZE.div_ceil(alignment) * alignment;
        let slots = Self::slots_for(initial_draws);
        Self {
            storage: RefCell::new(Self::allocate(device, layout, stride, slots)),
            stride,
            cursor: Cell::new(0),
        }
    }

    fn slots_for(draws: u32) -> u64 {
        draws as u64 + uniform_slot::COUNT as u64
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        slots: u64,
    ) -> ArenaStorage {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("push_uniform_arena"),
            size: stride * slots,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let binding = wgpu::BufferBinding {
            buffer: &buffer,
            offset: 0,
            size: NonZeroU64::new(PUSH_SLOT_SIZE),
        };
        let entries: Vec<wgpu::BindGroupEntry> = (0..uniform_slot::COUNT as u32)
            .map(|binding_index| wgpu::BindGroupEntry {
                binding: binding_index,
                resource: wgpu::BindingResource::Buffer(binding.clone()),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("push_uniform_bind_group"),
            layout,
            entries: &entries,
        });
        log::debug!("Push uniform arena: {} slots of {} bytes", slots, stride);
        ArenaStorage {
            buffer,
            bind_group,
            slots,
        }
    }

    /// Grows the arena so a pass with `draws` draws fits. Must not be called
    /// while a render pass is recording.
    pub(crate) fn reserve(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        draws: u32,
    ) -> anyhow::Result<()> {
        let current = self.storage.borrow().slots;
        let Some(slots) = grown_slot_count(current, Self::slots_for(draws)) else {
            return Ok(());
        };
        let size = slots * self.stride;
        let max = device.limits().max_buffer_size;
        anyhow::ensure!(
            size <= max,
            "push uniform arena of {} bytes for {} draws exceeds the device limit of {} bytes",
            size,
            draws,
            max
        );
        log::info!("Growing push uniform arena from {} to {} slots", current, slots);
        let grown = Self::allocate(device, layout, self.stride, slots);
        // The old buffer may still be read by an in-flight frame; dropping it
        // defers destruction until that work completes.
        drop(self.storage.replace(grown));
        Ok(())
    }

    pub(crate) fn rewind(&self) {
        self.cursor.set(0);
    }

    /// Writes `data` into the next free slot and returns its offset.
    fn push(&self, queue: &wgpu::Queue, data: &[u8]) -> anyhow::Result<u32> {
        anyhow::ensure!(
            data.len() as u64 <= PUSH_SLOT_SIZE,
            "uniform of {} bytes exceeds the {} byte slot",
            data.len(),
            PUSH_SLOT_SIZE
        );
        let storage = self.storage.borrow();
        let slot = self.cursor.get();
        anyhow::ensure!(
            slot < storage.slots,
            "push uniform arena exhausted after {} pushes this frame",
            storage.slots
        );
        self.cursor.set(slot + 1);

        let offset = slot * self.stride;
        let mut padded = [0u8; PUSH_SLOT_SIZE as usize];
        padded[..data.len()].copy_from_slice(data);
        queue.write_buffer(&storage.buffer, offset, &padded);
        Ok(offset as u32)
    }
}

/// An open render pass on a [`Context`].
pub struct WgpuRenderPass<'a> {
    pub(crate) pass: wgpu::RenderPass<'a>,
    pub(crate) context: &'a Context,
    pub(crate) offsets: [u32; uniform_slot::COUNT],
}

impl RenderPassEncoder<Context> for WgpuRenderPass<'_> {
    fn bind_pipeline(&mut self, pipeline: &wgpu::RenderPipeline) {
        self.pass.set_pipeline(pipeline);
    }

    fn bind_fragment_samplers(&mut self, bindings: &wgpu::BindGroup) {
        self.pass.set_bind_group(0, bindings, &[]);
    }

    fn bind_fragment_storage_buffer(&mut self, _slot: u32, buffer: &WgpuBuffer) {
        match &buffer.storage_group {
            Some(group) => self.pass.set_bind_group(2, group, &[]),
            None => log::warn!("Buffer bound as storage was not created for storage"),
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: &WgpuBuffer) {
        self.pass.set_vertex_buffer(0, buffer.buffer.slice(..));
    }

    fn bind_index_buffer(&mut self, buffer: &WgpuBuffer) {
        self.pass
            .set_index_buffer(buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
    }

    fn push_vertex_uniform(&mut self, slot: u32, data: &[u8]) -> anyhow::Result<()> {
        let index = slot as usize;
        anyhow::ensure!(index < uniform_slot::COUNT, "no vertex uniform slot {}", slot);
        self.offsets[index] = self.context.push.push(&self.context.queue, data)?;
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        let storage = self.context.push.storage.borrow();
        self.pass.set_bind_group(1, &storage.bind_group, &self.offsets);
        self.pass.draw_indexed(0..index_count, 0, 0..instance_count);
    }

    fn end(self) {
        drop(self.pass);
    }
}
