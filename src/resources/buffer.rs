//! Device buffers.

use anyhow::Context as _;

use crate::device::{BufferDesc, BufferUsage, GpuDevice};
use crate::resources::command::CommandScope;
use crate::resources::staging::{Staging, align_to, pad_to_alignment};

/// A fixed-size, usage-tagged device buffer.
///
/// The buffer borrows its device and releases the device allocation on drop.
pub struct Buffer<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::Buffer,
    usage: BufferUsage,
    size: u64,
    label: String,
}

impl<'d, D: GpuDevice> Buffer<'d, D> {
    /// Allocates a buffer of at least `size` bytes.
    ///
    /// The size is rounded up to the device copy alignment. Failure is logged
    /// and returned; it is not fatal.
    pub fn new(device: &'d D, usage: BufferUsage, size: u64, label: &str) -> anyhow::Result<Self> {
        let result = Self::allocate(device, usage, size, label);
        if let Err(e) = &result {
            log::error!("Failed to create buffer `{}`: {:#}", label, e);
        }
        result
    }

    fn allocate(device: &'d D, usage: BufferUsage, size: u64, label: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(size > 0, "buffer size must be non-zero");
        let size = align_to(size, device.copy_alignment());
        anyhow::ensure!(
            size <= device.max_buffer_size(),
            "{} bytes exceed the device limit of {}",
            size,
            device.max_buffer_size()
        );
        let raw = device.create_buffer(&BufferDesc { label, usage, size })?;
        log::debug!("Created {:?} buffer `{}` ({} bytes)", usage, label, size);
        Ok(Self {
            device,
            raw,
            usage,
            size,
            label: label.to_string(),
        })
    }

    /// Overwrites the start of the buffer with `data`.
    pub fn upload(&self, scope: &mut CommandScope<'d, D>, data: &[u8]) -> anyhow::Result<()> {
        self.upload_at(scope, 0, data)
    }

    /// Overwrites `data.len()` bytes starting at `offset`.
    ///
    /// Stages the bytes in a transient upload buffer and records one copy pass.
    pub fn upload_at(
        &self,
        scope: &mut CommandScope<'d, D>,
        offset: u64,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let alignment = self.device.copy_alignment();
        anyhow::ensure!(!data.is_empty(), "nothing to upload into `{}`", self.label);
        anyhow::ensure!(
            offset % alignment == 0,
            "offset {} into `{}` is not {}-byte aligned",
            offset,
            self.label,
            alignment
        );
        let padded = pad_to_alignment(data, alignment);
        let end = offset
            .checked_add(padded.len() as u64)
            .context("upload range overflows")?;
        anyhow::ensure!(
            end <= self.size,
            "{} bytes at offset {} do not fit into `{}` ({} bytes)",
            data.len(),
            offset,
            self.label,
            self.size
        );

        let staging = Staging::new(self.device, &padded)
            .with_context(|| format!("failed to stage upload into `{}`", self.label))?;
        scope.copy_to_buffer(&staging, &self.raw, offset)
    }

    pub fn raw(&self) -> &D::Buffer {
        &self.raw
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<D: GpuDevice> Drop for Buffer<'_, D> {
    fn drop(&mut self) {
        log::trace!("Releasing buffer `{}`", self.label);
        self.device.release_buffer(&self.raw);
    }
}
