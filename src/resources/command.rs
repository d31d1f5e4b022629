//! Command buffer scope.
//!
//! [`CommandScope`] wraps one acquired command buffer. Copy passes and the render
//! pass are recorded through it, and it ends either with [`submit`](CommandScope::submit)
//! or [`cancel`](CommandScope::cancel). A render pass mutably borrows the scope,
//! so no copy pass can be recorded while one is open.

use anyhow::Context as _;

use crate::device::{GpuDevice, PassClear, TextureCopy};
use crate::resources::staging::Staging;

pub struct CommandScope<'d, D: GpuDevice> {
    device: &'d D,
    cmd: Option<D::CommandBuffer>,
    copies: usize,
}

impl<'d, D: GpuDevice> CommandScope<'d, D> {
    pub fn begin(device: &'d D) -> anyhow::Result<Self> {
        let cmd = device
            .acquire_command_buffer()
            .context("failed to acquire command buffer")?;
        Ok(Self {
            device,
            cmd: Some(cmd),
            copies: 0,
        })
    }

    pub fn device(&self) -> &'d D {
        self.device
    }

    /// Number of copy passes recorded so far.
    pub fn copy_count(&self) -> usize {
        self.copies
    }

    fn cmd(&mut self) -> anyhow::Result<&mut D::CommandBuffer> {
        self.cmd.as_mut().context("command buffer already finished")
    }

    pub(crate) fn copy_to_buffer(
        &mut self,
        src: &Staging<'_, D>,
        dst: &D::Buffer,
        dst_offset: u64,
    ) -> anyhow::Result<()> {
        let device = self.device;
        let cmd = self.cmd()?;
        device.copy_to_buffer(cmd, src.raw(), dst, dst_offset, src.size());
        self.copies += 1;
        Ok(())
    }

    pub(crate) fn copy_to_texture(
        &mut self,
        src: &Staging<'_, D>,
        dst: &D::Texture,
        copy: TextureCopy,
    ) -> anyhow::Result<()> {
        let device = self.device;
        let cmd = self.cmd()?;
        device.copy_to_texture(cmd, src.raw(), dst, copy);
        self.copies += 1;
        Ok(())
    }

    pub fn acquire_swapchain_image(&mut self) -> anyhow::Result<Option<D::SwapchainImage>> {
        let device = self.device;
        let cmd = self.cmd()?;
        device.acquire_swapchain_image(cmd)
    }

    pub fn begin_render_pass(
        &mut self,
        color: &D::SwapchainImage,
        depth: Option<&D::Texture>,
        clear: PassClear,
    ) -> anyhow::Result<D::RenderPass<'_>> {
        let device = self.device;
        let cmd = self.cmd.as_mut().context("command buffer already finished")?;
        device.begin_render_pass(cmd, color, depth, clear)
    }

    pub fn submit(mut self) {
        if let Some(cmd) = self.cmd.take() {
            self.device.submit(cmd);
        }
    }

    pub fn cancel(mut self) {
        if let Some(cmd) = self.cmd.take() {
            log::debug!("cancelling command buffer after {} copies", self.copies);
            self.device.cancel(cmd);
        }
    }
}

impl<D: GpuDevice> Drop for CommandScope<'_, D> {
    fn drop(&mut self) {
        if let Some(cmd) = self.cmd.take() {
            log::warn!("command buffer dropped without submit or cancel; submitting");
            self.device.submit(cmd);
        }
    }
}
