//! A device that records every call instead of talking to a GPU.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::PathBuf;

use forward_core::RendererConfig;
use forward_core::device::{
    BufferDesc, BufferUsage, GpuDevice, PassClear, PipelineDesc, RenderPassEncoder, SamplerDesc,
    ShaderDesc, ShaderStage, TextureCopy, TextureDesc, TextureRegion,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateBuffer { id: u32, usage: BufferUsage, size: u64 },
    CreateStaging { id: u32, size: u64 },
    CreateTexture { id: u32, width: u32, height: u32, format: wgpu::TextureFormat },
    CreateSampler { id: u32 },
    CreateShader { id: u32, stage: ShaderStage },
    CreatePipeline { id: u32 },
    CreateBindings { id: u32, textures: Vec<u32> },
    Release { id: u32 },
    AcquireCommandBuffer { cmd: u32 },
    CopyToBuffer { cmd: u32, dst: u32, offset: u64, data: Vec<u8> },
    CopyToTexture { cmd: u32, dst: u32, region: TextureRegion, bytes_per_row: u32, data: Vec<u8> },
    AcquireSwapchain { cmd: u32 },
    ReserveDraws { draws: u32 },
    BeginRenderPass { cmd: u32, clear: wgpu::Color, depth: Option<(u32, u32)> },
    BindPipeline { id: u32 },
    BindSamplers { id: u32 },
    BindStorage { slot: u32, buffer: u32 },
    BindVertex { buffer: u32 },
    BindIndex { buffer: u32 },
    PushVertexUniform { slot: u32, data: Vec<u8> },
    DrawIndexed { index_count: u32, instance_count: u32 },
    EndRenderPass { cmd: u32 },
    Submit { cmd: u32 },
    Cancel { cmd: u32 },
}

#[derive(Debug)]
pub struct RecBuffer {
    pub id: u32,
    pub size: u64,
}

#[derive(Debug)]
pub struct RecTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct RecStaging {
    pub id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct RecHandle {
    pub id: u32,
}

#[derive(Debug)]
pub struct RecCommandBuffer {
    pub id: u32,
}

#[derive(Debug)]
pub struct RecImage {
    pub cmd: u32,
}

pub struct RecordingPass<'a> {
    device: &'a RecordingDevice,
    cmd: &'a mut RecCommandBuffer,
}

/// Records calls; allocation failures and a minimized window can be simulated.
pub struct RecordingDevice {
    events: RefCell<Vec<Event>>,
    next_id: Cell<u32>,
    live: RefCell<BTreeSet<u32>>,
    pass_open: Cell<bool>,
    swapchain_available: Cell<bool>,
    textures_before_failure: Cell<Option<usize>>,
    fail_staging: Cell<bool>,
    pub copy_alignment: u64,
    pub row_alignment: u32,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            live: RefCell::new(BTreeSet::new()),
            pass_open: Cell::new(false),
            swapchain_available: Cell::new(true),
            textures_before_failure: Cell::new(None),
            fail_staging: Cell::new(false),
            copy_alignment: 4,
            row_alignment: 1,
        }
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pads staged texture rows like a real backend does.
    pub fn with_row_alignment(row_alignment: u32) -> Self {
        Self {
            row_alignment,
            ..Self::default()
        }
    }

    fn id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn alloc(&self) -> u32 {
        let id = self.id();
        self.live.borrow_mut().insert(id);
        id
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn release(&self, id: u32) {
        assert!(self.live.borrow_mut().remove(&id), "object {id} released twice");
        self.record(Event::Release { id });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Ids of objects created and not yet released.
    pub fn live_objects(&self) -> BTreeSet<u32> {
        self.live.borrow().clone()
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.swapchain_available.set(!minimized);
    }

    /// Lets `count` texture creations succeed, then fails every further one.
    pub fn fail_textures_after(&self, count: usize) {
        self.textures_before_failure.set(Some(count));
    }

    pub fn fail_staging(&self, fail: bool) {
        self.fail_staging.set(fail);
    }

    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::DrawIndexed {
                    index_count,
                    instance_count,
                } => Some((*index_count, *instance_count)),
                _ => None,
            })
            .collect()
    }

    pub fn render_passes(&self) -> Vec<Option<(u32, u32)>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::BeginRenderPass { depth, .. } => Some(*depth),
                _ => None,
            })
            .collect()
    }

    /// Data of every push to `slot`, in order.
    pub fn pushes(&self, slot: u32) -> Vec<Vec<u8>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::PushVertexUniform { slot: s, data } if *s == slot => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matches(e)).count()
    }
}

impl RenderPassEncoder<RecordingDevice> for RecordingPass<'_> {
    fn bind_pipeline(&mut self, pipeline: &RecHandle) {
        self.device.record(Event::BindPipeline { id: pipeline.id });
    }

    fn bind_fragment_samplers(&mut self, bindings: &RecHandle) {
        self.device.record(Event::BindSamplers { id: bindings.id });
    }

    fn bind_fragment_storage_buffer(&mut self, slot: u32, buffer: &RecBuffer) {
        self.device.record(Event::BindStorage {
            slot,
            buffer: buffer.id,
        });
    }

    fn bind_vertex_buffer(&mut self, buffer: &RecBuffer) {
        self.device.record(Event::BindVertex { buffer: buffer.id });
    }

    fn bind_index_buffer(&mut self, buffer: &RecBuffer) {
        self.device.record(Event::BindIndex { buffer: buffer.id });
    }

    fn push_vertex_uniform(&mut self, slot: u32, data: &[u8]) -> anyhow::Result<()> {
        self.device.record(Event::PushVertexUniform {
            slot,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.device.record(Event::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn end(self) {
        self.device.pass_open.set(false);
        self.device.record(Event::EndRenderPass { cmd: self.cmd.id });
    }
}

impl GpuDevice for RecordingDevice {
    type Buffer = RecBuffer;
    type StagingBuffer = RecStaging;
    type Texture = RecTexture;
    type Sampler = RecHandle;
    type Shader = RecHandle;
    type Pipeline = RecHandle;
    type SamplerBindings = RecHandle;
    type CommandBuffer = RecCommandBuffer;
    type SwapchainImage = RecImage;
    type RenderPass<'a> = RecordingPass<'a>;

    fn copy_alignment(&self) -> u64 {
        self.copy_alignment
    }

    fn texture_row_alignment(&self) -> u32 {
        self.row_alignment
    }

    fn max_texture_dimension(&self) -> u32 {
        8192
    }

    fn color_target_format(&self) -> wgpu::TextureFormat {
        wgpu::TextureFormat::Bgra8UnormSrgb
    }

    fn reserve_draws(&self, draws: u32) -> anyhow::Result<()> {
        self.record(Event::ReserveDraws { draws });
        Ok(())
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> anyhow::Result<RecBuffer> {
        let id = self.alloc();
        self.record(Event::CreateBuffer {
            id,
            usage: desc.usage,
            size: desc.size,
        });
        Ok(RecBuffer {
            id,
            size: desc.size,
        })
    }

    fn release_buffer(&self, buffer: &RecBuffer) {
        self.release(buffer.id);
    }

    fn create_staging_buffer(&self, data: &[u8]) -> anyhow::Result<RecStaging> {
        anyhow::ensure!(!self.fail_staging.get(), "out of staging memory");
        let id = self.alloc();
        self.record(Event::CreateStaging {
            id,
            size: data.len() as u64,
        });
        Ok(RecStaging {
            id,
            data: data.to_vec(),
        })
    }

    fn release_staging_buffer(&self, staging: &RecStaging) {
        self.release(staging.id);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> anyhow::Result<RecTexture> {
        if let Some(remaining) = self.textures_before_failure.get() {
            anyhow::ensure!(remaining > 0, "out of texture memory");
            self.textures_before_failure.set(Some(remaining - 1));
        }
        let id = self.alloc();
        self.record(Event::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(RecTexture {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn release_texture(&self, texture: &RecTexture) {
        self.release(texture.id);
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> anyhow::Result<RecHandle> {
        let id = self.alloc();
        self.record(Event::CreateSampler { id });
        Ok(RecHandle { id })
    }

    fn release_sampler(&self, sampler: &RecHandle) {
        self.release(sampler.id);
    }

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<RecHandle> {
        anyhow::ensure!(!desc.code.is_empty(), "empty shader");
        let id = self.alloc();
        self.record(Event::CreateShader {
            id,
            stage: desc.stage,
        });
        Ok(RecHandle { id })
    }

    fn release_shader(&self, shader: &RecHandle) {
        self.release(shader.id);
    }

    fn create_pipeline(&self, _desc: &PipelineDesc<'_, Self>) -> anyhow::Result<RecHandle> {
        let id = self.alloc();
        self.record(Event::CreatePipeline { id });
        Ok(RecHandle { id })
    }

    fn release_pipeline(&self, pipeline: &RecHandle) {
        self.release(pipeline.id);
    }

    fn create_sampler_bindings(
        &self,
        textures: &[&RecTexture],
        _sampler: &RecHandle,
    ) -> anyhow::Result<RecHandle> {
        let id = self.alloc();
        self.record(Event::CreateBindings {
            id,
            textures: textures.iter().map(|t| t.id).collect(),
        });
        Ok(RecHandle { id })
    }

    fn release_sampler_bindings(&self, bindings: &RecHandle) {
        self.release(bindings.id);
    }

    fn acquire_command_buffer(&self) -> anyhow::Result<RecCommandBuffer> {
        let cmd = self.id();
        self.record(Event::AcquireCommandBuffer { cmd });
        Ok(RecCommandBuffer { id: cmd })
    }

    fn copy_to_buffer(
        &self,
        cmd: &mut RecCommandBuffer,
        src: &RecStaging,
        dst: &RecBuffer,
        dst_offset: u64,
        size: u64,
    ) {
        assert!(!self.pass_open.get(), "copy pass recorded inside a render pass");
        assert_eq!(size, src.data.len() as u64);
        assert!(dst_offset + size <= dst.size, "copy out of bounds");
        self.record(Event::CopyToBuffer {
            cmd: cmd.id,
            dst: dst.id,
            offset: dst_offset,
            data: src.data.clone(),
        });
    }

    fn copy_to_texture(
        &self,
        cmd: &mut RecCommandBuffer,
        src: &RecStaging,
        dst: &RecTexture,
        copy: TextureCopy,
    ) {
        assert!(!self.pass_open.get(), "copy pass recorded inside a render pass");
        assert!(copy.region.fits_in(dst.width, dst.height));
        assert_eq!(
            src.data.len(),
            copy.bytes_per_row as usize * copy.region.height as usize
        );
        self.record(Event::CopyToTexture {
            cmd: cmd.id,
            dst: dst.id,
            region: copy.region,
            bytes_per_row: copy.bytes_per_row,
            data: src.data.clone(),
        });
    }

    fn acquire_swapchain_image(
        &self,
        cmd: &mut RecCommandBuffer,
    ) -> anyhow::Result<Option<RecImage>> {
        self.record(Event::AcquireSwapchain { cmd: cmd.id });
        Ok(self
            .swapchain_available
            .get()
            .then_some(RecImage { cmd: cmd.id }))
    }

    fn begin_render_pass<'a>(
        &'a self,
        cmd: &'a mut RecCommandBuffer,
        color: &RecImage,
        depth: Option<&RecTexture>,
        clear: PassClear,
    ) -> anyhow::Result<RecordingPass<'a>> {
        assert_eq!(color.cmd, cmd.id, "swapchain image from another command buffer");
        assert!(!self.pass_open.get(), "render pass already open");
        self.pass_open.set(true);
        self.record(Event::BeginRenderPass {
            cmd: cmd.id,
            clear: clear.color,
            depth: depth.map(|d| (d.width, d.height)),
        });
        Ok(RecordingPass { device: self, cmd })
    }

    fn submit(&self, cmd: RecCommandBuffer) {
        assert!(!self.pass_open.get(), "submitted with an open render pass");
        self.record(Event::Submit { cmd: cmd.id });
    }

    fn cancel(&self, cmd: RecCommandBuffer) {
        assert!(!self.pass_open.get(), "cancelled with an open render pass");
        self.record(Event::Cancel { cmd: cmd.id });
    }
}

/// Default configuration with shader paths resolved against the crate root.
pub fn test_config() -> RendererConfig {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = RendererConfig::default();
    config.shaders.dir = root.join("shaders");
    config
}
