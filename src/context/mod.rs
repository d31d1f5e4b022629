//! The `wgpu` device context.
//!
//! [`Context`] owns the instance, adapter, logical device and queue, and the
//! target frames are presented to: the surface claiming a window's swapchain,
//! or an offscreen texture for a context made with [`Context::new_headless`].
//! It is created once per process, passed explicitly to the renderer, and
//! implements [`crate::device::GpuDevice`].
//!
//! Teardown order follows field order: the push arena and bind layouts, then
//! the target (window claim), then queue and device.

mod device_impl;
mod push;

use std::cell::{Cell, RefCell};
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::config::RendererConfig;
use crate::data_structures::light::frame_block_size;
use crate::error::FatalError;
use push::PushArena;

pub use push::{PUSH_SLOT_SIZE, WgpuRenderPass};

/// Smallest frame storage binding: the header plus one point light, matching
/// the shader's `FrameData` with a one-element runtime array.
pub const FRAME_BLOCK_MIN_BINDING_SIZE: u64 = frame_block_size(1);

/// Color format of the offscreen target of a headless context.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A device buffer; storage buffers carry their frame-data bind group.
#[derive(Debug)]
pub struct WgpuBuffer {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) storage_group: Option<wgpu::BindGroup>,
}

#[derive(Debug)]
pub struct WgpuTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

#[derive(Debug)]
pub struct WgpuShader {
    pub(crate) module: wgpu::ShaderModule,
    pub(crate) entry_point: String,
}

/// A command encoder and the swapchain image acquired on it, if any.
pub struct WgpuCommandBuffer {
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) surface_texture: Option<wgpu::SurfaceTexture>,
}

/// Where frames end up.
pub(crate) enum Target {
    Window {
        surface: wgpu::Surface<'static>,
        window: Arc<Window>,
    },
    /// A color texture allocated per frame at the current size.
    Offscreen,
}

/// Bind group layouts shared by every pipeline.
///
/// Group 0 holds the material textures and sampler, group 1 the pushed vertex
/// uniforms, group 2 the per-frame storage block.
pub(crate) struct BindLayouts {
    pub(crate) material: wgpu::BindGroupLayout,
    pub(crate) push: wgpu::BindGroupLayout,
    pub(crate) frame: wgpu::BindGroupLayout,
    pub(crate) pipeline: wgpu::PipelineLayout,
}

impl BindLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let material = material_layout(device);
        let push = PushArena::layout(device);
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_data_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(FRAME_BLOCK_MIN_BINDING_SIZE),
                },
                count: None,
            }],
        });
        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Forward Pipeline Layout"),
            bind_group_layouts: &[Some(&material), Some(&push), Some(&frame)],
            immediate_size: 0,
        });
        Self {
            material,
            push,
            frame,
            pipeline,
        }
    }
}

/// Albedo, normal and ARM textures at bindings 0..3, the sampler at 3.
fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture(0),
            texture(1),
            texture(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub struct Context {
    pub(crate) push: PushArena,
    pub(crate) layouts: BindLayouts,
    pub(crate) target: Target,
    pub(crate) surface_config: RefCell<wgpu::SurfaceConfiguration>,
    pub(crate) size: Cell<(u32, u32)>,
    /// Set when the last acquired surface texture was suboptimal.
    pub(crate) suboptimal: Cell<bool>,
    pub(crate) queue: wgpu::Queue,
    pub(crate) device: wgpu::Device,
    adapter: wgpu::Adapter,
}

fn new_instance() -> wgpu::Instance {
    log::info!("WGPU setup");
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    config: &RendererConfig,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), FatalError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.device.power_preference.into(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("failed to find a suitable GPU adapter")
        .map_err(|e| FatalError::DeviceCreation(FatalError::chain(&e)))?;
    log::info!("Using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("forward-core device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")
        .map_err(|e| FatalError::DeviceCreation(FatalError::chain(&e)))?;
    Ok((adapter, device, queue))
}

impl Context {
    /// Creates the device and claims `window` for presentation.
    pub async fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self, FatalError> {
        let size = window.inner_size();
        let instance = new_instance();

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")
            .map_err(|e| FatalError::WindowClaim(FatalError::chain(&e)))?;

        let (adapter, device, queue) = request_adapter(&instance, config, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| FatalError::WindowClaim("no supported surface formats".to_string()))?;
        let wanted: wgpu::PresentMode = config.device.present_mode.into();
        let present_mode = if surface_caps.present_modes.contains(&wanted) {
            wanted
        } else {
            log::warn!("{:?} presentation is not supported, using Fifo", wanted);
            wgpu::PresentMode::Fifo
        };
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&device, &surface_config);
        }

        Ok(Self::assemble(
            adapter,
            device,
            queue,
            Target::Window { surface, window },
            surface_config,
            (size.width, size.height),
            config,
        ))
    }

    /// Creates a device without a window. Frames render into an offscreen
    /// [`OFFSCREEN_FORMAT`] target of `width` x `height` pixels.
    pub async fn new_headless(
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, FatalError> {
        let instance = new_instance();
        let (adapter, device, queue) = request_adapter(&instance, config, None).await?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: OFFSCREEN_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        Ok(Self::assemble(
            adapter,
            device,
            queue,
            Target::Offscreen,
            surface_config,
            (width, height),
            config,
        ))
    }

    fn assemble(
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: Target,
        surface_config: wgpu::SurfaceConfiguration,
        size: (u32, u32),
        config: &RendererConfig,
    ) -> Self {
        let layouts = BindLayouts::new(&device);
        let push = PushArena::new(&device, &layouts.push, config.frame.initial_draw_capacity);
        Self {
            push,
            layouts,
            target,
            surface_config: RefCell::new(surface_config),
            size: Cell::new(size),
            suboptimal: Cell::new(false),
            queue,
            device,
            adapter,
        }
    }

    /// [`Context::new`] driven to completion on the current thread.
    pub fn new_blocking(window: Arc<Window>, config: &RendererConfig) -> Result<Self, FatalError> {
        futures::executor::block_on(Self::new(window, config))
    }

    /// [`Context::new_headless`] driven to completion on the current thread.
    pub fn new_headless_blocking(
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, FatalError> {
        futures::executor::block_on(Self::new_headless(config, width, height))
    }

    /// Current drawable size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    /// The presented window; `None` for a headless context.
    pub fn window(&self) -> Option<&Arc<Window>> {
        match &self.target {
            Target::Window { window, .. } => Some(window),
            Target::Offscreen => None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    fn reconfigure(&self) {
        let (width, height) = self.size.get();
        if width == 0 || height == 0 {
            return;
        }
        if let Target::Window { surface, .. } = &self.target {
            surface.configure(&self.device, &self.surface_config.borrow());
        }
    }

    /// Runs `create` inside out-of-memory and validation error scopes and
    /// turns a captured error into `Err`.
    pub(crate) fn scoped<T>(&self, what: &str, create: impl FnOnce() -> T) -> anyhow::Result<T> {
        let out_of_memory = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        let validation = futures::executor::block_on(validation.pop());
        let out_of_memory = futures::executor::block_on(out_of_memory.pop());
        match validation.or(out_of_memory) {
            None => Ok(value),
            Some(e) => Err(anyhow::anyhow!("{e}")).with_context(|| format!("failed to create {what}")),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::info!("Releasing GPU device");
    }
}
