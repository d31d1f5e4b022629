use std::borrow::Cow;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use super::{Context, Target, WgpuBuffer, WgpuCommandBuffer, WgpuRenderPass, WgpuShader, WgpuTexture};
use crate::device::{
    BufferDesc, BufferUsage, GpuDevice, PassClear, PipelineDesc, SamplerDesc, ShaderDesc,
    ShaderFormat, TextureCopy, TextureDesc, uniform_slot,
};
use crate::pipelines::{StageModules, mk_render_pipeline, vertex_buffer_layout};

impl GpuDevice for Context {
    type Buffer = WgpuBuffer;
    type StagingBuffer = wgpu::Buffer;
    type Texture = WgpuTexture;
    type Sampler = wgpu::Sampler;
    type Shader = WgpuShader;
    type Pipeline = wgpu::RenderPipeline;
    type SamplerBindings = wgpu::BindGroup;
    type CommandBuffer = WgpuCommandBuffer;
    type SwapchainImage = wgpu::TextureView;
    type RenderPass<'a> = WgpuRenderPass<'a>;

    fn copy_alignment(&self) -> u64 {
        wgpu::COPY_BUFFER_ALIGNMENT
    }

    fn texture_row_alignment(&self) -> u32 {
        wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
    }

    fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn color_target_format(&self) -> wgpu::TextureFormat {
        self.surface_config.borrow().format
    }

    fn resize_swapchain(&self, width: u32, height: u32) {
        self.size.set((width, height));
        if width == 0 || height == 0 {
            return;
        }
        {
            let mut config = self.surface_config.borrow_mut();
            config.width = width;
            config.height = height;
        }
        self.reconfigure();
    }

    fn reserve_draws(&self, draws: u32) -> anyhow::Result<()> {
        self.push.reserve(&self.device, &self.layouts.push, draws)
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> anyhow::Result<WgpuBuffer> {
        self.scoped(desc.label, || {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size,
                usage: desc.usage.wgpu_usages(),
                mapped_at_creation: false,
            });
            let storage_group = (desc.usage == BufferUsage::Storage).then(|| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(desc.label),
                    layout: &self.layouts.frame,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            });
            WgpuBuffer {
                buffer,
                storage_group,
            }
        })
    }

    fn release_buffer(&self, buffer: &WgpuBuffer) {
        buffer.buffer.destroy();
    }

    fn create_staging_buffer(&self, data: &[u8]) -> anyhow::Result<wgpu::Buffer> {
        anyhow::ensure!(!data.is_empty(), "empty staging buffer");
        self.scoped("staging buffer", || {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("staging buffer"),
                    contents: data,
                    usage: wgpu::BufferUsages::COPY_SRC,
                })
        })
    }

    // Recorded copies keep the staging buffer alive until they execute.
    fn release_staging_buffer(&self, _staging: &wgpu::Buffer) {}

    fn create_texture(&self, desc: &TextureDesc<'_>) -> anyhow::Result<WgpuTexture> {
        self.scoped(desc.label, || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: desc.usage.wgpu_usages(),
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            WgpuTexture { texture, view }
        })
    }

    fn release_texture(&self, texture: &WgpuTexture) {
        texture.texture.destroy();
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> anyhow::Result<wgpu::Sampler> {
        self.scoped("material sampler", || {
            self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("material sampler"),
                address_mode_u: desc.address_mode,
                address_mode_v: desc.address_mode,
                address_mode_w: desc.address_mode,
                mag_filter: desc.mag_filter,
                min_filter: desc.min_filter,
                mipmap_filter: desc.mipmap_filter,
                ..Default::default()
            })
        })
    }

    fn release_sampler(&self, _sampler: &wgpu::Sampler) {}

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<WgpuShader> {
        anyhow::ensure!(!desc.code.is_empty(), "shader file is empty");
        let source = match desc.format {
            ShaderFormat::SpirV => {
                anyhow::ensure!(
                    desc.code.len() % 4 == 0,
                    "SPIR-V length {} is not a multiple of 4",
                    desc.code.len()
                );
                wgpu::util::make_spirv(desc.code)
            }
            ShaderFormat::Wgsl => {
                let text = std::str::from_utf8(desc.code).context("WGSL source is not UTF-8")?;
                wgpu::ShaderSource::Wgsl(Cow::Borrowed(text))
            }
        };
        let label = desc.path.display().to_string();
        let module = self.scoped(&label, || {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source,
                })
        })?;
        Ok(WgpuShader {
            module,
            entry_point: desc.entry_point.to_string(),
        })
    }

    fn release_shader(&self, _shader: &WgpuShader) {}

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> anyhow::Result<wgpu::RenderPipeline> {
        self.scoped(desc.label, || {
            mk_render_pipeline(
                &self.device,
                desc.label,
                &self.layouts.pipeline,
                StageModules {
                    vertex: &desc.vertex_shader.module,
                    vertex_entry: &desc.vertex_shader.entry_point,
                    fragment: &desc.fragment_shader.module,
                    fragment_entry: &desc.fragment_shader.entry_point,
                },
                desc.color_format,
                desc.blend,
                desc.depth,
                &[vertex_buffer_layout(desc.vertex_layout)],
            )
        })
    }

    fn release_pipeline(&self, _pipeline: &wgpu::RenderPipeline) {}

    fn create_sampler_bindings(
        &self,
        textures: &[&WgpuTexture],
        sampler: &wgpu::Sampler,
    ) -> anyhow::Result<wgpu::BindGroup> {
        let [albedo, normal, arm] = textures else {
            anyhow::bail!("expected 3 material textures, got {}", textures.len());
        };
        self.scoped("material bind group", || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.layouts.material,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&albedo.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&normal.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&arm.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
                label: Some("material_bind_group"),
            })
        })
    }

    fn release_sampler_bindings(&self, _bindings: &wgpu::BindGroup) {}

    fn acquire_command_buffer(&self) -> anyhow::Result<WgpuCommandBuffer> {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("forward encoder"),
            });
        Ok(WgpuCommandBuffer {
            encoder,
            surface_texture: None,
        })
    }

    fn copy_to_buffer(
        &self,
        cmd: &mut WgpuCommandBuffer,
        src: &wgpu::Buffer,
        dst: &WgpuBuffer,
        dst_offset: u64,
        size: u64,
    ) {
        cmd.encoder
            .copy_buffer_to_buffer(src, 0, &dst.buffer, dst_offset, size);
    }

    fn copy_to_texture(
        &self,
        cmd: &mut WgpuCommandBuffer,
        src: &wgpu::Buffer,
        dst: &WgpuTexture,
        copy: TextureCopy,
    ) {
        let region = copy.region;
        cmd.encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: src,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(copy.bytes_per_row),
                    rows_per_image: Some(region.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn acquire_swapchain_image(
        &self,
        cmd: &mut WgpuCommandBuffer,
    ) -> anyhow::Result<Option<wgpu::TextureView>> {
        let (width, height) = self.size.get();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let surface = match &self.target {
            Target::Window { surface, .. } => surface,
            Target::Offscreen => return self.offscreen_target(width, height).map(Some),
        };
        let surface_texture = match surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture) => texture,
            wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                log::debug!("Surface suboptimal, reconfiguring after present");
                self.suboptimal.set(true);
                texture
            }
            wgpu::CurrentSurfaceTexture::Outdated => {
                log::debug!("Surface outdated, reconfiguring");
                self.reconfigure();
                return Ok(None);
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                log::warn!("Surface timeout");
                return Ok(None);
            }
            wgpu::CurrentSurfaceTexture::Occluded => return Ok(None),
            wgpu::CurrentSurfaceTexture::Lost => anyhow::bail!("surface lost"),
            wgpu::CurrentSurfaceTexture::Validation => {
                anyhow::bail!("validation error while acquiring the surface texture")
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        cmd.surface_texture = Some(surface_texture);
        Ok(Some(view))
    }

    fn begin_render_pass<'a>(
        &'a self,
        cmd: &'a mut WgpuCommandBuffer,
        color: &wgpu::TextureView,
        depth: Option<&WgpuTexture>,
        clear: PassClear,
    ) -> anyhow::Result<WgpuRenderPass<'a>> {
        self.push.rewind();
        let pass = cmd.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Forward Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth.map(|depth| wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.stencil),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        Ok(WgpuRenderPass {
            pass,
            context: self,
            offsets: [0; uniform_slot::COUNT],
        })
    }

    fn submit(&self, cmd: WgpuCommandBuffer) {
        self.queue.submit(std::iter::once(cmd.encoder.finish()));
        if let Some(surface_texture) = cmd.surface_texture {
            if let Some(window) = self.window() {
                window.pre_present_notify();
            }
            surface_texture.present();
            if self.suboptimal.replace(false) {
                self.reconfigure();
            }
        }
    }

    fn cancel(&self, cmd: WgpuCommandBuffer) {
        // an unpresented surface texture is discarded on drop
        drop(cmd);
    }
}

impl Context {
    fn offscreen_target(&self, width: u32, height: u32) -> anyhow::Result<wgpu::TextureView> {
        let format = self.surface_config.borrow().format;
        self.scoped("offscreen target", || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("offscreen target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        })
    }
}
