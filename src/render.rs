//! Frame orchestration.
//!
//! [`Renderer`] owns every device resource of the forward renderer (the mesh
//! registry, the frame storage block, the depth target, the pipeline and the
//! shared sampler) and records one frame per [`Renderer::render_frame`] call.
//!
//! # Frame states
//!
//! ```text
//! Idle -> CmdBufAcquired -> SwapchainAcquired -> RenderPassActive -> Submitted -> Idle
//!                        \-> MinimizedSkip -> Idle
//! ```
//!
//! Uploads (mesh creation, the per-frame storage block) are recorded as copy
//! passes before the render pass begins, so everything a draw references has
//! been transferred earlier on the same or an earlier command buffer.

use cgmath::{Matrix4, Point3};

use crate::camera::{CameraState, Projection, matrix_bytes};
use crate::config::RendererConfig;
use crate::data_structures::light::{PointLight, PointLights, frame_block_size};
use crate::data_structures::mesh::{Mesh, MeshDescriptor};
use crate::data_structures::registry::MeshRegistry;
use crate::device::{
    BufferUsage, FRAME_DATA_STORAGE_SLOT, GpuDevice, PassClear, RenderPassEncoder, uniform_slot,
};
use crate::error::{FatalError, LightError, MeshError};
use crate::pipelines::forward::ForwardPipeline;
use crate::resources::{Buffer, CommandScope, Sampler, Texture};

/// Where the orchestrator is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Idle,
    CmdBufAcquired,
    SwapchainAcquired,
    MinimizedSkip,
    RenderPassActive,
    Submitted,
}

/// Result of one [`Renderer::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A render pass was recorded and submitted.
    Rendered { draw_calls: u32 },
    /// No swapchain image was available; an empty command buffer was submitted.
    Skipped,
}

/// The forward renderer.
///
/// Fields drop in declaration order, so teardown releases the meshes, the frame
/// block, the depth target, the pipeline and the sampler, in that order. The
/// device is only borrowed and is released by its owner afterwards.
pub struct Renderer<'d, D: GpuDevice> {
    meshes: MeshRegistry<'d, D>,
    frame_buffer: Buffer<'d, D>,
    depth: Option<Texture<'d, D>>,
    pipeline: ForwardPipeline<'d, D>,
    sampler: Sampler<'d, D>,
    device: &'d D,
    config: RendererConfig,
    projection: Projection,
    camera: CameraState,
    lights: PointLights,
    size: (u32, u32),
    state: FrameState,
    frame_index: u64,
}

impl<'d, D: GpuDevice> Renderer<'d, D> {
    /// Creates the pipeline, sampler, frame block and depth target.
    ///
    /// Every failure here is fatal.
    pub fn new(
        device: &'d D,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, FatalError> {
        config
            .validate()
            .map_err(|e| FatalError::Config(FatalError::chain(&e)))?;

        let sampler =
            Sampler::new(device).map_err(|e| FatalError::Sampler(FatalError::chain(&e)))?;
        let pipeline = ForwardPipeline::new(device, &config)?;

        let capacity = config.point_light_capacity();
        let frame_buffer = Buffer::new(
            device,
            BufferUsage::Storage,
            frame_block_size(capacity),
            "frame data",
        )
        .map_err(|e| FatalError::FrameBuffer(FatalError::chain(&e)))?;

        let depth = Self::create_depth(device, &config, width, height)?;
        let projection = Projection::from_config(width, height, &config.camera);

        log::info!(
            "Renderer ready: {}x{}, {} point lights max",
            width,
            height,
            capacity
        );

        Ok(Self {
            meshes: MeshRegistry::new(),
            frame_buffer,
            depth,
            pipeline,
            sampler,
            device,
            lights: PointLights::new(capacity),
            config,
            projection,
            camera: CameraState::default(),
            size: (width, height),
            state: FrameState::Idle,
            frame_index: 0,
        })
    }

    fn create_depth(
        device: &'d D,
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Option<Texture<'d, D>>, FatalError> {
        if !config.features.depth_buffer || width == 0 || height == 0 {
            return Ok(None);
        }
        Texture::depth_stencil(device, width, height)
            .map(Some)
            .map_err(|e| FatalError::DepthTexture(FatalError::chain(&e)))
    }

    // Meshes

    /// Uploads a mesh and registers it under `name`.
    ///
    /// Vertex data, index data and the three material textures are staged and
    /// copied on one command buffer, which is submitted on success. On failure
    /// the command buffer is cancelled, every object created so far is released
    /// and the registry is left untouched.
    pub fn create_mesh(&mut self, descriptor: &MeshDescriptor, name: &str) -> Result<(), MeshError> {
        if self.meshes.contains(name) {
            log::warn!("Mesh `{}` already exists", name);
            return Err(MeshError::Duplicate(name.to_string()));
        }
        descriptor.validate().map_err(|reason| {
            log::error!("Mesh `{}` rejected: {}", name, reason);
            MeshError::InvalidDescriptor {
                name: name.to_string(),
                reason,
            }
        })?;

        let upload_failed = |e: anyhow::Error| {
            let reason = FatalError::chain(&e);
            log::error!("Creating mesh `{}` failed: {}", name, reason);
            MeshError::Upload {
                name: name.to_string(),
                reason,
            }
        };

        let mut scope = CommandScope::begin(self.device).map_err(upload_failed)?;
        let tangents = self.config.features.tangents;
        let mesh = match Mesh::upload(&mut scope, &self.sampler, descriptor, name, tangents) {
            Ok(mesh) => mesh,
            Err(e) => {
                scope.cancel();
                return Err(upload_failed(e));
            }
        };
        scope.submit();

        self.meshes.insert(name, mesh)?;
        log::debug!(
            "Created mesh `{}` ({} vertices, {} indices)",
            name,
            descriptor.vertices.len(),
            descriptor.indices.len()
        );
        Ok(())
    }

    /// Removes a mesh and releases its device objects.
    ///
    /// Only call between completed frames.
    pub fn delete_mesh(&mut self, name: &str) -> Result<(), MeshError> {
        let mesh = self.meshes.remove(name)?;
        drop(mesh);
        log::debug!("Deleted mesh `{}`", name);
        Ok(())
    }

    /// The model matrix of a mesh. Defaults to identity.
    pub fn mesh_transform_mut(&mut self, name: &str) -> Result<&mut Matrix4<f32>, MeshError> {
        self.meshes.get_mut(name).map(|mesh| &mut mesh.transform)
    }

    pub fn contains_mesh(&self, name: &str) -> bool {
        self.meshes.contains(name)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Mesh names in draw order.
    pub fn mesh_names(&self) -> Vec<String> {
        self.meshes.names().map(str::to_string).collect()
    }

    pub fn meshes(&self) -> &MeshRegistry<'d, D> {
        &self.meshes
    }

    // Camera and lights

    pub fn set_view_matrix(&mut self, view: Matrix4<f32>) {
        self.camera.view = view;
    }

    pub fn set_camera_pos(&mut self, position: Point3<f32>) {
        self.camera.position = position;
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.calc_matrix()
    }

    /// Appends a light. Rejected once the configured capacity is reached.
    pub fn push_point_light(&mut self, light: PointLight) -> Result<(), LightError> {
        self.lights.push(light)
    }

    /// Replaces all lights, or none on error.
    pub fn set_point_lights(&mut self, lights: &[PointLight]) -> Result<(), LightError> {
        self.lights.set(lights)
    }

    pub fn clear_point_lights(&mut self) {
        self.lights.clear();
    }

    pub fn point_lights(&self) -> &[PointLight] {
        self.lights.as_slice()
    }

    // Frame

    /// Follows a drawable resize: new projection aspect, new depth target.
    ///
    /// A zero-area size releases the depth target; frames are skipped until a
    /// non-zero size arrives.
    pub fn handle_resize(&mut self, width: u32, height: u32) -> Result<(), FatalError> {
        log::debug!("Resizing render target to {}x{}", width, height);
        self.size = (width, height);
        self.projection.resize(width, height);
        self.device.resize_swapchain(width, height);
        self.depth = None;
        self.depth = Self::create_depth(self.device, &self.config, width, height)?;
        Ok(())
    }

    /// Records and submits one frame.
    pub fn render_frame(&mut self) -> Result<FrameOutcome, FatalError> {
        let result = self.record_frame();
        self.state = FrameState::Idle;
        result
    }

    fn record_frame(&mut self) -> Result<FrameOutcome, FatalError> {
        let mut scope = CommandScope::begin(self.device)
            .map_err(|e| FatalError::CommandBuffer(FatalError::chain(&e)))?;
        self.state = FrameState::CmdBufAcquired;

        let (width, height) = self.size;
        let image = if width == 0 || height == 0 {
            None
        } else {
            match scope.acquire_swapchain_image() {
                Ok(image) => image,
                Err(e) => {
                    scope.cancel();
                    return Err(FatalError::Swapchain(FatalError::chain(&e)));
                }
            }
        };
        let Some(image) = image else {
            self.state = FrameState::MinimizedSkip;
            log::trace!("No swapchain image, skipping frame");
            scope.submit();
            return Ok(FrameOutcome::Skipped);
        };
        self.state = FrameState::SwapchainAcquired;

        let block = self.lights.frame_block(self.camera.position.into());
        if let Err(e) = self.frame_buffer.upload(&mut scope, &block) {
            scope.cancel();
            return Err(FatalError::Recording(FatalError::chain(&e)));
        }
        let draws = u32::try_from(self.meshes.len()).unwrap_or(u32::MAX);
        if let Err(e) = self.device.reserve_draws(draws) {
            scope.cancel();
            return Err(FatalError::Recording(FatalError::chain(&e)));
        }

        let clear = PassClear {
            color: self.config.frame.clear_colour(),
            depth: 1.0,
            stencil: 0,
        };
        let recorded = match scope.begin_render_pass(&image, self.depth.as_ref().map(Texture::raw), clear)
        {
            Ok(mut pass) => {
                self.state = FrameState::RenderPassActive;
                let recorded = self.record_draws(&mut pass);
                pass.end();
                recorded
            }
            Err(e) => Err(e),
        };
        let draw_calls = match recorded {
            Ok(draw_calls) => draw_calls,
            Err(e) => {
                scope.cancel();
                return Err(FatalError::Recording(FatalError::chain(&e)));
            }
        };

        scope.submit();
        self.state = FrameState::Submitted;
        self.frame_index += 1;
        Ok(FrameOutcome::Rendered { draw_calls })
    }

    fn record_draws(&self, pass: &mut D::RenderPass<'_>) -> anyhow::Result<u32> {
        pass.bind_pipeline(self.pipeline.raw());
        pass.push_vertex_uniform(
            uniform_slot::PROJECTION,
            &matrix_bytes(&self.projection.calc_matrix()),
        )?;
        pass.push_vertex_uniform(uniform_slot::VIEW, &matrix_bytes(&self.camera.view))?;
        pass.bind_fragment_storage_buffer(FRAME_DATA_STORAGE_SLOT, self.frame_buffer.raw());

        let mut draw_calls = 0;
        for (_, mesh) in self.meshes.iter() {
            pass.bind_fragment_samplers(mesh.bindings().raw());
            pass.bind_vertex_buffer(mesh.vertex_buffer().raw());
            pass.bind_index_buffer(mesh.index_buffer().raw());
            pass.push_vertex_uniform(uniform_slot::MODEL, &matrix_bytes(&mesh.transform))?;
            pass.draw_indexed(mesh.index_count(), 1);
            draw_calls += 1;
        }
        Ok(draw_calls)
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Number of frames submitted with a render pass.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Dimensions of the current depth target, if any.
    pub fn depth_size(&self) -> Option<(u32, u32)> {
        self.depth.as_ref().map(Texture::size)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> &'d D {
        self.device
    }
}

impl<D: GpuDevice> Drop for Renderer<'_, D> {
    fn drop(&mut self) {
        log::info!(
            "Releasing renderer ({} meshes, {} frames)",
            self.meshes.len(),
            self.frame_index
        );
    }
}
