//! forward-core
//!
//! GPU resource and frame-rendering core of a real-time 3D demo. The crate
//! creates and releases device resources, stages host data into device memory
//! through copy passes, and records one forward-lit render pass per frame over
//! a flat registry of named meshes, with an optional bounded list of point
//! lights.
//!
//! Window and input handling, model import and camera movement stay with the
//! caller: it hands over a window, mesh descriptors, a view matrix, a camera
//! position and lights, and calls [`Renderer::render_frame`] once per frame.
//!
//! High-level modules
//! - `device`: the [`GpuDevice`] seam every resource and the renderer are generic over
//! - `context`: the `wgpu` implementation of that seam, bound to a window or headless
//! - `resources`: buffers, textures, samplers, shaders, staging and command scopes
//! - `pipelines`: the forward material pipeline
//! - `data_structures`: meshes, the mesh registry, point lights
//! - `camera`: projection and camera state
//! - `render`: the frame orchestrator
//! - `config`, `error`, `logging`: configuration, error types, logger setup
//!
//! ```no_run
//! use std::sync::Arc;
//! use forward_core::{Context, Renderer, RendererConfig};
//!
//! # fn run(window: Arc<winit::window::Window>) -> Result<(), forward_core::FatalError> {
//! let config = RendererConfig::from_file_or_default("renderer.toml");
//! let context = Context::new_blocking(window, &config)?;
//! let (width, height) = context.size();
//! let mut renderer = Renderer::new(&context, config, width, height)?;
//! renderer.render_frame()?;
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod device;
pub mod error;
pub mod logging;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use camera::{CameraState, Projection};
pub use config::RendererConfig;
pub use context::Context;
pub use data_structures::light::PointLight;
pub use data_structures::mesh::{MeshDescriptor, TextureData, TextureSlot, Vertex};
pub use device::{GpuDevice, RenderPassEncoder};
pub use error::{FatalError, LightError, MeshError};
pub use logging::{LoggingConfig, init_logging};
pub use render::{FrameOutcome, FrameState, Renderer};

pub use cgmath;
