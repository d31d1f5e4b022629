//! Error types.
//!
//! Two severities exist. [`FatalError`] covers the foundations every later
//! operation depends on (device, window claim, shaders, pipeline, sampler,
//! command buffers, swapchain). Callers report it and terminate.
//!
//! Everything else is recoverable: [`MeshError`] for registry operations and
//! mesh uploads, [`LightError`] for the bounded point-light list. These are
//! returned as values and must be checked by the caller.

use thiserror::Error;

/// Unrecoverable failure of a foundational GPU object.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("invalid renderer configuration: {0}")]
    Config(String),
    #[error("could not create GPU device: {0}")]
    DeviceCreation(String),
    #[error("could not claim window for GPU device: {0}")]
    WindowClaim(String),
    #[error("could not create shader `{path}`: {reason}")]
    Shader { path: String, reason: String },
    #[error("could not create graphics pipeline: {0}")]
    Pipeline(String),
    #[error("could not create sampler: {0}")]
    Sampler(String),
    #[error("could not create depth texture: {0}")]
    DepthTexture(String),
    #[error("could not create frame data buffer: {0}")]
    FrameBuffer(String),
    #[error("could not acquire command buffer: {0}")]
    CommandBuffer(String),
    #[error("could not acquire swapchain texture: {0}")]
    Swapchain(String),
    #[error("frame recording failed: {0}")]
    Recording(String),
}

impl FatalError {
    /// Formats an `anyhow` chain into a single diagnostic line.
    pub(crate) fn chain(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}

/// Failure of a mesh registry operation.
///
/// `Duplicate` and `NotFound` never mutate the registry. `Upload` and
/// `InvalidDescriptor` are raised before anything is inserted: a failed
/// creation is rolled back completely.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("a mesh named `{0}` already exists")]
    Duplicate(String),
    #[error("no mesh named `{0}`")]
    NotFound(String),
    #[error("mesh `{name}` has an invalid descriptor: {reason}")]
    InvalidDescriptor { name: String, reason: String },
    #[error("uploading mesh `{name}` failed: {reason}")]
    Upload { name: String, reason: String },
}

/// Rejection of a point-light update.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LightError {
    #[error("point light capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },
    #[error("point lights are disabled in the renderer configuration")]
    Disabled,
}
