//! Renderer configuration.
//!
//! The renderer is one configurable core. Optional capabilities (point lights,
//! per-vertex tangents, the depth buffer) are selected here instead of living in
//! separate code paths. Configuration is plain data and can be loaded from TOML:
//!
//! ```toml
//! [features]
//! point_lights = true
//! tangents = true
//! depth_buffer = true
//!
//! [shaders]
//! dir = "shaders"
//!
//! [camera]
//! fov_deg = 60.0
//!
//! [frame]
//! clear_color = [0.1, 0.15, 0.2, 1.0]
//! max_point_lights = 16
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub features: Features,
    pub shaders: ShaderPaths,
    pub camera: CameraConfig,
    pub frame: FrameConfig,
    pub device: DeviceConfig,
}

/// Optional capabilities of the forward pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Upload a bounded point-light list to the fragment stage every frame.
    pub point_lights: bool,
    /// Add a tangent attribute to the vertex layout (normal mapping).
    pub tangents: bool,
    /// Render with a depth-stencil target and depth testing.
    pub depth_buffer: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            point_lights: true,
            tangents: true,
            depth_buffer: true,
        }
    }
}

/// Bundled shader matching the tangent vertex layout.
pub const TANGENT_SHADER: &str = "forward_tangent.wgsl";
/// Bundled shader matching the layout without tangents.
pub const PLAIN_SHADER: &str = "forward.wgsl";

/// Paths and entry points of the precompiled shader stages.
///
/// Unless a stage is given explicitly, the bundled shader in `dir` that
/// matches the tangent feature is used. Files ending in `.spv` are treated as
/// SPIR-V, everything else as WGSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    pub dir: PathBuf,
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("shaders"),
            vertex: None,
            fragment: None,
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
        }
    }
}

/// Projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Per-frame limits and clear state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Background color in linear RGBA.
    pub clear_color: [f64; 4],
    /// Fixed capacity of the point-light list.
    pub max_point_lights: usize,
    /// Draws the push-uniform arena has room for before it first grows.
    pub initial_draw_capacity: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.15, 0.2, 1.0],
            max_point_lights: 16,
            initial_draw_capacity: 1024,
        }
    }
}

impl FrameConfig {
    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}

/// Swapchain presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

impl From<PresentMode> for wgpu::PresentMode {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Fifo => wgpu::PresentMode::Fifo,
            PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
            PresentMode::Immediate => wgpu::PresentMode::Immediate,
        }
    }
}

/// Adapter preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(pref: PowerPreference) -> Self {
        match pref {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// Device and surface settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub present_mode: PresentMode,
    pub power_preference: PowerPreference,
}

impl RendererConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse renderer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Loads a configuration file, falling back to defaults when it is missing
    /// or invalid.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(config) => {
                log::info!("Loaded renderer config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default renderer config ({:#})", e);
                Self::default()
            }
        }
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let camera = &self.camera;
        anyhow::ensure!(
            camera.fov_deg > 0.0 && camera.fov_deg < 180.0,
            "camera.fov_deg must be in (0, 180), got {}",
            camera.fov_deg
        );
        anyhow::ensure!(
            camera.near > 0.0 && camera.far > camera.near,
            "camera planes must satisfy 0 < near < far, got near={} far={}",
            camera.near,
            camera.far
        );
        anyhow::ensure!(
            !self.features.point_lights || self.frame.max_point_lights > 0,
            "frame.max_point_lights must be at least 1 when point lights are enabled"
        );
        anyhow::ensure!(
            !self.shaders.vertex_entry.is_empty() && !self.shaders.fragment_entry.is_empty(),
            "shader entry points must not be empty"
        );
        let mismatched = if self.features.tangents {
            PLAIN_SHADER
        } else {
            TANGENT_SHADER
        };
        for (stage, path) in [("vertex", &self.shaders.vertex), ("fragment", &self.shaders.fragment)] {
            let bundled_mismatch = path
                .as_deref()
                .and_then(Path::file_name)
                .is_some_and(|name| name == mismatched);
            anyhow::ensure!(
                !bundled_mismatch,
                "shaders.{} is {} but features.tangents is {}",
                stage,
                mismatched,
                self.features.tangents
            );
        }
        Ok(())
    }

    /// The bundled shader for the configured vertex layout.
    fn bundled_shader(&self) -> PathBuf {
        let name = if self.features.tangents {
            TANGENT_SHADER
        } else {
            PLAIN_SHADER
        };
        self.shaders.dir.join(name)
    }

    /// Path of the vertex stage.
    pub fn vertex_shader(&self) -> PathBuf {
        self.shaders
            .vertex
            .clone()
            .unwrap_or_else(|| self.bundled_shader())
    }

    /// Path of the fragment stage.
    pub fn fragment_shader(&self) -> PathBuf {
        self.shaders
            .fragment
            .clone()
            .unwrap_or_else(|| self.bundled_shader())
    }

    /// Number of point lights the frame block has room for.
    pub fn point_light_capacity(&self) -> usize {
        if self.features.point_lights {
            self.frame.max_point_lights
        } else {
            0
        }
    }
}
