//! Camera-facing state.
//!
//! The renderer does not move the camera. It receives a view matrix and camera
//! position every frame and derives the projection from the drawable size.

use cgmath::{Matrix4, Point3, Rad, SquareMatrix, perspective};

use crate::config::CameraConfig;

/// Converts cgmath's OpenGL clip space (z in -1..1) to wgpu's (z in 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Perspective projection that follows the drawable aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
        };
        projection.resize(width, height);
        projection
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(width, height, cgmath::Deg(config.fov_deg), config.near, config.far)
    }

    /// Updates the aspect ratio. Zero-area sizes keep the previous one.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// View matrix and world-space camera position supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub view: Matrix4<f32>,
    pub position: Point3<f32>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Matrix4::identity(),
            position: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

/// Raw bytes of a matrix as pushed to a uniform slot.
pub fn matrix_bytes(matrix: &Matrix4<f32>) -> [u8; 64] {
    let raw: [[f32; 4]; 4] = (*matrix).into();
    bytemuck::cast(raw)
}
