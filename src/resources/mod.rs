//! GPU resource primitives.
//!
//! Each wrapper owns one device object, borrows the device it came from and
//! releases the object when dropped. Uploads go through [`CommandScope`] and a
//! transient staging buffer per call.

pub mod buffer;
pub mod command;
pub mod sampler;
pub mod shader;
pub mod staging;
pub mod texture;

pub use buffer::Buffer;
pub use command::CommandScope;
pub use sampler::{MaterialBindings, Sampler};
pub use shader::Shader;
pub use texture::Texture;
