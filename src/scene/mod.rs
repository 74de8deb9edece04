//! The rotating quad drawn by the binary: shaders, pipeline and buffers.

pub mod buffers;
pub mod pipeline;
pub mod shader;

pub use buffers::QuadBuffers;
pub use pipeline::QuadPipeline;
