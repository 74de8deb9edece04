//! A Vulkan renderer core: device selection, swapchain management and a
//! frames-in-flight render loop that survives resizes and minimization.

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod instance;
pub mod render_target;
pub mod renderer;
pub mod scene;
pub mod swapchain;
pub mod window;

#[cfg(test)]
mod testing;

pub use error::{RendererError, Result};
