use log::debug;
use vulkanalia::prelude::v1_0::*;

use crate::error::{RendererError, Result, VkResultExt};
use crate::gpu::DeviceApi;
use crate::swapchain::Swapchain;

/// The render pass and one framebuffer per swapchain image view.
pub struct RenderTargets {
    pub render_pass: vk::RenderPass,
    /// Format the render pass was built for.
    pub format: vk::Format,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl RenderTargets {
    pub fn create<D: DeviceApi>(device: &D, swapchain: &Swapchain) -> Result<Self> {
        let format = swapchain.surface_format.format;
        let render_pass = device
            .create_render_pass(format)
            .or_fatal("vkCreateRenderPass")?;

        let mut targets = Self {
            render_pass,
            format,
            framebuffers: Vec::new(),
        };
        if let Err(error) = targets.create_framebuffers(device, swapchain) {
            targets.destroy(device);
            return Err(error);
        }
        Ok(targets)
    }

    fn create_framebuffers<D: DeviceApi>(&mut self, device: &D, swapchain: &Swapchain) -> Result<()> {
        self.framebuffers.reserve(swapchain.views.len());
        for view in &swapchain.views {
            match device.create_framebuffer(self.render_pass, *view, swapchain.extent) {
                Ok(framebuffer) => self.framebuffers.push(framebuffer),
                Err(code) => {
                    self.destroy_framebuffers(device);
                    return Err(RendererError::Vulkan {
                        operation: "vkCreateFramebuffer",
                        code,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn destroy_framebuffers<D: DeviceApi>(&mut self, device: &D) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
    }

    /// Rebuilds the framebuffers for a new chain. Returns `true` when the
    /// surface format changed and the render pass had to be replaced.
    pub fn rebuild<D: DeviceApi>(&mut self, device: &D, swapchain: &Swapchain) -> Result<bool> {
        self.destroy_framebuffers(device);

        let format = swapchain.surface_format.format;
        let format_changed = format != self.format;
        if format_changed {
            debug!("Surface format changed {:?} -> {:?}.", self.format, format);
            let render_pass = device
                .create_render_pass(format)
                .or_fatal("vkCreateRenderPass")?;
            device.destroy_render_pass(self.render_pass);
            self.render_pass = render_pass;
            self.format = format;
        }

        self.create_framebuffers(device, swapchain)?;
        Ok(format_changed)
    }

    pub fn destroy<D: DeviceApi>(&mut self, device: &D) {
        self.destroy_framebuffers(device);
        if !self.render_pass.is_null() {
            device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }
    }
}
