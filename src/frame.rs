use vulkanalia::vk;

use crate::error::{RendererError, Result, VkResultExt};
use crate::gpu::DeviceApi;

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Per-frame command buffer and synchronization objects.
#[derive(Copy, Clone, Debug)]
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first wait on every slot returns at once.
    pub in_flight: vk::Fence,
}

/// Ring of [`MAX_FRAMES_IN_FLIGHT`] slots sharing one command pool.
pub struct FrameRing {
    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameRing {
    pub fn create<D: DeviceApi>(device: &D, graphics_family: u32) -> Result<Self> {
        let command_pool = device
            .create_command_pool(graphics_family)
            .or_fatal("vkCreateCommandPool")?;

        let mut ring = Self {
            command_pool,
            slots: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            current: 0,
        };
        if let Err(error) = ring.create_slots(device) {
            ring.destroy(device);
            return Err(error);
        }
        Ok(ring)
    }

    fn create_slots<D: DeviceApi>(&mut self, device: &D) -> Result<()> {
        let command_buffers = device
            .allocate_command_buffers(self.command_pool, MAX_FRAMES_IN_FLIGHT as u32)
            .or_fatal("vkAllocateCommandBuffers")?;

        for command_buffer in command_buffers {
            let image_available = device.create_semaphore().or_fatal("vkCreateSemaphore")?;
            let render_finished = match device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(code) => {
                    device.destroy_semaphore(image_available);
                    return Err(RendererError::Vulkan {
                        operation: "vkCreateSemaphore",
                        code,
                    });
                }
            };
            let in_flight = match device.create_fence(true) {
                Ok(fence) => fence,
                Err(code) => {
                    device.destroy_semaphore(image_available);
                    device.destroy_semaphore(render_finished);
                    return Err(RendererError::Vulkan {
                        operation: "vkCreateFence",
                        code,
                    });
                }
            };

            self.slots.push(FrameSlot {
                command_buffer,
                image_available,
                render_finished,
                in_flight,
            });
        }

        Ok(())
    }

    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Command buffers are freed along with their pool.
    pub fn destroy<D: DeviceApi>(&mut self, device: &D) {
        for slot in self.slots.drain(..) {
            device.destroy_fence(slot.in_flight);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_semaphore(slot.image_available);
        }
        device.destroy_command_pool(self.command_pool);
    }
}
