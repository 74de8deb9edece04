//! The seam between the renderer core and the Vulkan driver.
//!
//! Everything the core needs from the API goes through [`InstanceApi`] and
//! [`DeviceApi`]. [`vulkan`] implements them over `vulkanalia`; the unit tests
//! implement them with a fake that tracks every handle it hands out.

pub mod vulkan;

use std::collections::HashSet;

use vulkanalia::vk;

/// Result of a driver call that either succeeds or reports an error code.
pub type GpuResult<T> = Result<T, vk::ErrorCode>;

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters for opening a logical device.
#[derive(Clone, Debug)]
pub struct DeviceRequest {
    /// One queue is requested from each of these (unique) families.
    pub queue_families: Vec<u32>,
    pub extensions: Vec<vk::ExtensionName>,
}

#[derive(Clone, Debug)]
pub struct SwapchainRequest {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub old_swapchain: vk::SwapchainKHR,
}

/// Everything needed to record one frame's draw into a command buffer.
#[derive(Clone, Debug)]
pub struct DrawRecording {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_type: vk::IndexType,
    pub index_count: u32,
    pub descriptor_set: Option<vk::DescriptorSet>,
    pub clear_color: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct FrameSubmission {
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub command_buffer: vk::CommandBuffer,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

#[derive(Clone, Debug)]
pub struct PresentRequest {
    pub wait_semaphore: vk::Semaphore,
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
}

/// Instance-level queries, all scoped to the one presentation surface.
pub trait InstanceApi {
    type Device: DeviceApi;

    fn surface(&self) -> vk::SurfaceKHR;

    fn enumerate_physical_devices(&self) -> GpuResult<Vec<vk::PhysicalDevice>>;

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties;

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;

    /// Presentation support is surface specific, so it is asked per family.
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> GpuResult<bool>;

    fn device_extensions(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> GpuResult<HashSet<vk::ExtensionName>>;

    /// Queried fresh on every call; capabilities follow the window.
    fn swapchain_support(&self, physical_device: vk::PhysicalDevice)
    -> GpuResult<SwapchainSupport>;

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> GpuResult<Self::Device>;
}

/// Device-level operations used by the swapchain manager and frame loop.
pub trait DeviceApi {
    fn queue(&self, queue_family_index: u32) -> vk::Queue;

    fn wait_idle(&self) -> GpuResult<()>;

    fn create_swapchain(&self, request: &SwapchainRequest) -> GpuResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> GpuResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn create_image_view(&self, image: vk::Image, format: vk::Format)
    -> GpuResult<vk::ImageView>;
    fn destroy_image_view(&self, image_view: vk::ImageView);

    fn create_render_pass(&self, format: vk::Format) -> GpuResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> GpuResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_command_pool(&self, queue_family_index: u32) -> GpuResult<vk::CommandPool>;
    fn allocate_command_buffers(
        &self,
        command_pool: vk::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<vk::CommandBuffer>>;
    fn destroy_command_pool(&self, command_pool: vk::CommandPool);
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> GpuResult<()>;
    fn record_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        recording: &DrawRecording,
    ) -> GpuResult<()>;

    fn create_semaphore(&self) -> GpuResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Blocks without a timeout until the fence is signaled.
    fn wait_for_fence(&self, fence: vk::Fence) -> GpuResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()>;

    /// Returns the image index plus `SUCCESS` or `SUBOPTIMAL_KHR`.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> GpuResult<(u32, vk::SuccessCode)>;

    fn queue_submit(&self, queue: vk::Queue, submission: &FrameSubmission) -> GpuResult<()>;

    fn queue_present(
        &self,
        queue: vk::Queue,
        request: &PresentRequest,
    ) -> GpuResult<vk::SuccessCode>;
}
