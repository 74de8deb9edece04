//! `vulkanalia` implementations of the GPU seam.

use std::collections::HashSet;

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{KhrSurfaceExtension, KhrSwapchainExtension};

use super::{
    DeviceApi, DeviceRequest, DrawRecording, FrameSubmission, GpuResult, InstanceApi,
    PresentRequest, SwapchainRequest, SwapchainSupport,
};
use crate::instance::VulkanInstance;

impl InstanceApi for VulkanInstance {
    type Device = VulkanDevice;

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface_handle()
    }

    fn enumerate_physical_devices(&self) -> GpuResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.raw().enumerate_physical_devices() }
    }

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        unsafe { self.raw().get_physical_device_properties(physical_device) }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.raw()
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> GpuResult<bool> {
        unsafe {
            self.raw().get_physical_device_surface_support_khr(
                physical_device,
                queue_family_index,
                self.surface_handle(),
            )
        }
    }

    fn device_extensions(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> GpuResult<HashSet<vk::ExtensionName>> {
        let extensions = unsafe {
            self.raw()
                .enumerate_device_extension_properties(physical_device, None)?
        };
        Ok(extensions.iter().map(|e| e.extension_name).collect())
    }

    fn swapchain_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> GpuResult<SwapchainSupport> {
        let instance = self.raw();
        let surface = self.surface_handle();
        unsafe {
            Ok(SwapchainSupport {
                capabilities: instance
                    .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
                formats: instance.get_physical_device_surface_formats_khr(physical_device, surface)?,
                present_modes: instance
                    .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
            })
        }
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> GpuResult<VulkanDevice> {
        let queue_priorities = &[1.0];
        let queue_infos = request
            .queue_families
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if self.validation_enabled() {
            vec![crate::instance::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let extensions = request
            .extensions
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        let features = vk::PhysicalDeviceFeatures::builder();

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let instance = self.raw();
        let device = unsafe { instance.create_device(physical_device, &info, None)? };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Ok(VulkanDevice {
            device,
            memory_properties,
        })
    }
}

/// An opened `VkDevice` plus the memory layout of its physical device.
pub struct VulkanDevice {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    pub fn raw(&self) -> &Device {
        &self.device
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// # Safety
    /// Every object created from this device must already be destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.device.destroy_device(None) };
    }
}

impl DeviceApi for VulkanDevice {
    fn queue(&self, queue_family_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(queue_family_index, 0) }
    }

    fn wait_idle(&self) -> GpuResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> GpuResult<vk::SwapchainKHR> {
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(request.surface)
            .min_image_count(request.min_image_count)
            .image_format(request.surface_format.format)
            .image_color_space(request.surface_format.color_space)
            .image_extent(request.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(request.sharing_mode)
            .queue_family_indices(&request.queue_family_indices)
            .pre_transform(request.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(request.present_mode)
            .clipped(true)
            .old_swapchain(request.old_swapchain);

        unsafe { self.device.create_swapchain_khr(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> GpuResult<Vec<vk::Image>> {
        unsafe { self.device.get_swapchain_images_khr(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.device.destroy_swapchain_khr(swapchain, None) };
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
    ) -> GpuResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::builder()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1)
                    .build(),
            );

        unsafe { self.device.create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, image_view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(image_view, None) };
    }

    fn create_render_pass(&self, format: vk::Format) -> GpuResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments);

        // Image acquisition finishes at COLOR_ATTACHMENT_OUTPUT, so the layout
        // transition has to wait there too.
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let attachments = &[color_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];
        let info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        unsafe { self.device.create_render_pass(&info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> GpuResult<vk::Framebuffer> {
        let attachments = &[image_view];
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.create_framebuffer(&info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_command_pool(&self, queue_family_index: u32) -> GpuResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn allocate_command_buffers(
        &self,
        command_pool: vk::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&allocate_info) }
    }

    fn destroy_command_pool(&self, command_pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(command_pool, None) };
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> GpuResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }
    }

    fn record_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        recording: &DrawRecording,
    ) -> GpuResult<()> {
        let device = &self.device;
        let info = vk::CommandBufferBeginInfo::builder();

        unsafe {
            device.begin_command_buffer(command_buffer, &info)?;

            let render_area = vk::Rect2D::builder()
                .offset(vk::Offset2D::default())
                .extent(recording.extent);

            let color_clear_value = vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: recording.clear_color,
                },
            };

            let clear_values = &[color_clear_value];
            let begin_info = vk::RenderPassBeginInfo::builder()
                .render_pass(recording.render_pass)
                .framebuffer(recording.framebuffer)
                .render_area(render_area)
                .clear_values(clear_values);

            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                recording.pipeline,
            );

            let viewport = vk::Viewport::builder()
                .x(0.0)
                .y(0.0)
                .width(recording.extent.width as f32)
                .height(recording.extent.height as f32)
                .min_depth(0.0)
                .max_depth(1.0);

            device.cmd_set_viewport(command_buffer, 0, &[viewport]);

            let scissor = vk::Rect2D::builder()
                .offset(vk::Offset2D { x: 0, y: 0 })
                .extent(recording.extent);

            device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            device.cmd_bind_vertex_buffers(command_buffer, 0, &[recording.vertex_buffer], &[0]);
            device.cmd_bind_index_buffer(
                command_buffer,
                recording.index_buffer,
                0,
                recording.index_type,
            );

            if let Some(descriptor_set) = recording.descriptor_set {
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    recording.pipeline_layout,
                    0,
                    &[descriptor_set],
                    &[],
                );
            }

            device.cmd_draw_indexed(command_buffer, recording.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(command_buffer);

            device.end_command_buffer(command_buffer)?;
        }

        Ok(())
    }

    fn create_semaphore(&self) -> GpuResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> GpuResult<(u32, vk::SuccessCode)> {
        unsafe {
            self.device
                .acquire_next_image_khr(swapchain, u64::MAX, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submission: &FrameSubmission) -> GpuResult<()> {
        let command_buffers = &[submission.command_buffer];
        let signal_semaphores = &[submission.signal_semaphore];
        let info = vk::SubmitInfo::builder()
            .wait_semaphores(&submission.wait_semaphores)
            .wait_dst_stage_mask(&submission.wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        unsafe { self.device.queue_submit(queue, &[info], submission.fence) }
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        request: &PresentRequest,
    ) -> GpuResult<vk::SuccessCode> {
        let wait_semaphores = &[request.wait_semaphore];
        let swapchains = &[request.swapchain];
        let image_indices = &[request.image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        unsafe { self.device.queue_present_khr(queue, &present_info) }
    }
}
