//! Quad geometry and per-frame uniform buffers.
//!
//! Vertex and index data go through host-visible staging buffers and are
//! copied on the transfer queue. The copy signals a semaphore the first frame
//! waits on, so nothing blocks on the upload. Staging memory is freed once
//! the upload fence has signaled.

use std::time::Instant;

use anyhow::{Result, anyhow};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use log::debug;
use vulkanalia::prelude::v1_0::*;

use crate::device::LogicalDevice;
use crate::frame::MAX_FRAMES_IN_FLIGHT;
use crate::gpu::vulkan::VulkanDevice;
use crate::renderer::{DrawGeometry, FrameUniforms};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    const fn new(pos: [f32; 2], color: [f32; 3]) -> Self {
        Self { pos, color }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(size_of::<[f32; 2]>() as u32)
                .build(),
        ]
    }
}

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: [[f32; 4]; 4],
}

/// Quarter turn every two seconds, squashed so the quad stays square.
pub fn model_matrix(elapsed_secs: f32, extent: vk::Extent2D) -> Mat4 {
    let aspect = if extent.width == 0 {
        1.0
    } else {
        extent.height as f32 / extent.width as f32
    };
    let angle = elapsed_secs * std::f32::consts::FRAC_PI_4;
    Mat4::from_scale(Vec3::new(aspect, 1.0, 1.0)) * Mat4::from_rotation_z(angle)
}

pub fn find_memory_type(
    memory: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    (0..memory.memory_type_count)
        .find(|i| {
            let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
            let memory_type = memory.memory_types[*i as usize];
            suitable && memory_type.property_flags.contains(properties)
        })
        .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
}

#[derive(Copy, Clone, Debug)]
struct Allocation {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
}

impl Allocation {
    /// `queue_families` lists every family touching the buffer; more than
    /// one makes it CONCURRENT.
    fn create(
        device: &VulkanDevice,
        size: u64,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        queue_families: &[u32],
    ) -> Result<Self> {
        let raw = device.raw();
        let mut families = queue_families.to_vec();
        families.sort_unstable();
        families.dedup();

        let mut buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        if families.len() > 1 {
            buffer_info = buffer_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families);
        }

        let buffer = unsafe { raw.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { raw.get_buffer_memory_requirements(buffer) };
        let memory_type = match find_memory_type(device.memory_properties(), requirements, properties)
        {
            Ok(memory_type) => memory_type,
            Err(error) => {
                unsafe { raw.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { raw.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { raw.destroy_buffer(buffer, None) };
                return Err(error.into());
            }
        };

        let allocation = Self { buffer, memory };
        if let Err(error) = unsafe { raw.bind_buffer_memory(buffer, memory, 0) } {
            allocation.destroy(device);
            return Err(error.into());
        }

        Ok(allocation)
    }

    /// Creates a host-visible buffer holding `bytes`.
    fn staging(device: &VulkanDevice, bytes: &[u8]) -> Result<Self> {
        let size = bytes.len() as u64;
        let staging = Self::create(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            &[],
        )?;

        let raw = device.raw();
        unsafe {
            match raw.map_memory(staging.memory, 0, size, vk::MemoryMapFlags::empty()) {
                Ok(memory) => {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), memory.cast(), bytes.len());
                    raw.unmap_memory(staging.memory);
                }
                Err(error) => {
                    staging.destroy(device);
                    return Err(error.into());
                }
            }
        }

        Ok(staging)
    }

    fn destroy(self, device: &VulkanDevice) {
        let raw = device.raw();
        unsafe {
            raw.destroy_buffer(self.buffer, None);
            raw.free_memory(self.memory, None);
        }
    }
}

/// Transfer work that has been submitted but not yet reclaimed.
struct PendingUpload {
    command_pool: vk::CommandPool,
    fence: vk::Fence,
    staging: Vec<Allocation>,
}

impl PendingUpload {
    fn destroy(self, device: &VulkanDevice) {
        for staging in self.staging {
            staging.destroy(device);
        }
        let raw = device.raw();
        unsafe {
            raw.destroy_fence(self.fence, None);
            raw.destroy_command_pool(self.command_pool, None);
        }
    }
}

pub struct QuadBuffers {
    vertex: Allocation,
    index: Allocation,
    uniforms: Vec<Allocation>,
    mapped: Vec<*mut u8>,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    upload_semaphore: vk::Semaphore,
    pending: Option<PendingUpload>,
    started: Instant,
}

impl QuadBuffers {
    pub fn create(
        device: &LogicalDevice<VulkanDevice>,
        descriptor_set_layout: vk::DescriptorSetLayout,
    ) -> Result<Self> {
        let vulkan = device.raw();
        let families = [device.transfer.family_index, device.graphics.family_index];

        let vertex = Allocation::create(
            vulkan,
            size_of_val(&QUAD_VERTICES) as u64,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            &families,
        )?;
        let index = match Allocation::create(
            vulkan,
            size_of_val(&QUAD_INDICES) as u64,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            &families,
        ) {
            Ok(index) => index,
            Err(error) => {
                vertex.destroy(vulkan);
                return Err(error);
            }
        };

        let mut buffers = Self {
            vertex,
            index,
            uniforms: Vec::new(),
            mapped: Vec::new(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_sets: Vec::new(),
            upload_semaphore: vk::Semaphore::null(),
            pending: None,
            started: Instant::now(),
        };

        if let Err(error) = buffers.finish_create(device, descriptor_set_layout) {
            unsafe {
                let _ = vulkan.raw().device_wait_idle();
                buffers.destroy(vulkan);
            }
            return Err(error);
        }

        Ok(buffers)
    }

    fn finish_create(
        &mut self,
        device: &LogicalDevice<VulkanDevice>,
        descriptor_set_layout: vk::DescriptorSetLayout,
    ) -> Result<()> {
        let vulkan = device.raw();
        let info = vk::SemaphoreCreateInfo::builder();
        self.upload_semaphore = unsafe { vulkan.raw().create_semaphore(&info, None)? };

        self.upload(device)?;
        self.create_uniform_buffers(vulkan)?;
        self.create_descriptor_sets(vulkan, descriptor_set_layout)?;
        Ok(())
    }

    /// Records both copies into one command buffer on the transfer queue.
    fn upload(&mut self, device: &LogicalDevice<VulkanDevice>) -> Result<()> {
        let vulkan = device.raw();
        let raw = vulkan.raw();

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(device.transfer.family_index);
        let command_pool = unsafe { raw.create_command_pool(&pool_info, None)? };

        let fence_info = vk::FenceCreateInfo::builder();
        let fence = match unsafe { raw.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(error) => {
                unsafe { raw.destroy_command_pool(command_pool, None) };
                return Err(error.into());
            }
        };

        let mut pending = PendingUpload {
            command_pool,
            fence,
            staging: Vec::with_capacity(2),
        };

        let result = (|| -> Result<()> {
            let vertex_staging = Allocation::staging(vulkan, bytemuck::cast_slice(&QUAD_VERTICES))?;
            pending.staging.push(vertex_staging);
            let index_staging = Allocation::staging(vulkan, bytemuck::cast_slice(&QUAD_INDICES))?;
            pending.staging.push(index_staging);

            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_pool(command_pool)
                .command_buffer_count(1);
            let command_buffer = unsafe { raw.allocate_command_buffers(&alloc_info)?[0] };

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            unsafe {
                raw.begin_command_buffer(command_buffer, &begin_info)?;

                let regions = vk::BufferCopy::builder()
                    .size(size_of_val(&QUAD_VERTICES) as u64);
                raw.cmd_copy_buffer(command_buffer, vertex_staging.buffer, self.vertex.buffer, &[regions]);

                let regions = vk::BufferCopy::builder()
                    .size(size_of_val(&QUAD_INDICES) as u64);
                raw.cmd_copy_buffer(command_buffer, index_staging.buffer, self.index.buffer, &[regions]);

                raw.end_command_buffer(command_buffer)?;
            }

            let command_buffers = &[command_buffer];
            let signal_semaphores = &[self.upload_semaphore];
            let submit_info = vk::SubmitInfo::builder()
                .command_buffers(command_buffers)
                .signal_semaphores(signal_semaphores);

            unsafe { raw.queue_submit(device.transfer.handle, &[submit_info], fence)? };
            Ok(())
        })();

        match result {
            Ok(()) => {
                debug!(
                    "Quad upload submitted on queue family {}.",
                    device.transfer.family_index
                );
                self.pending = Some(pending);
                Ok(())
            }
            Err(error) => {
                pending.destroy(vulkan);
                Err(error)
            }
        }
    }

    fn create_uniform_buffers(&mut self, device: &VulkanDevice) -> Result<()> {
        let size = size_of::<UniformBufferObject>() as u64;
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let uniform = Allocation::create(
                device,
                size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                &[],
            )?;
            self.uniforms.push(uniform);

            let memory = unsafe {
                device
                    .raw()
                    .map_memory(uniform.memory, 0, size, vk::MemoryMapFlags::empty())?
            };
            self.mapped.push(memory.cast());
        }
        Ok(())
    }

    fn create_descriptor_sets(
        &mut self,
        device: &VulkanDevice,
        descriptor_set_layout: vk::DescriptorSetLayout,
    ) -> Result<()> {
        let raw = device.raw();

        let ubo_size = vk::DescriptorPoolSize::builder()
            .type_(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32);

        let pool_sizes = &[ubo_size];
        let info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(MAX_FRAMES_IN_FLIGHT as u32);
        self.descriptor_pool = unsafe { raw.create_descriptor_pool(&info, None)? };

        let layouts = vec![descriptor_set_layout; MAX_FRAMES_IN_FLIGHT];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&layouts);
        self.descriptor_sets = unsafe { raw.allocate_descriptor_sets(&info)? };

        for (set, uniform) in self.descriptor_sets.iter().zip(&self.uniforms) {
            let info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform.buffer)
                .offset(0)
                .range(size_of::<UniformBufferObject>() as u64);

            let buffer_info = &[info];
            let ubo_write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(buffer_info);

            unsafe { raw.update_descriptor_sets(&[ubo_write], &[] as &[vk::CopyDescriptorSet]) };
        }

        Ok(())
    }

    /// What the renderer draws each frame.
    pub fn geometry(&self) -> DrawGeometry {
        DrawGeometry {
            vertex_buffer: self.vertex.buffer,
            index_buffer: self.index.buffer,
            index_type: vk::IndexType::UINT16,
            index_count: QUAD_INDICES.len() as u32,
            descriptor_sets: self.descriptor_sets.clone(),
            upload_semaphore: Some(self.upload_semaphore),
        }
    }

    /// Frees the staging buffers once the transfer queue is done with them.
    /// Returns whether an upload is still outstanding.
    pub fn reclaim_staging(&mut self, device: &VulkanDevice) -> Result<bool> {
        let Some(pending) = &self.pending else {
            return Ok(false);
        };

        let status = unsafe { device.raw().get_fence_status(pending.fence)? };
        if status == vk::SuccessCode::NOT_READY {
            return Ok(true);
        }

        if let Some(pending) = self.pending.take() {
            pending.destroy(device);
            debug!("Quad staging buffers reclaimed.");
        }
        Ok(false)
    }

    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, device: &VulkanDevice) {
        if let Some(pending) = self.pending.take() {
            pending.destroy(device);
        }

        let raw = device.raw();
        unsafe {
            if !self.descriptor_pool.is_null() {
                raw.destroy_descriptor_pool(self.descriptor_pool, None);
                self.descriptor_pool = vk::DescriptorPool::null();
            }
            self.descriptor_sets.clear();

            for uniform in self.uniforms.drain(..) {
                raw.unmap_memory(uniform.memory);
                uniform.destroy(device);
            }
            self.mapped.clear();

            if !self.upload_semaphore.is_null() {
                raw.destroy_semaphore(self.upload_semaphore, None);
                self.upload_semaphore = vk::Semaphore::null();
            }
        }

        self.index.destroy(device);
        self.vertex.destroy(device);
    }
}

impl FrameUniforms for QuadBuffers {
    fn write(&mut self, frame: usize, extent: vk::Extent2D) -> Result<()> {
        let mapped = *self
            .mapped
            .get(frame)
            .ok_or_else(|| anyhow!("no uniform buffer for frame {frame}"))?;

        let model = model_matrix(self.started.elapsed().as_secs_f32(), extent);
        let ubo = UniformBufferObject {
            model: model.to_cols_array_2d(),
        };
        let bytes = bytemuck::bytes_of(&ubo);

        // The slot's fence has signaled, so the GPU is no longer reading this.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped, bytes.len()) };
        Ok(())
    }
}
