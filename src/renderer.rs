//! The per-frame state machine and the swapchain recreation protocol.
//!
//! [`Renderer::draw_frame`] runs once per event-loop iteration:
//!
//! 1. wait for the current slot's fence
//! 2. acquire an image, abandoning the frame on `ERROR_OUT_OF_DATE_KHR`
//! 3. reset the fence and command buffer
//! 4. record the draw into the acquired image's framebuffer
//! 5. submit to the graphics queue
//! 6. present, recreating the chain when it went stale or the window resized
//! 7. advance to the next slot

use std::fmt;

use log::{debug, info, trace};
use vulkanalia::prelude::v1_0::*;

use crate::device::{LogicalDevice, SelectedDevice};
use crate::error::{RendererError, Result, VkResultExt};
use crate::frame::FrameRing;
use crate::gpu::{DeviceApi, DrawRecording, FrameSubmission, GpuResult, InstanceApi, PresentRequest};
use crate::render_target::RenderTargets;
use crate::swapchain::Swapchain;
use crate::window::WindowSurface;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Builds the graphics pipeline for a render pass.
///
/// Called once at start-up and again only when the surface format (and with
/// it the render pass) changes; viewport and scissor are dynamic state.
pub trait PipelineSource<D> {
    fn create_pipeline(&mut self, device: &D, render_pass: vk::RenderPass)
    -> anyhow::Result<vk::Pipeline>;

    fn destroy_pipeline(&mut self, device: &D, pipeline: vk::Pipeline);

    fn layout(&self) -> vk::PipelineLayout;
}

/// Hook for refreshing a slot's uniform data once its fence has signaled.
pub trait FrameUniforms {
    fn write(&mut self, frame: usize, extent: vk::Extent2D) -> anyhow::Result<()>;
}

impl FrameUniforms for () {
    fn write(&mut self, _frame: usize, _extent: vk::Extent2D) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Buffers drawn every frame. The handles stay owned by the caller.
#[derive(Clone, Debug)]
pub struct DrawGeometry {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_type: vk::IndexType,
    pub index_count: u32,
    /// One per frame slot, or empty when the pipeline takes no descriptors.
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    /// Signaled once the buffer upload finishes; the first submission waits on it.
    pub upload_semaphore: Option<vk::Semaphore>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Presented, then the chain was rebuilt.
    Recreated,
    /// Acquire found the chain out of date; nothing was submitted.
    Abandoned,
}

/// Whether a present result means the chain must be rebuilt.
pub fn present_is_stale(result: GpuResult<vk::SuccessCode>) -> Result<bool> {
    match result {
        Ok(vk::SuccessCode::SUBOPTIMAL_KHR) | Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(true),
        Ok(_) => Ok(false),
        Err(code) => Err(RendererError::Vulkan {
            operation: "vkQueuePresentKHR",
            code,
        }),
    }
}

/// What a shut down renderer hands back for the caller to destroy.
pub struct RendererParts<I: InstanceApi, P> {
    pub instance: I,
    pub device: LogicalDevice<I::Device>,
    pub pipeline_source: P,
}

/// Why [`Renderer::initialize`] failed, plus the inputs it took ownership of.
pub struct InitFailure<I: InstanceApi, P> {
    pub error: RendererError,
    pub parts: RendererParts<I, P>,
}

impl<I: InstanceApi, P> InitFailure<I, P> {
    fn new(
        error: RendererError,
        instance: I,
        device: LogicalDevice<I::Device>,
        pipeline_source: P,
    ) -> Self {
        Self {
            error,
            parts: RendererParts {
                instance,
                device,
                pipeline_source,
            },
        }
    }
}

impl<I: InstanceApi, P> fmt::Debug for InitFailure<I, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitFailure")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

pub struct Renderer<I: InstanceApi, P> {
    instance: I,
    device: LogicalDevice<I::Device>,
    selected: SelectedDevice,
    swapchain: Swapchain,
    targets: RenderTargets,
    pipeline_source: P,
    pipeline: vk::Pipeline,
    geometry: DrawGeometry,
    frames: FrameRing,
    /// Extra waits for the next submission.
    pending_waits: Vec<(vk::Semaphore, vk::PipelineStageFlags)>,
}

impl<I, P> Renderer<I, P>
where
    I: InstanceApi,
    P: PipelineSource<I::Device>,
{
    /// On failure the instance, device and pipeline source come back inside
    /// [`InitFailure`] so the caller can still tear them down.
    pub fn initialize(
        instance: I,
        device: LogicalDevice<I::Device>,
        selected: SelectedDevice,
        window_size: (u32, u32),
        mut pipeline_source: P,
        geometry: DrawGeometry,
    ) -> std::result::Result<Self, InitFailure<I, P>> {
        let raw = device.raw();
        let swapchain = match Swapchain::create(
            &instance,
            raw,
            &selected,
            window_size,
            vk::SwapchainKHR::null(),
        ) {
            Ok(swapchain) => swapchain,
            Err(error) => return Err(InitFailure::new(error, instance, device, pipeline_source)),
        };

        let mut targets = match RenderTargets::create(raw, &swapchain) {
            Ok(targets) => targets,
            Err(error) => {
                swapchain.destroy(raw);
                return Err(InitFailure::new(error, instance, device, pipeline_source));
            }
        };

        let pipeline = match pipeline_source.create_pipeline(raw, targets.render_pass) {
            Ok(pipeline) => pipeline,
            Err(error) => {
                targets.destroy(raw);
                swapchain.destroy(raw);
                return Err(InitFailure::new(error.into(), instance, device, pipeline_source));
            }
        };

        let frames = match FrameRing::create(raw, device.graphics.family_index) {
            Ok(frames) => frames,
            Err(error) => {
                targets.destroy_framebuffers(raw);
                pipeline_source.destroy_pipeline(raw, pipeline);
                targets.destroy(raw);
                swapchain.destroy(raw);
                return Err(InitFailure::new(error, instance, device, pipeline_source));
            }
        };

        let pending_waits = geometry
            .upload_semaphore
            .map(|s| (s, vk::PipelineStageFlags::VERTEX_INPUT))
            .into_iter()
            .collect();

        info!("Renderer initialized on `{}`.", selected.name);

        Ok(Self {
            instance,
            device,
            selected,
            swapchain,
            targets,
            pipeline_source,
            pipeline,
            geometry,
            frames,
            pending_waits,
        })
    }

    pub fn draw_frame<W, U>(&mut self, window: &mut W, uniforms: &mut U) -> Result<FrameOutcome>
    where
        W: WindowSurface,
        U: FrameUniforms + ?Sized,
    {
        let slot = *self.frames.current();
        let frame = self.frames.index();

        self.device
            .raw()
            .wait_for_fence(slot.in_flight)
            .or_fatal("vkWaitForFences")?;

        let acquired = self
            .device
            .raw()
            .acquire_next_image(self.swapchain.handle, slot.image_available);
        let image_index = match acquired {
            Ok((image_index, _)) => image_index,
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => {
                debug!("Acquire reported the swapchain out of date, frame {frame} abandoned.");
                self.recreate_swapchain(window)?;
                return Ok(FrameOutcome::Abandoned);
            }
            Err(code) => {
                return Err(RendererError::Vulkan {
                    operation: "vkAcquireNextImageKHR",
                    code,
                });
            }
        };

        uniforms.write(frame, self.swapchain.extent)?;

        let device = self.device.raw();
        device.reset_fence(slot.in_flight).or_fatal("vkResetFences")?;
        device
            .reset_command_buffer(slot.command_buffer)
            .or_fatal("vkResetCommandBuffer")?;

        let recording = DrawRecording {
            render_pass: self.targets.render_pass,
            framebuffer: self.targets.framebuffers[image_index as usize],
            extent: self.swapchain.extent,
            pipeline: self.pipeline,
            pipeline_layout: self.pipeline_source.layout(),
            vertex_buffer: self.geometry.vertex_buffer,
            index_buffer: self.geometry.index_buffer,
            index_type: self.geometry.index_type,
            index_count: self.geometry.index_count,
            descriptor_set: self.geometry.descriptor_sets.get(frame).copied(),
            clear_color: CLEAR_COLOR,
        };
        device
            .record_draw(slot.command_buffer, &recording)
            .or_fatal("vkEndCommandBuffer")?;

        let mut wait_semaphores = vec![slot.image_available];
        let mut wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        for (semaphore, stage) in self.pending_waits.drain(..) {
            wait_semaphores.push(semaphore);
            wait_stages.push(stage);
        }

        let submission = FrameSubmission {
            wait_semaphores,
            wait_stages,
            command_buffer: slot.command_buffer,
            signal_semaphore: slot.render_finished,
            fence: slot.in_flight,
        };
        device
            .queue_submit(self.device.graphics.handle, &submission)
            .or_fatal("vkQueueSubmit")?;

        let present = PresentRequest {
            wait_semaphore: slot.render_finished,
            swapchain: self.swapchain.handle,
            image_index,
        };
        let stale = present_is_stale(device.queue_present(self.device.present.handle, &present))?;
        let resized = window.take_resized();

        trace!("Frame {frame} presented image {image_index}.");

        let outcome = if stale || resized {
            debug!("Recreating swapchain (stale: {stale}, resized: {resized}).");
            self.recreate_swapchain(window)?;
            FrameOutcome::Recreated
        } else {
            FrameOutcome::Presented
        };

        self.frames.advance();
        Ok(outcome)
    }

    /// Rebuilds the chain and everything sized by it. Blocks while the window
    /// is minimized. The frame index is left alone.
    pub fn recreate_swapchain<W: WindowSurface>(&mut self, window: &mut W) -> Result<()> {
        let mut size = window.framebuffer_size();
        while size.0 == 0 || size.1 == 0 {
            window.wait_events();
            size = window.framebuffer_size();
        }

        // This rebuild already uses the latest size.
        window.take_resized();

        let device = self.device.raw();
        device.wait_idle().or_fatal("vkDeviceWaitIdle")?;

        self.targets.destroy_framebuffers(device);
        self.swapchain
            .recreate(&self.instance, device, &self.selected, size)?;

        let format_changed = self.swapchain.surface_format.format != self.targets.format;
        if format_changed && !self.pipeline.is_null() {
            self.pipeline_source.destroy_pipeline(device, self.pipeline);
            self.pipeline = vk::Pipeline::null();
        }

        self.targets.rebuild(device, &self.swapchain)?;

        if self.pipeline.is_null() {
            self.pipeline = self
                .pipeline_source
                .create_pipeline(device, self.targets.render_pass)?;
        }

        Ok(())
    }

    /// Waits for the device to go idle, then destroys what the renderer owns
    /// in reverse creation order.
    pub fn shutdown(mut self) -> Result<RendererParts<I, P>> {
        let device = self.device.raw();
        device.wait_idle().or_fatal("vkDeviceWaitIdle")?;

        self.targets.destroy_framebuffers(device);
        if !self.pipeline.is_null() {
            self.pipeline_source.destroy_pipeline(device, self.pipeline);
        }
        self.targets.destroy(device);
        self.swapchain.destroy(device);
        self.frames.destroy(device);

        info!("Renderer shut down.");

        Ok(RendererParts {
            instance: self.instance,
            device: self.device,
            pipeline_source: self.pipeline_source,
        })
    }

    pub fn instance(&self) -> &I {
        &self.instance
    }

    pub fn device(&self) -> &LogicalDevice<I::Device> {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn render_targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn current_frame(&self) -> usize {
        self.frames.index()
    }
}
