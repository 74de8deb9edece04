//! A fake GPU for unit tests.
//!
//! Every object the fake device creates is tracked until destroyed. The fake
//! panics on double frees, on destroying an object something still depends
//! on, and on waiting for a fence that no submitted work will signal.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use vulkanalia::vk::{self, Handle};

use crate::gpu::{
    DeviceApi, DeviceRequest, DrawRecording, FrameSubmission, GpuResult, InstanceApi,
    PresentRequest, SwapchainRequest, SwapchainSupport,
};
use crate::renderer::PipelineSource;
use crate::window::WindowSurface;

/// Builds a non-dispatchable handle from a raw value.
#[allow(unused_unsafe)]
pub fn mint<H: Handle<Repr = u64>>(raw: u64) -> H {
    unsafe { H::from_raw(raw) }
}

#[allow(unused_unsafe)]
fn mint_dispatchable<H: Handle<Repr = usize>>(raw: usize) -> H {
    unsafe { H::from_raw(raw) }
}

const SURFACE: u64 = 0xface;
const PIPELINE_LAYOUT: u64 = 0x1a70;
const FIRST_TRACKED: u64 = 0x1000_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Swapchain,
    ImageView,
    RenderPass,
    Framebuffer,
    CommandPool,
    Semaphore,
    Fence,
    Pipeline,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeEvent {
    WaitIdle,
    CreateSwapchain { old: vk::SwapchainKHR },
    DestroySwapchain(vk::SwapchainKHR),
    DestroyImageView,
    DestroyRenderPass,
    DestroyFramebuffer,
    CreatePipeline(vk::RenderPass),
    DestroyPipeline,
    DestroySemaphore,
    DestroyFence,
    DestroyCommandPool,
    Acquire,
    Submit,
    Present,
}

#[derive(Clone, Debug)]
pub struct FakePhysicalDevice {
    pub properties: vk::PhysicalDeviceProperties,
    pub families: Vec<vk::QueueFamilyProperties>,
    pub present_families: Vec<u32>,
    pub extensions: Vec<vk::ExtensionName>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl FakePhysicalDevice {
    pub fn discrete(name: &str) -> Self {
        Self::with_type(name, vk::PhysicalDeviceType::DISCRETE_GPU)
    }

    pub fn integrated(name: &str) -> Self {
        Self::with_type(name, vk::PhysicalDeviceType::INTEGRATED_GPU)
    }

    fn with_type(name: &str, device_type: vk::PhysicalDeviceType) -> Self {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type,
            ..Default::default()
        };
        properties.device_name = vk::StringArray::from_bytes(name.as_bytes());
        properties.limits.max_image_dimension_2d = 4096;

        Self {
            properties,
            families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            present_families: vec![0],
            extensions: vec![vk::KHR_SWAPCHAIN_EXTENSION.name],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }
}

struct FakeState {
    devices: Vec<FakePhysicalDevice>,
    device_requests: Vec<DeviceRequest>,
    next_handle: u64,
    live: HashMap<u64, Kind>,
    signaled: HashSet<u64>,
    retired: HashSet<u64>,
    image_owner: HashMap<u64, u64>,
    view_owner: HashMap<u64, u64>,
    framebuffer_deps: HashMap<u64, (u64, u64)>,
    swapchain_images: HashMap<u64, Vec<vk::Image>>,
    next_image: HashMap<u64, u32>,
    acquire_script: VecDeque<GpuResult<vk::SuccessCode>>,
    present_script: VecDeque<GpuResult<vk::SuccessCode>>,
    image_view_budget: Option<usize>,
    events: Vec<FakeEvent>,
    submissions: Vec<FrameSubmission>,
    recorded_descriptor_sets: Vec<Option<vk::DescriptorSet>>,
}

impl FakeState {
    fn new(devices: Vec<FakePhysicalDevice>) -> Self {
        Self {
            devices,
            device_requests: Vec::new(),
            next_handle: FIRST_TRACKED,
            live: HashMap::new(),
            signaled: HashSet::new(),
            retired: HashSet::new(),
            image_owner: HashMap::new(),
            view_owner: HashMap::new(),
            framebuffer_deps: HashMap::new(),
            swapchain_images: HashMap::new(),
            next_image: HashMap::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            image_view_budget: None,
            events: Vec::new(),
            submissions: Vec::new(),
            recorded_descriptor_sets: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn track(&mut self, kind: Kind) -> u64 {
        let raw = self.next();
        self.live.insert(raw, kind);
        raw
    }

    fn assert_live(&self, kind: Kind, raw: u64) {
        match self.live.get(&raw) {
            Some(k) if *k == kind => {}
            Some(k) => panic!("{raw:#x} used as {kind:?} but it is a {k:?}"),
            None => panic!("{kind:?} {raw:#x} used after destruction"),
        }
    }

    fn release(&mut self, kind: Kind, raw: u64) {
        match self.live.remove(&raw) {
            Some(k) if k == kind => {}
            Some(k) => panic!("{raw:#x} destroyed as {kind:?} but it is a {k:?}"),
            None => panic!("{kind:?} {raw:#x} destroyed twice"),
        }
        self.signaled.remove(&raw);
    }

    fn consume_signal(&mut self, semaphore: vk::Semaphore) {
        let raw = semaphore.as_raw();
        self.assert_live(Kind::Semaphore, raw);
        assert!(
            self.signaled.remove(&raw),
            "waiting on semaphore {raw:#x} that nothing signals"
        );
    }

    fn raise_signal(&mut self, kind: Kind, raw: u64) {
        self.assert_live(kind, raw);
        assert!(
            self.signaled.insert(raw),
            "{kind:?} {raw:#x} signaled while already signaled"
        );
    }
}

pub struct FakeInstance {
    state: Rc<RefCell<FakeState>>,
}

impl FakeInstance {
    pub fn new(devices: Vec<FakePhysicalDevice>) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new(devices))),
        }
    }

    pub fn physical_device(&self, index: usize) -> vk::PhysicalDevice {
        mint_dispatchable(index + 1)
    }

    fn index_of(physical_device: vk::PhysicalDevice) -> usize {
        physical_device.as_raw() - 1
    }

    fn with_device<T>(
        &self,
        physical_device: vk::PhysicalDevice,
        f: impl FnOnce(&FakePhysicalDevice) -> T,
    ) -> T {
        f(&self.state.borrow().devices[Self::index_of(physical_device)])
    }

    pub fn update_device(&self, index: usize, f: impl FnOnce(&mut FakePhysicalDevice)) {
        f(&mut self.state.borrow_mut().devices[index]);
    }

    pub fn set_current_extent(&self, width: u32, height: u32) {
        for device in &mut self.state.borrow_mut().devices {
            device.capabilities.current_extent = vk::Extent2D { width, height };
        }
    }

    pub fn last_device_request(&self) -> DeviceRequest {
        self.state
            .borrow()
            .device_requests
            .last()
            .cloned()
            .expect("no device was created")
    }
}

impl InstanceApi for FakeInstance {
    type Device = FakeDevice;

    fn surface(&self) -> vk::SurfaceKHR {
        mint(SURFACE)
    }

    fn enumerate_physical_devices(&self) -> GpuResult<Vec<vk::PhysicalDevice>> {
        let count = self.state.borrow().devices.len();
        Ok((0..count).map(|i| self.physical_device(i)).collect())
    }

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        self.with_device(physical_device, |d| d.properties)
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.with_device(physical_device, |d| d.families.clone())
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> GpuResult<bool> {
        Ok(self.with_device(physical_device, |d| {
            d.present_families.contains(&queue_family_index)
        }))
    }

    fn device_extensions(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> GpuResult<HashSet<vk::ExtensionName>> {
        Ok(self.with_device(physical_device, |d| {
            d.extensions.iter().copied().collect()
        }))
    }

    fn swapchain_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> GpuResult<SwapchainSupport> {
        Ok(self.with_device(physical_device, |d| SwapchainSupport {
            capabilities: d.capabilities,
            formats: d.formats.clone(),
            present_modes: d.present_modes.clone(),
        }))
    }

    fn create_device(
        &self,
        _physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> GpuResult<FakeDevice> {
        self.state.borrow_mut().device_requests.push(request.clone());
        Ok(FakeDevice {
            state: self.state.clone(),
        })
    }
}

pub struct FakeDevice {
    state: Rc<RefCell<FakeState>>,
}

impl FakeDevice {
    /// A device with no instance behind it.
    pub fn standalone() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new(Vec::new()))),
        }
    }

    pub fn is_live<H: Handle<Repr = u64>>(&self, handle: H) -> bool {
        self.state.borrow().live.contains_key(&handle.as_raw())
    }

    pub fn is_signaled<H: Handle<Repr = u64>>(&self, handle: H) -> bool {
        self.state.borrow().signaled.contains(&handle.as_raw())
    }

    pub fn live_handles(&self) -> Vec<(Kind, u64)> {
        let mut live = self
            .state
            .borrow()
            .live
            .iter()
            .map(|(raw, kind)| (*kind, *raw))
            .collect::<Vec<_>>();
        live.sort_by_key(|(_, raw)| *raw);
        live
    }

    /// Signals a semaphore as if some other queue had finished with it.
    pub fn signal(&self, semaphore: vk::Semaphore) {
        self.state
            .borrow_mut()
            .raise_signal(Kind::Semaphore, semaphore.as_raw());
    }

    pub fn script_acquire(&self, result: GpuResult<vk::SuccessCode>) {
        self.state.borrow_mut().acquire_script.push_back(result);
    }

    pub fn script_present(&self, result: GpuResult<vk::SuccessCode>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    /// Lets `count` more image views succeed, then fails the rest.
    pub fn fail_image_view_after(&self, count: usize) {
        self.state.borrow_mut().image_view_budget = Some(count);
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn count(&self, predicate: impl Fn(&FakeEvent) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| predicate(e)).count()
    }

    pub fn submissions(&self) -> Vec<FrameSubmission> {
        self.state.borrow().submissions.clone()
    }

    pub fn recorded_descriptor_sets(&self) -> Vec<Option<vk::DescriptorSet>> {
        self.state.borrow().recorded_descriptor_sets.clone()
    }

    fn create_pipeline(&self, render_pass: vk::RenderPass) -> vk::Pipeline {
        let mut state = self.state.borrow_mut();
        state.assert_live(Kind::RenderPass, render_pass.as_raw());
        state.events.push(FakeEvent::CreatePipeline(render_pass));
        mint(state.track(Kind::Pipeline))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        let mut state = self.state.borrow_mut();
        state.release(Kind::Pipeline, pipeline.as_raw());
        state.events.push(FakeEvent::DestroyPipeline);
    }
}

impl DeviceApi for FakeDevice {
    fn queue(&self, queue_family_index: u32) -> vk::Queue {
        mint_dispatchable(queue_family_index as usize + 1)
    }

    fn wait_idle(&self) -> GpuResult<()> {
        self.state.borrow_mut().events.push(FakeEvent::WaitIdle);
        Ok(())
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> GpuResult<vk::SwapchainKHR> {
        let mut state = self.state.borrow_mut();
        let old = request.old_swapchain;
        if !old.is_null() {
            state.assert_live(Kind::Swapchain, old.as_raw());
            assert!(
                state.retired.insert(old.as_raw()),
                "swapchain {:#x} retired twice",
                old.as_raw()
            );
        }

        let raw = state.track(Kind::Swapchain);
        let images: Vec<vk::Image> = (0..request.min_image_count)
            .map(|_| {
                let image = state.next();
                state.image_owner.insert(image, raw);
                mint(image)
            })
            .collect();
        state.swapchain_images.insert(raw, images);
        state.events.push(FakeEvent::CreateSwapchain { old });
        Ok(mint(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> GpuResult<Vec<vk::Image>> {
        let state = self.state.borrow();
        state.assert_live(Kind::Swapchain, swapchain.as_raw());
        Ok(state.swapchain_images[&swapchain.as_raw()].clone())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state.borrow_mut();
        let raw = swapchain.as_raw();
        assert!(
            !state.view_owner.values().any(|owner| *owner == raw),
            "swapchain {raw:#x} destroyed while its image views are live"
        );
        state.release(Kind::Swapchain, raw);
        state.retired.remove(&raw);
        state.events.push(FakeEvent::DestroySwapchain(swapchain));
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        _format: vk::Format,
    ) -> GpuResult<vk::ImageView> {
        let mut state = self.state.borrow_mut();
        if let Some(budget) = state.image_view_budget.as_mut() {
            if *budget == 0 {
                return Err(vk::ErrorCode::OUT_OF_DEVICE_MEMORY);
            }
            *budget -= 1;
        }
        let owner = *state
            .image_owner
            .get(&image.as_raw())
            .expect("image view of an unknown image");
        state.assert_live(Kind::Swapchain, owner);

        let raw = state.track(Kind::ImageView);
        state.view_owner.insert(raw, owner);
        Ok(mint(raw))
    }

    fn destroy_image_view(&self, image_view: vk::ImageView) {
        let mut state = self.state.borrow_mut();
        let raw = image_view.as_raw();
        assert!(
            !state.framebuffer_deps.values().any(|(_, view)| *view == raw),
            "image view {raw:#x} destroyed while a framebuffer uses it"
        );
        state.release(Kind::ImageView, raw);
        state.view_owner.remove(&raw);
        state.events.push(FakeEvent::DestroyImageView);
    }

    fn create_render_pass(&self, _format: vk::Format) -> GpuResult<vk::RenderPass> {
        Ok(mint(self.state.borrow_mut().track(Kind::RenderPass)))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut state = self.state.borrow_mut();
        let raw = render_pass.as_raw();
        assert!(
            !state.framebuffer_deps.values().any(|(pass, _)| *pass == raw),
            "render pass {raw:#x} destroyed while a framebuffer uses it"
        );
        state.release(Kind::RenderPass, raw);
        state.events.push(FakeEvent::DestroyRenderPass);
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        image_view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> GpuResult<vk::Framebuffer> {
        let mut state = self.state.borrow_mut();
        state.assert_live(Kind::RenderPass, render_pass.as_raw());
        state.assert_live(Kind::ImageView, image_view.as_raw());
        let raw = state.track(Kind::Framebuffer);
        state
            .framebuffer_deps
            .insert(raw, (render_pass.as_raw(), image_view.as_raw()));
        Ok(mint(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state.borrow_mut();
        state.release(Kind::Framebuffer, framebuffer.as_raw());
        state.framebuffer_deps.remove(&framebuffer.as_raw());
        state.events.push(FakeEvent::DestroyFramebuffer);
    }

    fn create_command_pool(&self, _queue_family_index: u32) -> GpuResult<vk::CommandPool> {
        Ok(mint(self.state.borrow_mut().track(Kind::CommandPool)))
    }

    fn allocate_command_buffers(
        &self,
        command_pool: vk::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.borrow_mut();
        state.assert_live(Kind::CommandPool, command_pool.as_raw());
        Ok((0..count)
            .map(|_| mint_dispatchable(state.next() as usize))
            .collect())
    }

    fn destroy_command_pool(&self, command_pool: vk::CommandPool) {
        let mut state = self.state.borrow_mut();
        state.release(Kind::CommandPool, command_pool.as_raw());
        state.events.push(FakeEvent::DestroyCommandPool);
    }

    fn reset_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> GpuResult<()> {
        Ok(())
    }

    fn record_draw(
        &self,
        _command_buffer: vk::CommandBuffer,
        recording: &DrawRecording,
    ) -> GpuResult<()> {
        let mut state = self.state.borrow_mut();
        let framebuffer = recording.framebuffer.as_raw();
        state.assert_live(Kind::Framebuffer, framebuffer);
        state.assert_live(Kind::Pipeline, recording.pipeline.as_raw());
        assert_eq!(
            state.framebuffer_deps[&framebuffer].0,
            recording.render_pass.as_raw(),
            "framebuffer recorded with a render pass it was not built for"
        );
        state
            .recorded_descriptor_sets
            .push(recording.descriptor_set);
        Ok(())
    }

    fn create_semaphore(&self) -> GpuResult<vk::Semaphore> {
        Ok(mint(self.state.borrow_mut().track(Kind::Semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.borrow_mut();
        state.release(Kind::Semaphore, semaphore.as_raw());
        state.events.push(FakeEvent::DestroySemaphore);
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence> {
        let mut state = self.state.borrow_mut();
        let raw = state.track(Kind::Fence);
        if signaled {
            state.signaled.insert(raw);
        }
        Ok(mint(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.borrow_mut();
        state.release(Kind::Fence, fence.as_raw());
        state.events.push(FakeEvent::DestroyFence);
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        let state = self.state.borrow();
        let raw = fence.as_raw();
        state.assert_live(Kind::Fence, raw);
        assert!(
            state.signaled.contains(&raw),
            "waiting on fence {raw:#x} that no submitted work will signal"
        );
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        let mut state = self.state.borrow_mut();
        state.assert_live(Kind::Fence, fence.as_raw());
        state.signaled.remove(&fence.as_raw());
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> GpuResult<(u32, vk::SuccessCode)> {
        let mut state = self.state.borrow_mut();
        let raw = swapchain.as_raw();
        state.assert_live(Kind::Swapchain, raw);
        assert!(
            !state.retired.contains(&raw),
            "acquiring from retired swapchain {raw:#x}"
        );
        state.events.push(FakeEvent::Acquire);

        let code = match state.acquire_script.pop_front() {
            Some(Err(code)) => return Err(code),
            Some(Ok(code)) => code,
            None => vk::SuccessCode::SUCCESS,
        };

        state.raise_signal(Kind::Semaphore, signal.as_raw());
        let image_count = state.swapchain_images[&raw].len() as u32;
        let next = state.next_image.entry(raw).or_insert(0);
        let index = *next;
        *next = (index + 1) % image_count;
        Ok((index, code))
    }

    fn queue_submit(&self, _queue: vk::Queue, submission: &FrameSubmission) -> GpuResult<()> {
        let mut state = self.state.borrow_mut();
        assert_eq!(
            submission.wait_semaphores.len(),
            submission.wait_stages.len()
        );
        for semaphore in &submission.wait_semaphores {
            state.consume_signal(*semaphore);
        }
        state.raise_signal(Kind::Semaphore, submission.signal_semaphore.as_raw());

        // The fake GPU finishes work the moment it is submitted.
        state.raise_signal(Kind::Fence, submission.fence.as_raw());

        state.submissions.push(submission.clone());
        state.events.push(FakeEvent::Submit);
        Ok(())
    }

    fn queue_present(
        &self,
        _queue: vk::Queue,
        request: &PresentRequest,
    ) -> GpuResult<vk::SuccessCode> {
        let mut state = self.state.borrow_mut();
        let raw = request.swapchain.as_raw();
        state.assert_live(Kind::Swapchain, raw);
        assert!(
            !state.retired.contains(&raw),
            "presenting to retired swapchain {raw:#x}"
        );
        state.consume_signal(request.wait_semaphore);
        state.events.push(FakeEvent::Present);
        state
            .present_script
            .pop_front()
            .unwrap_or(Ok(vk::SuccessCode::SUCCESS))
    }
}

/// Pipelines tracked by the fake device, so their lifetime is checked too.
#[derive(Default)]
pub struct FakePipelineSource {
    pub created: usize,
    /// Makes every `create_pipeline` call fail.
    pub fail: bool,
}

impl PipelineSource<FakeDevice> for FakePipelineSource {
    fn create_pipeline(
        &mut self,
        device: &FakeDevice,
        render_pass: vk::RenderPass,
    ) -> anyhow::Result<vk::Pipeline> {
        if self.fail {
            anyhow::bail!("pipeline creation refused");
        }
        self.created += 1;
        Ok(device.create_pipeline(render_pass))
    }

    fn destroy_pipeline(&mut self, device: &FakeDevice, pipeline: vk::Pipeline) {
        device.destroy_pipeline(pipeline);
    }

    fn layout(&self) -> vk::PipelineLayout {
        mint(PIPELINE_LAYOUT)
    }
}

pub struct FakeWindow {
    size: (u32, u32),
    resized: bool,
    waits: usize,
    restore: Option<(usize, (u32, u32))>,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            resized: false,
            waits: 0,
            restore: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resized = true;
    }

    /// The window reports `size` once `wait_events` has been called `waits` times.
    pub fn restore_after_waits(&mut self, waits: usize, size: (u32, u32)) {
        self.restore = Some((waits, size));
    }

    pub fn waits(&self) -> usize {
        self.waits
    }
}

impl WindowSurface for FakeWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        match self.restore {
            Some((after, (width, height))) if self.waits >= after => self.resize(width, height),
            Some(_) => {}
            None => panic!("waiting on a window that never restores"),
        }
    }
}
