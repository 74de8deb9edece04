//! Presentable image chain: parameter selection, creation and recreation.

use log::{debug, info};
use vulkanalia::vk;

use crate::device::{QueueFamilies, SelectedDevice};
use crate::error::{RendererError, Result, Unsuitable, VkResultExt};
use crate::gpu::{DeviceApi, InstanceApi, SwapchainRequest};

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// The preferred sRGB pair wherever it appears, else the first entry.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .cloned()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Uses the surface's extent unless it reports the `u32::MAX` sentinel, in
/// which case the framebuffer size is clamped into the allowed range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    let clamp = |min: u32, max: u32, v: u32| min.max(max.min(v));
    vk::Extent2D {
        width: clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
            width,
        ),
        height: clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
            height,
        ),
    }
}

/// One more than the minimum; a `max_image_count` of zero means unbounded.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

pub fn choose_sharing(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.graphics != families.present {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, vec![])
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Owned by the chain itself, never destroyed here.
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
}

impl Swapchain {
    /// Builds a chain from freshly queried surface support.
    ///
    /// `old` is handed to the driver for resource reuse; the caller still owns
    /// it and must destroy it once this returns.
    pub fn create<I: InstanceApi>(
        instance: &I,
        device: &I::Device,
        selected: &SelectedDevice,
        framebuffer_size: (u32, u32),
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let support = instance
            .swapchain_support(selected.physical_device)
            .or_fatal("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let surface_format = choose_surface_format(&support.formats)
            .ok_or(RendererError::SurfaceSupportLost(Unsuitable::NoSurfaceFormats))?;
        if support.present_modes.is_empty() {
            return Err(RendererError::SurfaceSupportLost(Unsuitable::NoPresentModes));
        }
        let present_mode = choose_present_mode(&support.present_modes);
        let capabilities = &support.capabilities;
        let extent = choose_extent(capabilities, framebuffer_size);
        let (sharing_mode, queue_family_indices) = choose_sharing(&selected.families);

        let request = SwapchainRequest {
            surface: instance.surface(),
            min_image_count: choose_image_count(capabilities),
            surface_format,
            extent,
            sharing_mode,
            queue_family_indices,
            pre_transform: capabilities.current_transform,
            present_mode,
            old_swapchain: old,
        };

        let handle = device
            .create_swapchain(&request)
            .or_fatal("vkCreateSwapchainKHR")?;

        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(code) => {
                device.destroy_swapchain(handle);
                return Err(RendererError::Vulkan {
                    operation: "vkGetSwapchainImagesKHR",
                    code,
                });
            }
        };

        let views = match create_image_views(device, &images, surface_format.format) {
            Ok(views) => views,
            Err(error) => {
                device.destroy_swapchain(handle);
                return Err(error);
            }
        };

        info!(
            "Created swapchain: {}x{}, {:?}, {:?}, {} images.",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            images.len()
        );

        Ok(Self {
            handle,
            surface_format,
            present_mode,
            extent,
            images,
            views,
        })
    }

    /// Replaces this chain in place. Views go first, the retired handle is
    /// destroyed only after its replacement exists.
    pub fn recreate<I: InstanceApi>(
        &mut self,
        instance: &I,
        device: &I::Device,
        selected: &SelectedDevice,
        framebuffer_size: (u32, u32),
    ) -> Result<()> {
        self.destroy_views(device);

        let replacement = Self::create(instance, device, selected, framebuffer_size, self.handle)?;
        device.destroy_swapchain(self.handle);

        debug!(
            "Swapchain recreated: {}x{} -> {}x{}.",
            self.extent.width, self.extent.height, replacement.extent.width, replacement.extent.height
        );

        *self = replacement;
        Ok(())
    }

    pub fn destroy_views<D: DeviceApi>(&mut self, device: &D) {
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
    }

    pub fn destroy<D: DeviceApi>(mut self, device: &D) {
        self.destroy_views(device);
        device.destroy_swapchain(self.handle);
    }
}

/// Views created before a failure are destroyed before the error is returned.
fn create_image_views<D: DeviceApi>(
    device: &D,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for image in images {
        match device.create_image_view(*image, format) {
            Ok(view) => views.push(view),
            Err(code) => {
                for view in views {
                    device.destroy_image_view(view);
                }
                return Err(RendererError::Vulkan {
                    operation: "vkCreateImageView",
                    code,
                });
            }
        }
    }
    Ok(views)
}
