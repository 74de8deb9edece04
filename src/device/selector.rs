use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use log::{info, warn};
use vulkanalia::vk;

use crate::error::{RendererError, Result, Unsuitable, VkResultExt};
use crate::gpu::{GpuResult, InstanceApi, SwapchainSupport};

/// Extensions a device must support to be chosen.
pub const REQUIRED_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

/// Extensions enabled whenever the device reports them.
pub const OPTIONAL_EXTENSIONS: &[vk::ExtensionName] =
    &[vk::ExtensionName::from_bytes(b"VK_KHR_portability_subset")];

/// Discrete GPUs get a flat bonus on top of their largest 2D image size.
pub fn score_device(properties: &vk::PhysicalDeviceProperties) -> u32 {
    let mut score = 0;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score + properties.limits.max_image_dimension_2d
}

/// First family index found for each role, if any.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    /// A family that can transfer but not draw.
    pub dedicated_transfer: Option<u32>,
}

impl QueueFamilyIndices {
    fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some() && self.dedicated_transfer.is_some()
    }

    /// Transfer falls back to the graphics family.
    pub fn resolve(&self) -> Option<QueueFamilies> {
        let graphics = self.graphics?;
        let present = self.present?;
        Some(QueueFamilies {
            graphics,
            present,
            transfer: self.dedicated_transfer.unwrap_or(graphics),
        })
    }
}

/// Resolved family index for every queue role.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
}

/// Scans the families once, keeping the first match per role.
///
/// Presentation support is only asked for until a presenting family is
/// found, and the scan stops as soon as every role has a family.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> GpuResult<bool>,
) -> GpuResult<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let flags = family.queue_flags;
        let graphics = flags.contains(vk::QueueFlags::GRAPHICS);

        if indices.graphics.is_none() && graphics {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && supports_present(index)? {
            indices.present = Some(index);
        }

        if indices.dedicated_transfer.is_none() && flags.contains(vk::QueueFlags::TRANSFER) && !graphics
        {
            indices.dedicated_transfer = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Everything learned about one physical device during enumeration.
#[derive(Clone, Debug)]
pub struct DeviceCandidate {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub score: u32,
    pub queue_families: QueueFamilyIndices,
    pub extensions: HashSet<vk::ExtensionName>,
    pub swapchain_support: SwapchainSupport,
    /// Position in the driver's enumeration; lower wins ties.
    pub order: usize,
}

impl DeviceCandidate {
    pub fn inspect<I: InstanceApi>(
        instance: &I,
        physical_device: vk::PhysicalDevice,
        order: usize,
    ) -> Result<Self> {
        let properties = instance.physical_device_properties(physical_device);
        let families = instance.queue_family_properties(physical_device);
        let queue_families = find_queue_families(&families, |index| {
            instance.surface_support(physical_device, index)
        })
        .or_fatal("vkGetPhysicalDeviceSurfaceSupportKHR")?;

        let extensions = instance
            .device_extensions(physical_device)
            .or_fatal("vkEnumerateDeviceExtensionProperties")?;

        let swapchain_support = if extensions.contains(&vk::KHR_SWAPCHAIN_EXTENSION.name) {
            instance
                .swapchain_support(physical_device)
                .or_fatal("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?
        } else {
            SwapchainSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: Vec::new(),
                present_modes: Vec::new(),
            }
        };

        Ok(Self {
            physical_device,
            name: properties.device_name.to_string(),
            score: score_device(&properties),
            queue_families,
            extensions,
            swapchain_support,
            order,
        })
    }
}

/// The device the renderer will open.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilies,
    pub extensions: Vec<vk::ExtensionName>,
}

pub fn try_validate(candidate: &DeviceCandidate) -> std::result::Result<SelectedDevice, Unsuitable> {
    if candidate.score == 0 {
        return Err(Unsuitable::ZeroScore);
    }

    let indices = &candidate.queue_families;
    if indices.graphics.is_none() {
        return Err(Unsuitable::MissingGraphicsQueue);
    }
    let families = indices.resolve().ok_or(Unsuitable::MissingPresentQueue)?;

    if let Some(missing) = REQUIRED_EXTENSIONS
        .iter()
        .find(|e| !candidate.extensions.contains(*e))
    {
        return Err(Unsuitable::MissingExtension(missing.to_string()));
    }

    let support = &candidate.swapchain_support;
    if support.formats.is_empty() {
        return Err(Unsuitable::NoSurfaceFormats);
    }
    if support.present_modes.is_empty() {
        return Err(Unsuitable::NoPresentModes);
    }

    Ok(SelectedDevice {
        physical_device: candidate.physical_device,
        name: candidate.name.clone(),
        families,
        extensions: extensions_to_enable(&candidate.extensions),
    })
}

/// Required extensions plus whichever optional ones the device has.
pub fn extensions_to_enable(supported: &HashSet<vk::ExtensionName>) -> Vec<vk::ExtensionName> {
    REQUIRED_EXTENSIONS
        .iter()
        .chain(OPTIONAL_EXTENSIONS.iter().filter(|e| supported.contains(*e)))
        .copied()
        .collect()
}

struct Ranked(DeviceCandidate);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .cmp(&other.0.score)
            .then_with(|| other.0.order.cmp(&self.0.order))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Picks the highest scoring device that can render to the instance's surface.
pub fn select_physical_device<I: InstanceApi>(instance: &I) -> Result<SelectedDevice> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .or_fatal("vkEnumeratePhysicalDevices")?;

    let mut ranking = BinaryHeap::with_capacity(physical_devices.len());
    for (order, physical_device) in physical_devices.into_iter().enumerate() {
        ranking.push(Ranked(DeviceCandidate::inspect(
            instance,
            physical_device,
            order,
        )?));
    }

    let mut rejected = 0;
    while let Some(Ranked(candidate)) = ranking.pop() {
        match try_validate(&candidate) {
            Ok(selected) => {
                info!(
                    "Selected physical device (`{}`), score {}, queue families {:?}.",
                    selected.name, candidate.score, selected.families
                );
                return Ok(selected);
            }
            Err(reason) => {
                warn!("Skipping physical device (`{}`): {}", candidate.name, reason);
                rejected += 1;
            }
        }
    }

    Err(RendererError::NoSuitableDevice { rejected })
}
