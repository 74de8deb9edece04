use std::collections::HashSet;
use std::ffi::{CStr, c_void};

use anyhow::{Result, anyhow};
use log::{debug, error, info, trace, warn};
use vulkanalia::loader::{LIBRARY, LibloadingLoader};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{EntryV1_1, ExtDebugUtilsExtension, KhrSurfaceExtension};
use vulkanalia::window as vk_window;
use winit::window::Window;

use crate::config::Config;

pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

/// Entry point, instance, presentation surface and (optional) debug messenger.
///
/// Created once before device selection and destroyed after the device.
pub struct VulkanInstance {
    _entry: Entry,
    instance: Instance,
    surface: vk::SurfaceKHR,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    pub fn create(window: &Window, config: &Config) -> Result<Self> {
        let loader = unsafe { LibloadingLoader::new(LIBRARY)? };
        let entry = unsafe { Entry::new(loader) }.map_err(|b| anyhow!("{}", b))?;

        let loader_version = unsafe { entry.enumerate_instance_version() }
            .unwrap_or(vk::make_version(1, 0, 0));
        info!(
            "Vulkan loader version: {}.{}.{}",
            vk::version_major(loader_version),
            vk::version_minor(loader_version),
            vk::version_patch(loader_version)
        );

        let application_info = vk::ApplicationInfo::builder()
            .application_name(b"Ferris Quad VK\0")
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"No Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        let mut extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        let flags = if cfg!(target_os = "macos") {
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut layers = Vec::new();
        if config.validation {
            check_validation_layer_support(&entry)?;
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        let info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let instance = unsafe { entry.create_instance(&info, None)? };

        let messenger = if config.validation {
            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .user_callback(Some(debug_callback));
            Some(unsafe { instance.create_debug_utils_messenger_ext(&debug_info, None)? })
        } else {
            None
        };

        let surface = unsafe { vk_window::create_surface(&instance, window, window)? };

        Ok(Self {
            _entry: entry,
            instance,
            surface,
            messenger,
        })
    }

    pub fn raw(&self) -> &Instance {
        &self.instance
    }

    pub fn surface_handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn validation_enabled(&self) -> bool {
        self.messenger.is_some()
    }

    /// # Safety
    /// The logical device and everything created from the surface must be gone.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            self.instance.destroy_surface_khr(self.surface, None);
            if let Some(messenger) = self.messenger.take() {
                self.instance
                    .destroy_debug_utils_messenger_ext(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn check_validation_layer_support(entry: &Entry) -> Result<()> {
    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? }
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    if available_layers.contains(&VALIDATION_LAYER) {
        Ok(())
    } else {
        Err(anyhow!("Validation layer requested but not supported."))
    }
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({:?}) {}", type_, message);
    } else {
        trace!("({:?}) {}", type_, message);
    }

    vk::FALSE
}
