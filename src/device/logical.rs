use std::collections::BTreeSet;

use log::info;
use vulkanalia::vk;

use super::selector::{QueueFamilies, SelectedDevice};
use crate::error::{Result, VkResultExt};
use crate::gpu::{DeviceApi, DeviceRequest, InstanceApi};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Present,
    Transfer,
}

/// A queue retrieved from the device, tagged with what it is used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Queue {
    pub role: QueueRole,
    pub family_index: u32,
    pub handle: vk::Queue,
}

/// Families to request a queue from; roles sharing a family share a queue.
pub fn unique_queue_families(families: &QueueFamilies) -> BTreeSet<u32> {
    BTreeSet::from([families.graphics, families.present, families.transfer])
}

pub fn queue_for<D: DeviceApi>(device: &D, role: QueueRole, family_index: u32) -> Queue {
    Queue {
        role,
        family_index,
        handle: device.queue(family_index),
    }
}

/// The opened device and its three role-tagged queues.
pub struct LogicalDevice<D> {
    device: D,
    pub graphics: Queue,
    pub present: Queue,
    pub transfer: Queue,
}

impl<D: DeviceApi> LogicalDevice<D> {
    pub fn open<I>(instance: &I, selected: &SelectedDevice) -> Result<Self>
    where
        I: InstanceApi<Device = D>,
    {
        let families = &selected.families;
        let request = DeviceRequest {
            queue_families: unique_queue_families(families).into_iter().collect(),
            extensions: selected.extensions.clone(),
        };

        let device = instance
            .create_device(selected.physical_device, &request)
            .or_fatal("vkCreateDevice")?;

        info!(
            "Opened logical device on `{}` with queues from families {:?}.",
            selected.name, request.queue_families
        );

        Ok(Self {
            graphics: queue_for(&device, QueueRole::Graphics, families.graphics),
            present: queue_for(&device, QueueRole::Present, families.present),
            transfer: queue_for(&device, QueueRole::Transfer, families.transfer),
            device,
        })
    }

    pub fn raw(&self) -> &D {
        &self.device
    }
}
