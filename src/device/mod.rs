//! Physical device selection and logical device creation.

pub mod logical;
pub mod selector;

pub use logical::{LogicalDevice, Queue, QueueRole};
pub use selector::{QueueFamilies, SelectedDevice, select_physical_device};
