use thiserror::Error;
use vulkanalia::vk;

/// Fatal renderer failure. Presentation-engine staleness never shows up here;
/// it is handled by recreating the swapchain.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no physical device is capable of rendering ({rejected} rejected)")]
    NoSuitableDevice { rejected: usize },

    #[error("{operation} failed: {code:?} ({code})")]
    Vulkan {
        operation: &'static str,
        code: vk::ErrorCode,
    },

    #[error("surface can no longer be presented to: {0}")]
    SurfaceSupportLost(Unsuitable),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type Result<T, E = RendererError> = std::result::Result<T, E>;

/// Reason a physical device was passed over during selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unsuitable {
    #[error("device scored zero")]
    ZeroScore,

    #[error("no queue family supports graphics")]
    MissingGraphicsQueue,

    #[error("no queue family can present to the surface")]
    MissingPresentQueue,

    #[error("missing required device extension `{0}`")]
    MissingExtension(String),

    #[error("surface reports no formats")]
    NoSurfaceFormats,

    #[error("surface reports no present modes")]
    NoPresentModes,
}

/// Attaches the failing operation to a raw Vulkan error code.
pub trait VkResultExt<T> {
    fn or_fatal(self, operation: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::ErrorCode> {
    fn or_fatal(self, operation: &'static str) -> Result<T> {
        self.map_err(|code| RendererError::Vulkan { operation, code })
    }
}
