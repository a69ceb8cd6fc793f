// Error taxonomy
//
// InitError: anything that goes wrong while building the GPU stack. Always
// fatal, never retried.
// FrameError: failures of the per-frame acquire/submit/present cycle that the
// driver cannot recover from by rebuilding the swapchain.

use ash::vk;
use thiserror::Error;

/// Construction-time failure of any GPU component
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to create window: {0}")]
    Window(String),

    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Failed to query required surface extensions: {0}")]
    SurfaceExtensions(vk::Result),

    #[error("Failed to create Vulkan instance: {0}")]
    Instance(vk::Result),

    #[error("Failed to create debug messenger: {0}")]
    DebugMessenger(vk::Result),

    #[error("Failed to create window surface: {0}")]
    Surface(vk::Result),

    #[error("No Vulkan-capable GPU found")]
    NoDevice,

    #[error("Failed to find suitable GPU")]
    NoSuitableDevice,

    #[error("Failed to create logical device: {0}")]
    LogicalDevice(vk::Result),

    #[error("{what}: {result}")]
    Query { what: &'static str, result: vk::Result },

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("Failed to create swapchain: {0}")]
    Swapchain(vk::Result),

    #[error("Failed to create image view: {0}")]
    ImageView(vk::Result),

    #[error("Failed to create render pass: {0}")]
    RenderPass(vk::Result),

    #[error("Failed to create framebuffer: {0}")]
    Framebuffer(vk::Result),

    #[error("Failed to create command pool: {0}")]
    CommandPool(vk::Result),

    #[error("Failed to allocate command buffers: {0}")]
    CommandBuffers(vk::Result),

    #[error("Failed to create {what}: {result}")]
    SyncObject { what: &'static str, result: vk::Result },
}

/// Unrecoverable failure while producing a frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Presentation surface lost")]
    SurfaceLost,

    #[error("Vulkan device lost")]
    DeviceLost,

    #[error("Per-image resources have not been built")]
    TargetsMissing,

    #[error("Acquired image index {0} has no per-image resources")]
    ImageIndexOutOfRange(u32),

    #[error("{op} failed: {result}")]
    Vulkan { op: &'static str, result: vk::Result },
}

impl FrameError {
    /// Classify a raw Vulkan error returned by `op`
    pub fn from_vk(op: &'static str, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_SURFACE_LOST_KHR => Self::SurfaceLost,
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            result => Self::Vulkan { op, result },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_conditions_get_their_own_variants() {
        assert_eq!(
            FrameError::from_vk("queue submit", vk::Result::ERROR_DEVICE_LOST),
            FrameError::DeviceLost
        );
        assert_eq!(
            FrameError::from_vk("present", vk::Result::ERROR_SURFACE_LOST_KHR),
            FrameError::SurfaceLost
        );
    }

    #[test]
    fn other_results_keep_operation_name() {
        let err = FrameError::from_vk("wait for fence", vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        assert_eq!(
            err,
            FrameError::Vulkan {
                op: "wait for fence",
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            }
        );
        assert!(err.to_string().starts_with("wait for fence failed"));
    }

    #[test]
    fn no_device_message_matches_diagnostic() {
        assert_eq!(InitError::NoDevice.to_string(), "No Vulkan-capable GPU found");
    }
}
