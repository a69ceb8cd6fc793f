// Backend module - Vulkan abstraction layer
//
// Design: Thin owning wrappers around ash handles. Every wrapper holds an
// Arc<DeviceContext>, so the device always outlives what was created from it.

pub mod device;
pub mod instance;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;

pub use device::DeviceContext;
pub use renderer::FrameRenderer;
pub use swapchain::{FrameStatus, Swapchain};
