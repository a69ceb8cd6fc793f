// Synchronization primitives
//
// One set for the whole renderer: a single frame is in flight at a time.
// image_available: acquire -> submit (GPU-GPU)
// render_finished: submit -> present (GPU-GPU)
// in_flight: submit -> CPU (command buffer reuse)

use super::DeviceContext;
use crate::error::InitError;
use ash::vk;
use std::sync::Arc;

pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    context: Arc<DeviceContext>,
}

impl FrameSync {
    pub fn new(context: Arc<DeviceContext>) -> Result<Self, InitError> {
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            context,
        };

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        // Start signaled so the first frame does not wait forever
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        let device = sync.context.device();
        unsafe {
            sync.image_available = device
                .create_semaphore(&semaphore_info, None)
                .map_err(|result| InitError::SyncObject {
                    what: "image-available semaphore",
                    result,
                })?;
            sync.render_finished = device
                .create_semaphore(&semaphore_info, None)
                .map_err(|result| InitError::SyncObject {
                    what: "render-finished semaphore",
                    result,
                })?;
            sync.in_flight_fence = device
                .create_fence(&fence_info, None)
                .map_err(|result| InitError::SyncObject {
                    what: "in-flight fence",
                    result,
                })?;
        }

        Ok(sync)
    }

    /// True when no submitted frame is still running on the GPU
    pub fn is_idle(&self) -> Result<bool, vk::Result> {
        unsafe { self.context.device().get_fence_status(self.in_flight_fence) }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        // Destroying a null handle is a no-op, so partially built sets are fine
        let device = self.context.device();
        unsafe {
            device.destroy_fence(self.in_flight_fence, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_semaphore(self.image_available, None);
        }
    }
}
