// Frame renderer
//
// FRAME FLOW (one frame in flight):
// 1. Wait for the previous frame's fence
// 2. Acquire swapchain image (signals image_available)
// 3. Reset fence, re-record the image's command buffer (clear only)
// 4. Submit (waits image_available, signals render_finished + fence)
// 5. Present (waits render_finished)

use super::render_pass::{CommandPool, FrameTargets, RenderPass};
use super::swapchain::{AcquiredImage, FrameStatus, Swapchain};
use super::sync::FrameSync;
use super::DeviceContext;
use crate::error::{FrameError, InitError};
use ash::vk;
use std::sync::Arc;

/// Owns every per-frame GPU resource.
///
/// IMPORTANT: Field order matters for Drop! Fields drop top to bottom, which
/// is the reverse of creation order.
pub struct FrameRenderer {
    sync: FrameSync,
    targets: Option<FrameTargets>,
    command_pool: CommandPool,
    render_pass: RenderPass,
    clear_color: [f32; 4],
    extent: vk::Extent2D,
    wait_stages: [vk::PipelineStageFlags; 1],
    context: Arc<DeviceContext>,
}

impl FrameRenderer {
    pub fn new(
        context: Arc<DeviceContext>,
        swapchain: &Swapchain,
        clear_color: [f32; 4],
    ) -> Result<Self, InitError> {
        let render_pass = RenderPass::new(context.clone(), swapchain.format())?;
        let command_pool = CommandPool::new(context.clone())?;
        let targets = FrameTargets::new(
            context.clone(),
            &render_pass,
            &command_pool,
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        let sync = FrameSync::new(context.clone())?;

        log::info!(
            "Frame renderer ready: {} framebuffers, {} command buffers",
            targets.framebuffer_count(),
            targets.command_buffer_count()
        );

        Ok(Self {
            sync,
            targets: Some(targets),
            command_pool,
            render_pass,
            clear_color,
            extent: swapchain.extent(),
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            context,
        })
    }

    /// Number of per-image resource slots (0 while released)
    pub fn image_count(&self) -> usize {
        self.targets.as_ref().map_or(0, FrameTargets::len)
    }

    pub fn framebuffer_count(&self) -> usize {
        self.targets.as_ref().map_or(0, FrameTargets::framebuffer_count)
    }

    pub fn command_buffer_count(&self) -> usize {
        self.targets.as_ref().map_or(0, FrameTargets::command_buffer_count)
    }

    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Render and present one cleared frame.
    ///
    /// Blocks until the previous frame finished on the GPU. All waits are
    /// unbounded.
    pub fn draw_frame(&mut self, swapchain: &Swapchain) -> Result<FrameStatus, FrameError> {
        let device = self.context.device();
        let targets = self
            .targets
            .as_ref()
            .ok_or(FrameError::TargetsMissing)?;

        // STEP 1: Wait for the previous frame
        unsafe { device.wait_for_fences(&[self.sync.in_flight_fence], true, u64::MAX) }
            .map_err(|e| FrameError::from_vk("wait for in-flight fence", e))?;

        // STEP 2: Acquire. Fence stays signaled if we bail out here.
        let (image_index, acquire_suboptimal) =
            match swapchain.acquire_next_image(self.sync.image_available)? {
                AcquiredImage::Image { index, suboptimal } => (index, suboptimal),
                AcquiredImage::OutOfDate => return Ok(FrameStatus::OutOfDate),
            };

        let (framebuffer, cmd) = targets
            .get(image_index)
            .ok_or(FrameError::ImageIndexOutOfRange(image_index))?;

        unsafe { device.reset_fences(&[self.sync.in_flight_fence]) }
            .map_err(|e| FrameError::from_vk("reset in-flight fence", e))?;

        // STEP 3: Record
        self.record(cmd, framebuffer)?;

        // STEP 4: Submit
        let wait_semaphores = [self.sync.image_available];
        let signal_semaphores = [self.sync.render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.queue_submit(
                self.context.graphics_queue(),
                &[submit_info],
                self.sync.in_flight_fence,
            )
        }
        .map_err(|e| FrameError::from_vk("queue submit", e))?;

        // STEP 5: Present
        let status = swapchain.present(
            self.context.graphics_queue(),
            image_index,
            &signal_semaphores,
        )?;

        Ok(match status {
            FrameStatus::Presented if acquire_suboptimal => FrameStatus::Suboptimal,
            status => status,
        })
    }

    fn record(&self, cmd: vk::CommandBuffer, framebuffer: vk::Framebuffer) -> Result<(), FrameError> {
        let device = self.context.device();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| FrameError::from_vk("reset command buffer", e))?;
            device
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
                .map_err(|e| FrameError::from_vk("begin command buffer", e))?;

            // Load op clears the image; nothing is drawn yet
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_end_render_pass(cmd);

            device
                .end_command_buffer(cmd)
                .map_err(|e| FrameError::from_vk("end command buffer", e))?;
        }

        Ok(())
    }

    /// Drop framebuffers and command buffers ahead of a swapchain rebuild.
    /// The device must be idle.
    pub fn release_targets(&mut self) {
        self.targets = None;
    }

    /// Rebuild per-image resources for a (re)created swapchain.
    /// The device must be idle.
    pub fn rebuild_targets(&mut self, swapchain: &Swapchain) -> Result<(), InitError> {
        self.targets = None;

        if self.render_pass.format() != swapchain.format() {
            log::info!(
                "Swapchain format changed {:?} -> {:?}, rebuilding render pass",
                self.render_pass.format(),
                swapchain.format()
            );
            self.render_pass = RenderPass::new(self.context.clone(), swapchain.format())?;
        }

        self.targets = Some(FrameTargets::new(
            self.context.clone(),
            &self.render_pass,
            &self.command_pool,
            swapchain.image_views(),
            swapchain.extent(),
        )?);
        self.extent = swapchain.extent();

        Ok(())
    }

    /// Block until all submitted GPU work has finished
    pub fn wait_idle(&self) -> Result<(), FrameError> {
        self.context
            .wait_idle()
            .map_err(|e| FrameError::from_vk("device wait idle", e))
    }
}
