// Render pass and per-image render targets
//
// The pass has one subpass writing one color attachment: cleared on load,
// stored, and left in the presentable layout.

use super::DeviceContext;
use crate::error::InitError;
use ash::vk;
use std::sync::Arc;

pub struct RenderPass {
    handle: vk::RenderPass,
    format: vk::Format,
    context: Arc<DeviceContext>,
}

impl RenderPass {
    pub fn new(context: Arc<DeviceContext>, format: vk::Format) -> Result<Self, InitError> {
        // Color attachment (the swapchain image)
        let color_attachment = vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments);

        // Layout transition must wait until the acquire semaphore released the image
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let attachments = [color_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let handle = unsafe { context.device().create_render_pass(&render_pass_info, None) }
            .map_err(InitError::RenderPass)?;

        Ok(Self {
            handle,
            format,
            context,
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.context.device().destroy_render_pass(self.handle, None) };
    }
}

/// Command pool bound to the graphics queue family; buffers are individually
/// resettable.
pub struct CommandPool {
    handle: vk::CommandPool,
    context: Arc<DeviceContext>,
}

impl CommandPool {
    pub fn new(context: Arc<DeviceContext>) -> Result<Self, InitError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(context.graphics_queue_family())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let handle = unsafe { context.device().create_command_pool(&pool_info, None) }
            .map_err(InitError::CommandPool)?;

        Ok(Self { handle, context })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Also frees any buffers still allocated from it
        unsafe { self.context.device().destroy_command_pool(self.handle, None) };
    }
}

/// Per-image resources: framebuffer `i` and command buffer `i` both belong to
/// swapchain image `i`. Built and released as one unit.
pub struct FrameTargets {
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    context: Arc<DeviceContext>,
}

impl FrameTargets {
    pub fn new(
        context: Arc<DeviceContext>,
        render_pass: &RenderPass,
        command_pool: &CommandPool,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, InitError> {
        let mut targets = Self {
            framebuffers: Vec::with_capacity(image_views.len()),
            command_buffers: Vec::new(),
            command_pool: command_pool.handle(),
            context,
        };

        for &image_view in image_views {
            let attachments = [image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer =
                unsafe { targets.context.device().create_framebuffer(&framebuffer_info, None) }
                    .map_err(InitError::Framebuffer)?;
            targets.framebuffers.push(framebuffer);
        }

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(targets.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(targets.framebuffers.len() as u32);

        targets.command_buffers =
            unsafe { targets.context.device().allocate_command_buffers(&alloc_info) }
                .map_err(InitError::CommandBuffers)?;

        debug_assert_eq!(targets.framebuffers.len(), targets.command_buffers.len());
        Ok(targets)
    }

    pub(crate) fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Framebuffer and command buffer for swapchain image `index`
    pub fn get(&self, index: u32) -> Option<(vk::Framebuffer, vk::CommandBuffer)> {
        let index = index as usize;
        Some((
            *self.framebuffers.get(index)?,
            *self.command_buffers.get(index)?,
        ))
    }
}

impl Drop for FrameTargets {
    fn drop(&mut self) {
        let device = self.context.device();
        unsafe {
            if !self.command_buffers.is_empty() {
                device.free_command_buffers(self.command_pool, &self.command_buffers);
            }
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
