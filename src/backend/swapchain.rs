// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Presentation is always FIFO (vsync-locked).

use super::DeviceContext;
use crate::config::GraphicsConfig;
use crate::error::{FrameError, InitError};
use crate::window::SurfaceProvider;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

/// Preferred presentation format: 32-bit BGRA with the standard sRGB curve
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Outcome of a frame that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, but the chain no longer matches the surface exactly
    Suboptimal,
    /// Nothing presented; the chain must be rebuilt
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

pub struct Swapchain {
    image_views: Vec<vk::ImageView>,
    images: Vec<vk::Image>,
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    context: Arc<DeviceContext>,
}

impl Swapchain {
    pub fn new(
        context: Arc<DeviceContext>,
        window: &impl SurfaceProvider,
        graphics: &GraphicsConfig,
    ) -> Result<Self, InitError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(context.instance(), context.device());
        Self::create(context, swapchain_loader, window, graphics, vk::SwapchainKHR::null())
    }

    /// Replace this chain with one matching the surface's current state.
    ///
    /// The caller must make sure the device is idle and that nothing still
    /// references the old image views.
    pub fn recreate(
        &mut self,
        window: &impl SurfaceProvider,
        graphics: &GraphicsConfig,
    ) -> Result<(), InitError> {
        let replacement = Self::create(
            self.context.clone(),
            self.swapchain_loader.clone(),
            window,
            graphics,
            self.swapchain,
        )?;
        // Old chain is retired by the create call and destroyed here
        drop(std::mem::replace(self, replacement));
        Ok(())
    }

    fn create(
        context: Arc<DeviceContext>,
        swapchain_loader: ash::khr::swapchain::Device,
        window: &impl SurfaceProvider,
        graphics: &GraphicsConfig,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, InitError> {
        let surface_loader = context.surface_loader();

        // Query surface capabilities
        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(context.physical_device(), context.surface())
        }
        .map_err(|result| InitError::Query {
            what: "Failed to query surface capabilities",
            result,
        })?;

        // Query supported formats
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(context.physical_device(), context.surface())
        }
        .map_err(|result| InitError::Query {
            what: "Failed to query surface formats",
            result,
        })?;

        let surface_format = choose_surface_format(&formats).ok_or(InitError::NoSurfaceFormat)?;
        let extent = choose_extent(&caps, window.framebuffer_size());
        let image_count = choose_image_count(&caps);
        let pre_transform = choose_pre_transform(&caps);
        let composite_alpha = choose_composite_alpha(&caps, graphics.premultiplied_alpha);

        log::info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {} images requested, {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            image_count,
            composite_alpha
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(context.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(composite_alpha)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(InitError::Swapchain)?;

        // From here on Drop owns the handle, so early returns clean up
        let mut chain = Self {
            image_views: Vec::new(),
            images: Vec::new(),
            swapchain,
            swapchain_loader,
            format: surface_format,
            extent,
            context,
        };

        chain.images = unsafe { chain.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|result| InitError::Query {
                what: "Failed to get swapchain images",
                result,
            })?;

        chain.image_views.reserve(chain.images.len());
        for &image in &chain.images {
            let view = create_image_view(chain.context.device(), image, surface_format.format)?;
            chain.image_views.push(view);
        }

        log::info!("Created swapchain with {} images", chain.images.len());

        Ok(chain)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.format.color_space
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per image, same order as `images()`
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire the next presentable image, signaling `semaphore` once the
    /// presentation engine releases it. Waits without timeout.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquiredImage, FrameError> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        classify_acquire(result)
    }

    /// Queue `image_index` for presentation after `wait_semaphores` signal
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<FrameStatus, FrameError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        classify_present(result)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.context.device().destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView, InitError> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }.map_err(InitError::ImageView)
}

/// Capability extent, or the window's framebuffer size when the surface
/// leaves the extent up to the swapchain (`u32::MAX` sentinel). Never clamped.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: framebuffer_size.0,
            height: framebuffer_size.1,
        }
    } else {
        caps.current_extent
    }
}

/// Preferred BGRA/sRGB-nonlinear pair if offered, otherwise the first format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

/// One more than the minimum, capped by the maximum (0 means no maximum)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// Opaque unless pre-multiplied is both requested and supported
pub fn choose_composite_alpha(
    caps: &vk::SurfaceCapabilitiesKHR,
    prefer_premultiplied: bool,
) -> vk::CompositeAlphaFlagsKHR {
    if prefer_premultiplied
        && caps
            .supported_composite_alpha
            .contains(vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED)
    {
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
    } else {
        vk::CompositeAlphaFlagsKHR::OPAQUE
    }
}

fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<AcquiredImage, FrameError> {
    match result {
        Ok((index, suboptimal)) => Ok(AcquiredImage::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
        Err(e) => Err(FrameError::from_vk("acquire next image", e)),
    }
}

fn classify_present(result: VkResult<bool>) -> Result<FrameStatus, FrameError> {
    match result {
        Ok(false) => Ok(FrameStatus::Presented),
        Ok(true) => Ok(FrameStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
        Err(e) => Err(FrameError::from_vk("queue present", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let extent = choose_extent(&caps(2, 3), (1280, 720));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_follows_framebuffer_without_clamping() {
        let mut caps = caps(2, 3);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        // Outside min/max image extent on purpose
        let extent = choose_extent(&caps, (1280, 720));
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn image_count_is_min_plus_one_capped_by_max() {
        for (min, max, expected) in [(2, 3, 3), (2, 2, 2), (1, 8, 2), (3, 0, 4), (0, 0, 1)] {
            let caps = caps(min, max);
            assert_eq!(choose_image_count(&caps), expected, "min={min} max={max}");
            if max > 0 {
                assert_eq!(choose_image_count(&caps), (min + 1).min(max));
            }
        }
    }

    #[test]
    fn preferred_format_wins_regardless_of_position() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            PREFERRED_FORMAT,
        ];
        assert_eq!(choose_surface_format(&formats), Some(PREFERRED_FORMAT));
    }

    #[test]
    fn falls_back_to_first_format() {
        let first = format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let formats = [
            first,
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats), Some(first));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn identity_transform_preferred_when_supported() {
        let mut caps = caps(2, 3);
        caps.supported_transforms =
            vk::SurfaceTransformFlagsKHR::IDENTITY | vk::SurfaceTransformFlagsKHR::ROTATE_90;
        caps.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&caps), vk::SurfaceTransformFlagsKHR::IDENTITY);

        caps.supported_transforms = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&caps), vk::SurfaceTransformFlagsKHR::ROTATE_90);
    }

    #[test]
    fn composite_alpha_is_opaque_unless_premultiplied_requested() {
        let mut caps = caps(2, 3);
        caps.supported_composite_alpha =
            vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED;

        assert_eq!(choose_composite_alpha(&caps, false), vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(
            choose_composite_alpha(&caps, true),
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
        );

        caps.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::OPAQUE;
        assert_eq!(choose_composite_alpha(&caps, true), vk::CompositeAlphaFlagsKHR::OPAQUE);
    }

    #[test]
    fn acquire_results_are_typed() {
        assert_eq!(
            classify_acquire(Ok((2, false))),
            Ok(AcquiredImage::Image {
                index: 2,
                suboptimal: false
            })
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(AcquiredImage::OutOfDate)
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(FrameError::SurfaceLost)
        );
    }

    #[test]
    fn present_results_are_typed() {
        assert_eq!(classify_present(Ok(false)), Ok(FrameStatus::Presented));
        assert_eq!(classify_present(Ok(true)), Ok(FrameStatus::Suboptimal));
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(FrameStatus::OutOfDate)
        );
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(FrameError::DeviceLost)
        );
    }
}
