// Vulkan Device Context - Core GPU interface
//
// Responsibilities:
// - Instance + presentation surface ownership
// - Physical device selection (first graphics+present queue family wins)
// - Logical device + queue creation

use super::instance::VulkanInstance;
use crate::config::DebugConfig;
use crate::error::InitError;
use crate::window::SurfaceProvider;
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

/// Window surface, destroyed before the instance that created it
struct PresentSurface {
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Drop for PresentSurface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Device, queue and surface shared by every GPU resource.
///
/// Field order matters for drop: the logical device is destroyed explicitly
/// in `Drop`, then the surface, then the instance.
pub struct DeviceContext {
    device: ash::Device,
    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
    physical_device: vk::PhysicalDevice,
    surface: PresentSurface,
    instance: VulkanInstance,
}

impl DeviceContext {
    /// Create instance, surface and logical device for `window`
    pub fn new(window: &impl SurfaceProvider, debug: &DebugConfig) -> Result<Arc<Self>, InitError> {
        log::info!("Creating Vulkan device context");

        // Step 1: Instance
        let instance = VulkanInstance::new(window, debug.validation_enabled())?;

        // Step 2: Surface
        let surface = PresentSurface {
            loader: ash::khr::surface::Instance::new(instance.entry(), instance.handle()),
            handle: window.create_surface(instance.entry(), instance.handle())?,
        };

        // Step 3: Physical device + queue family
        let (physical_device, graphics_queue_family) =
            Self::pick_physical_device(instance.handle(), &surface)?;

        let properties = unsafe {
            instance
                .handle()
                .get_physical_device_properties(physical_device)
        };
        log::info!(
            "Selected GPU: {} (queue family {})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            graphics_queue_family
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        // Step 4: Logical device
        let (device, graphics_queue) =
            Self::create_logical_device(instance.handle(), physical_device, graphics_queue_family)?;

        Ok(Arc::new(Self {
            device,
            graphics_queue,
            graphics_queue_family,
            physical_device,
            surface,
            instance,
        }))
    }

    pub fn instance(&self) -> &ash::Instance {
        self.instance.handle()
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface.loader
    }

    /// Block until every queued GPU command has completed
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.device.device_wait_idle() }
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface: &PresentSurface,
    ) -> Result<(vk::PhysicalDevice, u32), InitError> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|result| {
            InitError::Query {
                what: "Failed to enumerate physical devices",
                result,
            }
        })?;

        select_device(
            devices.as_slice(),
            |device| {
                unsafe { instance.get_physical_device_queue_family_properties(device) }
                    .iter()
                    .map(|family| family.queue_flags)
                    .collect()
            },
            |device, family| {
                // A failed query counts as "cannot present"
                unsafe {
                    surface
                        .loader
                        .get_physical_device_surface_support(device, family, surface.handle)
                }
                .unwrap_or(false)
            },
        )
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue), InitError> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities);

        let extensions = [ash::khr::swapchain::NAME.as_ptr()];

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(InitError::LogicalDevice)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok((device, graphics_queue))
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(e) = self.wait_idle() {
            log::warn!("device_wait_idle failed during teardown: {}", e);
        }

        unsafe { self.device.destroy_device(None) };
        // surface, then instance, drop after this
    }
}

/// Pick the device and queue family to render with.
///
/// An empty device list is `NoDevice`; devices without a graphics+present
/// family are `NoSuitableDevice`.
pub(crate) fn select_device<D: Copy>(
    devices: &[D],
    queue_families: impl FnMut(D) -> Vec<vk::QueueFlags>,
    supports_present: impl FnMut(D, u32) -> bool,
) -> Result<(D, u32), InitError> {
    if devices.is_empty() {
        return Err(InitError::NoDevice);
    }

    first_fit(devices, queue_families, supports_present).ok_or(InitError::NoSuitableDevice)
}

/// First device, in enumeration order, with a queue family that supports both
/// graphics and presentation. Families are tried in index order and the first
/// hit is final.
pub(crate) fn first_fit<D: Copy>(
    devices: &[D],
    mut queue_families: impl FnMut(D) -> Vec<vk::QueueFlags>,
    mut supports_present: impl FnMut(D, u32) -> bool,
) -> Option<(D, u32)> {
    devices.iter().copied().find_map(|device| {
        queue_families(device)
            .into_iter()
            .enumerate()
            .map(|(index, flags)| (index as u32, flags))
            .find(|&(index, flags)| {
                flags.contains(vk::QueueFlags::GRAPHICS) && supports_present(device, index)
            })
            .map(|(index, _)| (device, index))
    })
}
