//! End-to-end tests for the device context, swapchain and frame renderer
//!
//! All tests require a GPU and a display and are marked with #[ignore].
//!
//! Run with: cargo test --test gpu_runtime -- --ignored --test-threads=1

use fbx_viewer::backend::{DeviceContext, FrameRenderer, FrameStatus, Swapchain};
use fbx_viewer::config::Config;
use fbx_viewer::window::{SurfaceProvider, Window};

const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.10, 1.0];

fn create_test_window() -> Window {
    Window::new(1280, 720, "fbxViewer").unwrap()
}

#[test]
#[ignore] // Requires GPU
fn device_context_selects_graphics_and_present_queue() {
    let window = create_test_window();
    let config = Config::default();
    let context = DeviceContext::new(&window, &config.debug).unwrap();

    let families = unsafe {
        context
            .instance()
            .get_physical_device_queue_family_properties(context.physical_device())
    };
    let family = &families[context.graphics_queue_family() as usize];
    assert!(family.queue_flags.contains(ash::vk::QueueFlags::GRAPHICS));

    let present = unsafe {
        context.surface_loader().get_physical_device_surface_support(
            context.physical_device(),
            context.graphics_queue_family(),
            context.surface(),
        )
    }
    .unwrap();
    assert!(present);
}

#[test]
#[ignore] // Requires GPU
fn swapchain_format_is_one_the_surface_offers() {
    let window = create_test_window();
    let config = Config::default();
    let context = DeviceContext::new(&window, &config.debug).unwrap();
    let swapchain = Swapchain::new(context.clone(), &window, &config.graphics).unwrap();

    let formats = unsafe {
        context
            .surface_loader()
            .get_physical_device_surface_formats(context.physical_device(), context.surface())
    }
    .unwrap();

    assert!(formats
        .iter()
        .any(|f| f.format == swapchain.format() && f.color_space == swapchain.color_space()));
}

#[test]
#[ignore] // Requires GPU
fn per_image_resources_match_swapchain_image_count() {
    let window = create_test_window();
    let config = Config::default();
    let context = DeviceContext::new(&window, &config.debug).unwrap();
    let swapchain = Swapchain::new(context.clone(), &window, &config.graphics).unwrap();
    let renderer = FrameRenderer::new(context.clone(), &swapchain, CLEAR_COLOR).unwrap();

    let images = swapchain.image_count();
    assert!(images > 0);
    assert_eq!(swapchain.images().len(), images);
    assert_eq!(swapchain.image_views().len(), images);
    assert_eq!(renderer.framebuffer_count(), images);
    assert_eq!(renderer.command_buffer_count(), images);

    // Fence starts signaled
    assert!(renderer.sync().is_idle().unwrap());
}

#[test]
#[ignore] // Requires GPU
fn frames_present_and_drain_to_idle() {
    let mut window = create_test_window();
    let config = Config::default();
    let context = DeviceContext::new(&window, &config.debug).unwrap();
    let swapchain = Swapchain::new(context.clone(), &window, &config.graphics).unwrap();
    let mut renderer = FrameRenderer::new(context.clone(), &swapchain, CLEAR_COLOR).unwrap();

    for _ in 0..10 {
        window.poll_events();
        let status = renderer.draw_frame(&swapchain).unwrap();
        assert_ne!(status, FrameStatus::OutOfDate);
    }

    renderer.wait_idle().unwrap();

    // Nothing outstanding: fence signaled again
    assert!(renderer.sync().is_idle().unwrap());
}

#[test]
#[ignore] // Requires GPU
fn rebuilt_targets_keep_counts_aligned() {
    let window = create_test_window();
    let config = Config::default();
    let context = DeviceContext::new(&window, &config.debug).unwrap();
    let mut swapchain = Swapchain::new(context.clone(), &window, &config.graphics).unwrap();
    let mut renderer = FrameRenderer::new(context.clone(), &swapchain, CLEAR_COLOR).unwrap();

    renderer.wait_idle().unwrap();
    renderer.release_targets();
    assert_eq!(renderer.image_count(), 0);

    swapchain.recreate(&window, &config.graphics).unwrap();
    renderer.rebuild_targets(&swapchain).unwrap();

    assert_eq!(renderer.framebuffer_count(), swapchain.image_count());
    assert_eq!(renderer.command_buffer_count(), swapchain.image_count());
}
