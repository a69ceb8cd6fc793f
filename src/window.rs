// Window surface provider
//
// The GPU side only needs a handful of things from the windowing layer:
// which instance extensions to enable, a surface, the framebuffer size and
// whether the user asked to close. `SurfaceProvider` captures exactly that;
// `Window` implements it on top of winit with a pumped (poll-style) loop.

use crate::error::InitError;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::WindowId,
};

/// Capabilities the renderer consumes from the windowing layer
pub trait SurfaceProvider {
    /// Instance extensions required to present to this window
    fn required_extensions(&self) -> Result<Vec<*const c_char>, InitError>;

    /// Create a presentation surface for `instance`.
    ///
    /// The caller owns the returned handle and must destroy it before the
    /// instance.
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR, InitError>;

    /// Current drawable size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    fn should_close(&self) -> bool;

    /// Process pending input/window events without blocking
    fn poll_events(&mut self);

    /// Block until an event arrives or `timeout` elapses
    fn wait_events(&mut self, timeout: Duration);

    /// True once after the window changed size
    fn take_resized(&mut self) -> bool {
        false
    }
}

/// Flags updated by the event pump
#[derive(Debug, Default)]
struct WindowState {
    close_requested: bool,
    resized: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

/// OS window backed by winit
pub struct Window {
    // Dropped before the event loop that created it
    window: winit::window::Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Window {
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self, InitError> {
        let event_loop = EventLoop::new().map_err(|e| InitError::Window(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let attributes = winit::window::Window::default_attributes()
            .with_title(title)
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        #[allow(deprecated)]
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| InitError::Window(e.to_string()))?;

        log::info!("Window: {}x{} \"{}\"", width, height, title);

        Ok(Self {
            window,
            state: WindowState::default(),
            event_loop,
        })
    }
}

impl SurfaceProvider for Window {
    fn required_extensions(&self) -> Result<Vec<*const c_char>, InitError> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| InitError::Window(format!("Failed to get display handle: {}", e)))?;

        ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map(|names| names.to_vec())
            .map_err(InitError::SurfaceExtensions)
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR, InitError> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| InitError::Window(format!("Failed to get display handle: {}", e)))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| InitError::Window(format!("Failed to get window handle: {}", e)))?;

        // Handles come from a live window that outlives the surface (see App field order)
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(InitError::Surface)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);

        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn wait_events(&mut self, timeout: Duration) {
        // Poll would turn the timeout into a zero wait
        self.event_loop.set_control_flow(ControlFlow::Wait);
        let status = self.event_loop.pump_app_events(Some(timeout), &mut self.state);
        self.event_loop.set_control_flow(ControlFlow::Poll);

        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }
}
