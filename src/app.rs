// =============================================================================
// APPLICATION DRIVER
// =============================================================================
//
// Builds the stack in dependency order and runs the loop:
//
//   Window -> DeviceContext -> Swapchain -> FrameRenderer
//
//   loop until close requested:
//     poll events
//     [rebuild swapchain if it went stale]
//     draw one frame
//   wait for GPU idle, then unwind in reverse order
//
// =============================================================================

use crate::backend::{DeviceContext, FrameRenderer, FrameStatus, Swapchain};
use crate::config::Config;
use crate::window::{SurfaceProvider, Window};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main application struct holding all Vulkan resources.
///
/// IMPORTANT: Field order matters for Drop! Resources must be destroyed
/// in reverse order of creation to avoid use-after-free.
pub struct App {
    renderer: FrameRenderer,
    swapchain: Swapchain,
    context: Arc<DeviceContext>,
    window: Window,
    config: Config,
    swapchain_stale: bool,
    fps: FpsCounter,
}

impl App {
    pub fn new(width: u32, height: u32, title: &str, config: Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let window = Window::new(width, height, title).context("Window creation failed")?;
        let context =
            DeviceContext::new(&window, &config.debug).context("Device context creation failed")?;
        let swapchain = Swapchain::new(context.clone(), &window, &config.graphics)
            .context("Swapchain creation failed")?;
        let renderer = FrameRenderer::new(context.clone(), &swapchain, config.graphics.clear_color)
            .context("Frame renderer creation failed")?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            renderer,
            swapchain,
            context,
            window,
            config,
            swapchain_stale: false,
            fps: FpsCounter::new(Instant::now()),
        })
    }

    /// Run until the window asks to close, then wait for the GPU to drain.
    pub fn run(&mut self) -> Result<()> {
        while !self.window.should_close() {
            pump_events(&mut self.window, self.swapchain_stale);

            if self.window.take_resized() {
                self.swapchain_stale = true;
            }

            if self.swapchain_stale && !self.recreate_swapchain()? {
                // Minimized: nothing to present to
                continue;
            }

            match self.renderer.draw_frame(&self.swapchain).context("Frame failed")? {
                FrameStatus::Presented => self.tick_fps(),
                FrameStatus::Suboptimal => {
                    self.tick_fps();
                    self.swapchain_stale = true;
                }
                FrameStatus::OutOfDate => {
                    log::debug!("Swapchain out of date");
                    self.swapchain_stale = true;
                }
            }
        }

        self.renderer
            .wait_idle()
            .context("Failed waiting for GPU idle")?;
        log::info!("GPU idle, shutting down");
        Ok(())
    }

    /// Rebuild the swapchain and its per-image resources.
    ///
    /// Returns false (and leaves the chain stale) while the framebuffer has no
    /// area.
    fn recreate_swapchain(&mut self) -> Result<bool> {
        let (width, height) = self.window.framebuffer_size();
        if width == 0 || height == 0 {
            return Ok(false);
        }

        log::info!("Recreating swapchain for {}x{}", width, height);

        self.renderer.wait_idle()?;
        self.renderer.release_targets();
        self.swapchain
            .recreate(&self.window, &self.config.graphics)
            .context("Swapchain recreation failed")?;
        self.renderer
            .rebuild_targets(&self.swapchain)
            .context("Frame target rebuild failed")?;

        self.swapchain_stale = false;
        Ok(true)
    }

    fn tick_fps(&mut self) {
        if let Some(fps) = self.fps.tick(Instant::now()) {
            if self.config.debug.show_fps {
                log::info!("{:.0} FPS ({:.2}ms)", fps, 1000.0 / fps);
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // run() already drained the GPU on a clean exit; this covers error paths
        if let Err(e) = self.context.wait_idle() {
            log::warn!("device_wait_idle failed: {}", e);
        }
    }
}

/// How long to sleep on window events while there is nothing to present
const MINIMIZED_WAIT: Duration = Duration::from_millis(100);

/// Poll for events, or block briefly while the chain is stale and the
/// framebuffer has no area (minimized), so the loop does not spin.
fn pump_events(window: &mut impl SurfaceProvider, swapchain_stale: bool) {
    let (width, height) = window.framebuffer_size();
    if swapchain_stale && (width == 0 || height == 0) {
        window.wait_events(MINIMIZED_WAIT);
    } else {
        window.poll_events();
    }
}

/// Counts presented frames and reports a rate about once per second
#[derive(Debug)]
pub struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    const INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self { frames: 0, since: now }
    }

    /// Record one frame at `now`; yields frames-per-second when a full
    /// interval has elapsed, then starts a new interval.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < Self::INTERVAL {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}
