// =============================================================================
// fbxViewer - Vulkan runtime entry point
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (event loop driver)                                        │
// │    └── Window (winit, surface provider)                         │
// │          └── DeviceContext (instance, surface, device, queue)   │
// │                └── Swapchain (presentable images + views)       │
// │                      └── FrameRenderer (pass, cmds, sync)       │
// └─────────────────────────────────────────────────────────────────┘
//
// Any construction failure is fatal: it is printed and the process exits
// with a failure status.
//
// =============================================================================

use fbx_viewer::{App, Config};
use std::process::ExitCode;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const WINDOW_TITLE: &str = "fbxViewer";

fn main() -> ExitCode {
    // Load configuration from config.toml; problems are reported once the
    // logger exists
    let (config, config_error) = Config::load();

    init_logging(&config);
    match config_error {
        Some(e) => log::warn!("Failed to load config.toml: {:#}. Using defaults.", e),
        None => log::debug!("Config: {:?}", config),
    }

    log::info!("Starting {}", WINDOW_TITLE);

    match run(config) {
        Ok(()) => {
            log::info!("Cleanup complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the app, run it to completion and tear it down
fn run(config: Config) -> anyhow::Result<()> {
    let mut app = App::new(WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE, config)?;
    app.run()
}

/// Initialize logging. RUST_LOG takes precedence over the config filter.
fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::new();

    match std::env::var("RUST_LOG") {
        Ok(filter) => builder.parse_filters(&filter),
        Err(_) => builder.parse_filters(&config.debug.log_filter),
    };

    builder.init();
}
