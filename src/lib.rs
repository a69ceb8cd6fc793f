// GPU runtime of the fbxViewer application: device context, swapchain and
// the acquire -> record -> submit -> present frame loop.

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod window;

pub use app::App;
pub use config::Config;
pub use error::{FrameError, InitError};
