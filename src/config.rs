// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Window size and title are fixed by the caller; this file only tunes how the
// frame is cleared and presented, plus debugging aids.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// RGBA clear color of the empty frame, 0-1 range
    pub clear_color: [f32; 4],
    /// Use pre-multiplied composite alpha when the surface supports it
    pub premultiplied_alpha: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.05, 0.05, 0.10, 1.0],
            premultiplied_alpha: false,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Only honoured in debug builds
    pub validation_layers: bool,
    /// env_logger filter used when RUST_LOG is not set
    pub log_filter: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_filter: "info".to_string(),
            show_fps: false,
        }
    }
}

impl DebugConfig {
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.validation_layers
    }
}

impl Config {
    /// Load `config.toml` from the working directory.
    ///
    /// A missing file gives defaults. A file that cannot be read or parsed
    /// also gives defaults, together with the error, so the caller can report
    /// it once logging is set up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_clear_to_dark_blue_with_opaque_alpha() {
        let config = Config::default();
        assert_eq!(config.graphics.clear_color, [0.05, 0.05, 0.10, 1.0]);
        assert!(!config.graphics.premultiplied_alpha);
        assert_eq!(config.debug.log_filter, "info");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = Config::parse(
            r#"
            [graphics]
            premultiplied_alpha = true

            [debug]
            show_fps = true
            "#,
        )
        .unwrap();

        assert!(config.graphics.premultiplied_alpha);
        assert_eq!(config.graphics.clear_color, [0.05, 0.05, 0.10, 1.0]);
        assert!(config.debug.show_fps);
        assert!(config.debug.validation_layers);
    }

    #[test]
    fn empty_file_is_default() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.graphics.clear_color, GraphicsConfig::default().clear_color);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[graphics]\nclear_color = \"blue\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from_path("definitely/not/here/config.toml").unwrap();
        assert!(!config.debug.show_fps);
    }

    #[test]
    fn broken_file_gives_defaults_and_the_error() {
        let path = std::env::temp_dir().join(format!("fbx-viewer-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[graphics]\nclear_color = \"blue\"\n").unwrap();

        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.graphics.clear_color, GraphicsConfig::default().clear_color);
        let error = error.expect("parse failure should be reported");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_reports_no_error() {
        let (config, error) = Config::load_or_default("definitely/not/here/config.toml");
        assert!(error.is_none());
        assert_eq!(config.debug.log_filter, "info");
    }
}
