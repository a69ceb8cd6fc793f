//! Process-level startup behavior without a display
//!
//! With every display variable cleared, winit cannot open a window, so the
//! binary must report the failure once and exit with a failure status.

#![cfg(target_os = "linux")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fbx-viewer-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_headless(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fbx-viewer"))
        .current_dir(dir)
        .env_remove("DISPLAY")
        .env_remove("WAYLAND_DISPLAY")
        .env_remove("WAYLAND_SOCKET")
        .env_remove("RUST_LOG")
        .env_remove("RUST_BACKTRACE")
        .output()
        .unwrap()
}

#[test]
fn window_failure_is_fatal_and_reported_once() {
    let dir = scratch_dir("headless");
    let output = run_headless(&dir);
    std::fs::remove_dir_all(&dir).unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert_eq!(stderr.matches("Fatal: Window creation failed").count(), 1, "stderr: {stderr}");
    assert!(!stderr.lines().any(|line| line.starts_with("Error: ")), "stderr: {stderr}");
}

#[test]
fn broken_config_is_warned_about_and_defaults_are_used() {
    let dir = scratch_dir("bad-config");
    std::fs::write(dir.join("config.toml"), "[graphics]\nclear_color = \"blue\"\n").unwrap();
    let output = run_headless(&dir);
    std::fs::remove_dir_all(&dir).unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config.toml"), "stderr: {stderr}");
    assert!(stderr.contains("Using defaults"), "stderr: {stderr}");
    // Default "info" filter is in effect
    assert!(stderr.contains("Starting fbxViewer"), "stderr: {stderr}");
}
