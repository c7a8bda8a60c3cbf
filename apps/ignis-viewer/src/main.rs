//! Ignis Viewer
//!
//! Opens a window and brings up the Vulkan chain for it: instance, surface,
//! logical device and swapchain. Resizing the window rebuilds the swapchain
//! and closing it tears the chain down in reverse order. Nothing is drawn.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p ignis-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--title <TITLE>`: Window title (default: "Ignis Viewer")
//! - `--width <N>`: Initial window width (default: 1280)
//! - `--height <N>`: Initial window height (default: 720)
//! - `--no-vsync`: Prefer mailbox or immediate presentation
//! - `--validation` / `--no-validation`: Toggle validation layers
//!   (default: on in debug builds)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::{Viewer, ViewerConfig};

fn main() -> anyhow::Result<()> {
    // Check for help flag before touching the window system
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ViewerConfig::from_args(std::env::args().skip(1));
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    // Nothing animates, so only wake up for window events
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut viewer = Viewer::new(config);
    event_loop.run_app(&mut viewer).context("Event loop error")?;
    viewer.finish()
}

fn print_help() {
    eprintln!(
        "Ignis Viewer

USAGE:
    cargo run -p ignis-viewer -- [OPTIONS]

WINDOW OPTIONS:
    --title <TITLE>         Window title (default: Ignis Viewer)
    --width <N>             Initial window width (default: 1280)
    --height <N>            Initial window height (default: 720)

VULKAN OPTIONS:
    --no-vsync              Prefer mailbox or immediate presentation
    --validation            Enable validation layers and the debug messenger
    --no-validation         Disable them (default: enabled in debug builds)

OTHER:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
