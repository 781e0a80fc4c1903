//! # Voxmap Preview
//!
//! Headless preview of the top-down map. Generates a noise terrain, renders
//! the tiles around a center point and the sampled world map view, and
//! writes both as PNG files.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod canvas;
mod config;
mod terrain;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{PreviewConfig, CONFIG_FILE};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("voxmap=info".parse()?))
        .init();

    info!("Voxmap preview starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = PreviewConfig::load_from(&path);

    app::run(&config)?;

    info!("Voxmap preview complete");
    Ok(())
}
