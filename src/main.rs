//! scewl - SCEWL bus controller
//!
//! Bridges a device's CPU to the radio bus and the FAA channel, gating bus
//! traffic on registration with the SSS.

use scewl_controller::{Config, Controller};
use scewl_core::BootOutcome;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if SCEWL_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("SCEWL_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Starting scewl controller");
    tracing::info!("  Device id: {}", config.device.id);
    tracing::info!("  Frame capacity: {} bytes", config.gateway.frame_capacity);
    tracing::info!(
        "  Boot registration: {}",
        if config.gateway.boot_register {
            "enabled"
        } else {
            "disabled"
        }
    );

    let mut controller = Controller::open(config).map_err(|e| {
        tracing::error!("Failed to open links: {}", e);
        e
    })?;

    match controller.boot() {
        Some(BootOutcome::Registered) => tracing::info!("Registered with SSS"),
        Some(BootOutcome::Denied) => {
            tracing::warn!("SSS registration failed, bus access denied (FAA stays open)")
        }
        None => {}
    }

    controller.run();
    tracing::info!("CPU disconnected, shutting down");

    Ok(())
}
