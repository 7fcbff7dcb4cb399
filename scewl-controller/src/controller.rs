//! Controller: links from configuration, boot handshake, dispatch loop.

use crate::config::Config;
use crate::error::ControllerError;
use crate::link::HostLink;
use scewl_core::{BootOutcome, Links, Router, RouterStats};

/// The bus controller for one device.
pub struct Controller {
    config: Config,
    router: Router<HostLink>,
}

impl Controller {
    /// Validates the configuration and opens all three links.
    ///
    /// Radio and FAA are opened first; a listening CPU link blocks until the
    /// CPU connects.
    pub fn open(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        let radio = HostLink::open("radio", &config.links.radio)?;
        let faa = HostLink::open("faa", &config.links.faa)?;
        let cpu = HostLink::open("cpu", &config.links.cpu)?;
        Ok(Self::with_links(config, Links::new(cpu, radio, faa)))
    }

    /// Builds a controller over links that are already connected.
    pub fn with_links(config: Config, links: Links<HostLink>) -> Self {
        let router = Router::with_capacity(config.device.id, links, config.gateway.frame_capacity);
        Self { config, router }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router<HostLink> {
        &self.router
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Runs the boot handshake unless disabled by configuration.
    pub fn boot(&mut self) -> Option<BootOutcome> {
        if !self.config.gateway.boot_register {
            tracing::info!("Boot registration disabled, starting unregistered");
            return None;
        }
        Some(self.router.boot())
    }

    /// Runs the dispatch loop until the CPU disconnects.
    pub fn run(&mut self) {
        self.run_until(|_| false);
    }

    /// Runs the dispatch loop until `stop` returns true or the CPU disconnects.
    pub fn run_until<F>(&mut self, mut stop: F)
    where
        F: FnMut(&Router<HostLink>) -> bool,
    {
        let idle_sleep = self.config.gateway.idle_sleep();
        tracing::info!("Device {} entering dispatch loop", self.router.device_id());
        self.router
            .run_until(idle_sleep, |router| router.links().cpu.is_closed() || stop(router));

        let stats = self.router.stats();
        tracing::info!(
            "Dispatch loop stopped: to_cpu={} to_radio={} to_faa={} dropped={} refused={} errors={}",
            stats.to_cpu,
            stats.to_radio,
            stats.to_faa,
            stats.dropped,
            stats.refused,
            stats.errors
        );
    }
}
