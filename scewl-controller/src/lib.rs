//! # scewl-controller
//!
//! Hosted SCEWL bus controller.
//!
//! This crate provides:
//! - YAML + environment configuration
//! - Unix-domain and TCP host links for the CPU, radio and FAA channels
//! - The controller that boots the gateway and runs its dispatch loop

pub mod config;
pub mod controller;
pub mod error;
pub mod link;

pub use config::{
    Config, ConfigError, DeviceConfig, GatewayConfig, LinkConfig, LinkRole, LinksConfig, Transport,
};
pub use controller::Controller;
pub use error::ControllerError;
pub use link::HostLink;
