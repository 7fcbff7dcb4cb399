//! # scewl-client
//!
//! CPU-side driver for the SCEWL bus controller.
//!
//! This crate provides:
//! - Registration and deregistration through the controller
//! - Unicast, broadcast and FAA sends
//! - Blocking and non-blocking receive over Unix-domain or TCP links

pub mod client;
pub mod error;

pub use client::BusClient;
pub use error::ClientError;
pub use scewl_protocol::{DeviceId, Frame, ReadMode};
