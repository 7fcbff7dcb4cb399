//! # scewl-core
//!
//! Gateway logic for the SCEWL bus controller.
//!
//! This crate provides:
//! - Registration with the SSS, including the boot recovery policy
//! - The routing core that decides which frames cross which link
//! - Gateway error types

pub mod error;
pub mod registration;
pub mod router;

pub use error::{GatewayError, Refusal};
pub use registration::{BootOutcome, RegistrationManager, RegistrationState};
pub use router::{LinkKind, Links, Router, RouterStats};
