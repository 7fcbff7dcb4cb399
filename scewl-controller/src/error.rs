//! Controller error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{name} link {endpoint}: {source}")]
    Link {
        name: &'static str,
        endpoint: String,
        source: std::io::Error,
    },
}
