//! Controller configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SCEWL_CONFIG)
//! 3. Environment variables

use scewl_protocol::{DeviceId, MAX_DATA_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device identity.
    pub device: DeviceConfig,
    /// Where the three links live.
    pub links: LinksConfig,
    /// Gateway tuning.
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SCEWL_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.device.apply_env_overrides();
        self.links.apply_env_overrides();
        self.gateway.apply_env_overrides();
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        self.links.validate()?;
        self.gateway.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// This device's SCEWL id. Must not be a reserved id.
    pub id: DeviceId,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        // unset; rejected by validate()
        Self {
            id: DeviceId::BROADCAST,
        }
    }
}

impl DeviceConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("SCEWL_DEVICE_ID") {
            if let Ok(parsed) = id.parse::<u16>() {
                self.id = DeviceId::new(parsed);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_reserved() {
            return Err(ConfigError::ValidationError(format!(
                "device.id {} is reserved; set device.id or SCEWL_DEVICE_ID",
                self.id.get()
            )));
        }
        Ok(())
    }
}

/// Transport carrying a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Unix-domain stream socket; the address is a path.
    Unix,
    /// TCP; the address is `host:port`.
    Tcp,
}

/// Which side of the connection the controller takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// Connect to a peer that is already listening.
    Connect,
    /// Listen and accept a single peer.
    Listen,
}

/// One link endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub transport: Transport,
    pub role: LinkRole,
    pub address: String,
    /// Bound on blocking reads, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

impl LinkConfig {
    pub fn unix(role: LinkRole, path: impl Into<String>) -> Self {
        Self {
            transport: Transport::Unix,
            role,
            address: path.into(),
            read_timeout_ms: None,
        }
    }

    pub fn tcp(role: LinkRole, addr: impl Into<String>) -> Self {
        Self {
            transport: Transport::Tcp,
            role,
            address: addr.into(),
            read_timeout_ms: None,
        }
    }

    /// Returns the read timeout as Duration.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "links.{}.address is empty",
                name
            )));
        }
        Ok(())
    }
}

/// Parses `<transport>:<role>:<address>`, e.g. `unix:listen:/tmp/cpu.sock`
/// or `tcp:connect:127.0.0.1:9000`.
impl FromStr for LinkConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::ValidationError(format!("invalid link '{}'", raw));
        let mut parts = raw.splitn(3, ':');
        let transport = match parts.next().map(str::to_lowercase).as_deref() {
            Some("unix") => Transport::Unix,
            Some("tcp") => Transport::Tcp,
            _ => return Err(invalid()),
        };
        let role = match parts.next().map(str::to_lowercase).as_deref() {
            Some("connect") => LinkRole::Connect,
            Some("listen") => LinkRole::Listen,
            _ => return Err(invalid()),
        };
        let address = parts.next().filter(|a| !a.is_empty()).ok_or_else(invalid)?;
        Ok(Self {
            transport,
            role,
            address: address.to_string(),
            read_timeout_ms: None,
        })
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport = match self.transport {
            Transport::Unix => "unix",
            Transport::Tcp => "tcp",
        };
        let role = match self.role {
            LinkRole::Connect => "connect",
            LinkRole::Listen => "listen",
        };
        write!(f, "{}:{}:{}", transport, role, self.address)
    }
}

/// The CPU, radio and FAA link endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub cpu: LinkConfig,
    pub radio: LinkConfig,
    pub faa: LinkConfig,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            cpu: LinkConfig::unix(LinkRole::Listen, "/tmp/scewl/cpu.sock"),
            radio: LinkConfig::unix(LinkRole::Connect, "/tmp/scewl/radio.sock"),
            faa: LinkConfig::unix(LinkRole::Connect, "/tmp/scewl/faa.sock"),
        }
    }
}

impl LinksConfig {
    fn apply_env_overrides(&mut self) {
        for (var, link) in [
            ("SCEWL_CPU_LINK", &mut self.cpu),
            ("SCEWL_RADIO_LINK", &mut self.radio),
            ("SCEWL_FAA_LINK", &mut self.faa),
        ] {
            if let Ok(raw) = std::env::var(var) {
                match raw.parse::<LinkConfig>() {
                    Ok(parsed) => {
                        let timeout = link.read_timeout_ms;
                        *link = LinkConfig {
                            read_timeout_ms: timeout,
                            ..parsed
                        };
                    }
                    Err(e) => tracing::warn!("Ignoring {}: {}", var, e),
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.cpu.validate("cpu")?;
        self.radio.validate("radio")?;
        self.faa.validate("faa")
    }
}

/// Gateway tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Payload bytes kept per frame; longer frames are cut and drained.
    pub frame_capacity: usize,
    /// Sleep between idle loop iterations in microseconds (0 = spin).
    pub idle_sleep_us: u64,
    /// Register with the SSS before entering the loop.
    pub boot_register: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            frame_capacity: MAX_DATA_SIZE,
            idle_sleep_us: 200,
            boot_register: true,
        }
    }
}

impl GatewayConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(capacity) = std::env::var("SCEWL_FRAME_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.frame_capacity = n;
            }
        }

        if let Ok(sleep) = std::env::var("SCEWL_IDLE_SLEEP_US") {
            if let Ok(us) = sleep.parse() {
                self.idle_sleep_us = us;
            }
        }

        if let Ok(boot) = std::env::var("SCEWL_BOOT_REGISTER") {
            self.boot_register = boot == "1" || boot.to_lowercase() == "true";
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_capacity == 0 || self.frame_capacity > MAX_DATA_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "gateway.frame_capacity must be between 1 and {}",
                MAX_DATA_SIZE
            )));
        }
        Ok(())
    }

    /// Returns the idle sleep as Duration, or None when disabled.
    pub fn idle_sleep(&self) -> Option<Duration> {
        (self.idle_sleep_us > 0).then(|| Duration::from_micros(self.idle_sleep_us))
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
