//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! and describes every registration setting the core consumes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use beacon_common::config::{BeaconConfig, ConfigLoader, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = BeaconConfig::load(Path::new("beacon.toml"))?;
//!     config.validate()?;
//!     println!("refresh: {} ms", config.registration.refresh_ms);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_BROADCAST_NAME, DEFAULT_BROADCAST_QUEUE_SIZE, DEFAULT_REFRESH_MS, DEFAULT_TIMEOUT_MS,
    DEFAULT_UDP_BUFFER_SIZE, DEFAULT_UDP_GROUP, DEFAULT_UDP_LOCAL_ADDRESS, DEFAULT_UDP_PORT,
    DEFAULT_UDP_TTL,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Transport used to exchange registration samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// UDP multicast (network) or broadcast (host-local).
    #[default]
    Udp,
    /// Shared memory broadcast ring.
    Shm,
}

/// Shared memory registration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmRegistrationConfig {
    /// Name of the broadcast memory file.
    pub name: String,
    /// Ring capacity in messages.
    pub queue_size: usize,
}

impl Default for ShmRegistrationConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BROADCAST_NAME.to_string(),
            queue_size: DEFAULT_BROADCAST_QUEUE_SIZE,
        }
    }
}

/// UDP registration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpRegistrationConfig {
    /// Multicast group used when network registration is enabled.
    pub group: String,
    /// Destination used when registration stays on this host.
    pub local_address: String,
    /// Registration port.
    pub port: u16,
    /// Multicast time-to-live.
    pub ttl: u32,
    /// Socket send buffer in bytes.
    pub send_buffer: usize,
    /// Socket receive buffer in bytes.
    pub receive_buffer: usize,
}

impl Default for UdpRegistrationConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_UDP_GROUP.to_string(),
            local_address: DEFAULT_UDP_LOCAL_ADDRESS.to_string(),
            port: DEFAULT_UDP_PORT,
            ttl: DEFAULT_UDP_TTL,
            send_buffer: DEFAULT_UDP_BUFFER_SIZE,
            receive_buffer: DEFAULT_UDP_BUFFER_SIZE,
        }
    }
}

/// Registration layer configuration.
///
/// # TOML Example
///
/// ```toml
/// [registration]
/// refresh_ms = 1000
/// timeout_ms = 60000
/// loopback = false
/// network_enabled = true
/// transport = "shm"
///
/// [registration.shm]
/// name = "beacon_registration"
/// queue_size = 1024
///
/// [registration.udp]
/// group = "239.0.0.1"
/// port = 14000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Registration refresh period in milliseconds.
    pub refresh_ms: u64,
    /// Silence after which an entity is considered gone, in milliseconds.
    pub timeout_ms: u64,
    /// Deliver samples produced by this process to local consumers.
    pub loopback: bool,
    /// Accept samples from outside the shm transport domain.
    pub network_enabled: bool,
    /// Shm transport domain; empty means "use the host name".
    pub shm_transport_domain: String,
    /// Registration transport.
    pub transport: TransportType,
    /// Shared memory transport settings.
    pub shm: ShmRegistrationConfig,
    /// UDP transport settings.
    pub udp: UdpRegistrationConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            loopback: false,
            network_enabled: false,
            shm_transport_domain: String::new(),
            transport: TransportType::default(),
            shm: ShmRegistrationConfig::default(),
            udp: UdpRegistrationConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Refresh period as a [`Duration`].
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    /// Registration timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Shm transport domain, falling back to `host_name` when unset.
    pub fn effective_shm_domain(&self, host_name: &str) -> String {
        if self.shm_transport_domain.is_empty() {
            host_name.to_string()
        } else {
            self.shm_transport_domain.clone()
        }
    }

    /// Destination address for outgoing UDP registration traffic.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configured address does not parse.
    pub fn udp_destination(&self) -> Result<Ipv4Addr, ConfigError> {
        let address = if self.network_enabled {
            &self.udp.group
        } else {
            &self.udp.local_address
        };
        address.parse().map_err(|_| {
            ConfigError::ValidationError(format!("invalid udp address '{address}'"))
        })
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `refresh_ms` is zero
    /// - `timeout_ms` is not larger than `refresh_ms`
    /// - `shm.queue_size` is zero or `shm.name` is empty
    /// - `udp.port` is zero or an address does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_ms == 0 {
            return Err(ConfigError::ValidationError(
                "refresh_ms must be greater than zero".to_string(),
            ));
        }
        if self.timeout_ms <= self.refresh_ms {
            return Err(ConfigError::ValidationError(format!(
                "timeout_ms ({}) must be greater than refresh_ms ({})",
                self.timeout_ms, self.refresh_ms
            )));
        }
        if self.shm.queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "shm.queue_size must be greater than zero".to_string(),
            ));
        }
        if self.shm.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "shm.name cannot be empty".to_string(),
            ));
        }
        if self.udp.port == 0 {
            return Err(ConfigError::ValidationError(
                "udp.port cannot be zero".to_string(),
            ));
        }
        for address in [&self.udp.group, &self.udp.local_address] {
            if address.parse::<Ipv4Addr>().is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "invalid udp address '{address}'"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Registration layer settings.
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl BeaconConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistrationConfig::validate`] failures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registration.validate()
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
