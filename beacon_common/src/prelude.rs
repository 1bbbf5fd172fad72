//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use beacon_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use beacon_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    BeaconConfig, ConfigError, ConfigLoader, RegistrationConfig, ShmRegistrationConfig,
    TransportType, UdpRegistrationConfig,
};

// ─── Protocol Constants ─────────────────────────────────────────────
pub use crate::consts::{DEFAULT_REFRESH_MS, DEFAULT_TIMEOUT_MS, MEMFILE_ACCESS_TIMEOUT_MS};

/// Bounded wait for shared memory file access as Duration.
pub const MEMFILE_ACCESS_TIMEOUT: Duration = Duration::from_millis(MEMFILE_ACCESS_TIMEOUT_MS);

/// Default registration refresh period as Duration.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(DEFAULT_REFRESH_MS);
