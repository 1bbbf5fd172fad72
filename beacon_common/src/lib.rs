//! Beacon Common Library
//!
//! This crate provides shared constants and configuration loading utilities
//! for all beacon workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Protocol defaults and shared memory limits
//! - [`config`] - Configuration loading traits and registration settings
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! beacon = { package = "beacon_common", path = "../beacon_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use beacon_common::consts::*;
//! use beacon_common::config::{BeaconConfig, ConfigLoader, RegistrationConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
