//! Error types for the registration layer

use crate::codec::CodecError;
use beacon::config::ConfigError;
use beacon_shared_memory::ShmError;
use thiserror::Error;

/// Result type for registration operations
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Error type for registration operations
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shared memory transport failed
    #[error("Shared memory error: {0}")]
    Shm(#[from] ShmError),

    /// Socket or thread setup failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample encoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Neither shared memory nor UDP could be enabled
    #[error("No registration transport available")]
    NoTransport,

    /// A registration context already exists in this process
    #[error("Registration context already active")]
    AlreadyActive,
}
