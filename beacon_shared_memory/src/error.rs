//! Error types for shared memory operations

use thiserror::Error;

/// Errors that can occur during shared memory operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Memory file not found
    #[error("Memory file not found: {name}")]
    NotFound {
        /// Memory file name
        name: String,
    },

    /// Invalid memory file size
    #[error("Invalid memory file size: {size} bytes (required {required})")]
    InvalidSize {
        /// Actual or requested size in bytes
        size: usize,
        /// Size the operation needed
        required: usize,
    },

    /// Read or write access could not be acquired in time
    #[error("Access to memory file '{name}' timed out")]
    AccessTimeout {
        /// Memory file name
        name: String,
    },

    /// Magic or version mismatch in a mapped layout
    #[error("Incompatible layout in '{name}': {reason}")]
    IncompatibleLayout {
        /// Memory file name
        name: String,
        /// What did not match
        reason: String,
    },

    /// Checked access outside the mapped region
    #[error("Access out of bounds: offset {offset} + len {len} exceeds {size}")]
    OutOfBounds {
        /// Start offset
        offset: usize,
        /// Access length
        len: usize,
        /// Available bytes
        size: usize,
    },

    /// Operation on a broadcast that was never created or already destroyed
    #[error("Broadcast not created")]
    NotCreated,

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
