//! # Beacon Shared Memory Broadcast
//!
//! Shared memory building blocks for the beacon registration protocol: named
//! memory files with a bounded-timeout cross-process lock, a relocatable ring
//! of fixed-size event messages, and the broadcast built on top of it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │ Broadcast       │    │ Broadcast memfile    │    │ Broadcast       │
//! │ Writer          ├───►│ [Header|Ring]        ├───►│ Reader          │
//! │                 │    │ Created/Updated/...  │    │                 │
//! └────────┬────────┘    └──────────────────────┘    └────────┬────────┘
//!          │                                                  │
//!          │             ┌──────────────────────┐             │
//!          └────────────►│ Payload memfile      ├────────────►┘
//!                        │ {name}_{payload_id}  │
//!                        └──────────────────────┘
//! ```
//!
//! The ring carries only "who changed" (a 32-byte message); the payload
//! memory files carry "what changed" and are fetched lazily.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon_shared_memory::{
//!     MemfileBroadcast, MemfileBroadcastReader, MemfileBroadcastWriter, PayloadEvent,
//! };
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tx = Arc::new(Mutex::new(MemfileBroadcast::create("example_bcast", 64)?));
//! let rx = Arc::new(Mutex::new(MemfileBroadcast::create("example_bcast", 64)?));
//!
//! let mut reader = MemfileBroadcastReader::bind(rx, true)?;
//! let mut writer = MemfileBroadcastWriter::bind(tx);
//! writer.write(b"hello")?;
//!
//! for event in reader.read(0)? {
//!     if let PayloadEvent::Updated { data, .. } = event {
//!         assert_eq!(data, b"hello");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ShmError>`. `AccessTimeout` means the
//! region was busy for longer than the access bound and the operation should
//! simply be retried on the next cycle.
//!
//! ## Thread Safety
//!
//! - **MemfileBroadcast**: NOT thread-safe; share it as [`SharedBroadcast`]
//! - **MemoryFile**: cross-process access is serialized by `flock`
//! - **MemfileBroadcastWriter / Reader**: one per thread

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod broadcast;
pub mod broadcast_reader;
pub mod broadcast_writer;
pub mod error;
pub mod layout;
pub mod memfile;
pub mod platform;
pub mod ring;

pub use broadcast::{
    BROADCAST_MAGIC, BROADCAST_VERSION, BroadcastHeader, MemfileBroadcast, SharedBroadcast,
    broadcast_size, payload_memfile_name,
};
pub use broadcast_reader::{MemfileBroadcastReader, PayloadEvent};
pub use broadcast_writer::MemfileBroadcastWriter;
pub use error::{ShmError, ShmResult};
pub use memfile::{MemoryFile, ReadAccess, WriteAccess};
pub use platform::{get_current_pid, host_name, monotonic_timestamp_us, unlink_memfile};
pub use ring::{BroadcastEventType, BroadcastMessage};

/// Initialize tracing for tests and tools
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
