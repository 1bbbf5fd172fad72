//! System-wide constants for the beacon workspace.
//!
//! Single source of truth for protocol defaults and shared memory limits.
//! Imported by all crates; no duplication permitted.

/// Default registration refresh period in milliseconds.
pub const DEFAULT_REFRESH_MS: u64 = 1000;

/// Default registration timeout in milliseconds.
///
/// An entity that has not been refreshed for this long is treated as gone.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Bounded wait for read/write access to a shared memory file, in milliseconds.
pub const MEMFILE_ACCESS_TIMEOUT_MS: u64 = 200;

/// Default name of the registration broadcast memory file.
pub const DEFAULT_BROADCAST_NAME: &str = "beacon_registration";

/// Default capacity (in messages) of the broadcast ring.
pub const DEFAULT_BROADCAST_QUEUE_SIZE: usize = 1024;

/// Default UDP multicast group used when network registration is enabled.
pub const DEFAULT_UDP_GROUP: &str = "239.0.0.1";

/// Default UDP destination used for host-local registration.
pub const DEFAULT_UDP_LOCAL_ADDRESS: &str = "127.255.255.255";

/// Default UDP registration port.
pub const DEFAULT_UDP_PORT: u16 = 14000;

/// Default multicast time-to-live.
pub const DEFAULT_UDP_TTL: u32 = 3;

/// Default socket send/receive buffer size in bytes (5 MiB).
pub const DEFAULT_UDP_BUFFER_SIZE: usize = 5 * 1024 * 1024;

/// Largest payload that fits into a single UDP datagram.
pub const MAX_UDP_DATAGRAM_SIZE: usize = 65_507;

/// Directory backing POSIX shared memory on Linux.
pub const SHM_DIR: &str = "/dev/shm";

/// Maximum size of a single memory file (1 GiB).
pub const MEMFILE_MAX_SIZE: usize = 1_073_741_824;

/// CPU cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/beacon/beacon.toml";
