//! Cross-process event broadcast over a memory file
//!
//! Region layout (inside the memory file's data section):
//!
//! ```text
//! ┌──────────────────────────────┬───────────────────────────────────┐
//! │ BroadcastHeader (24 bytes)   │ ring (see `ring` module)          │
//! │ magic | version | queue_off  │ header | slot 0 | slot 1 | ...    │
//! │ timestamp                    │                                   │
//! └──────────────────────────────┴───────────────────────────────────┘
//! ```
//!
//! Writers push under the memory file's exclusive lock. Readers copy the
//! whole region out under the shared lock and scan the copy, so neither
//! side ever holds the lock for longer than a memcpy.

use crate::error::{ShmError, ShmResult};
use crate::layout::{read_i64, read_u32, read_u64, write_i64, write_u32, write_u64};
use crate::memfile::MemoryFile;
use crate::platform::{get_current_pid, monotonic_timestamp_us};
use crate::ring::{
    BroadcastEventType, BroadcastMessage, RingView, RingViewMut, checked_ring_size, ring_size,
};
use beacon::prelude::MEMFILE_ACCESS_TIMEOUT;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Magic number identifying a broadcast region ("BCST")
pub const BROADCAST_MAGIC: u32 = 0x4243_5354;

/// Broadcast layout version
pub const BROADCAST_VERSION: u32 = 1;

/// Bytes occupied by the broadcast header
pub const BROADCAST_HEADER_SIZE: usize = 24;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_QUEUE_OFFSET: usize = 8;
const OFF_TIMESTAMP: usize = 16;

/// Broadcast handle shared between a writer and a reader of one process
pub type SharedBroadcast = Arc<Mutex<MemfileBroadcast>>;

/// Bytes needed for a broadcast with `max_queue_size` ring slots, saturating
pub fn broadcast_size(max_queue_size: usize) -> usize {
    ring_size(max_queue_size).saturating_add(BROADCAST_HEADER_SIZE)
}

/// Name of the payload memory file announced under `payload_memfile_id`
pub fn payload_memfile_name(broadcast_name: &str, payload_memfile_id: u64) -> String {
    format!("{broadcast_name}_{payload_memfile_id}")
}

/// Versioned header at the start of the broadcast region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastHeader {
    /// Magic number
    pub magic: u32,
    /// Layout version
    pub version: u32,
    /// Offset of the ring from the start of the region
    pub message_queue_offset: u64,
    /// Timestamp of the newest message
    pub timestamp: i64,
}

impl BroadcastHeader {
    fn new() -> Self {
        Self {
            magic: BROADCAST_MAGIC,
            version: BROADCAST_VERSION,
            message_queue_offset: BROADCAST_HEADER_SIZE as u64,
            timestamp: 0,
        }
    }

    /// Decode from the start of a region
    pub fn decode(buf: &[u8]) -> ShmResult<Self> {
        Ok(Self {
            magic: read_u32(buf, OFF_MAGIC)?,
            version: read_u32(buf, OFF_VERSION)?,
            message_queue_offset: read_u64(buf, OFF_QUEUE_OFFSET)?,
            timestamp: read_i64(buf, OFF_TIMESTAMP)?,
        })
    }

    /// Encode into the start of a region
    pub fn encode(&self, buf: &mut [u8]) -> ShmResult<()> {
        write_u32(buf, OFF_MAGIC, self.magic)?;
        write_u32(buf, OFF_VERSION, self.version)?;
        write_u64(buf, OFF_QUEUE_OFFSET, self.message_queue_offset)?;
        write_i64(buf, OFF_TIMESTAMP, self.timestamp)
    }

    /// Reject foreign or differently versioned regions
    pub fn check(&self, name: &str) -> ShmResult<()> {
        if self.magic != BROADCAST_MAGIC || self.version != BROADCAST_VERSION {
            return Err(ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!(
                    "broadcast magic {:#x} version {} (expected {:#x} version {})",
                    self.magic, self.version, BROADCAST_MAGIC, BROADCAST_VERSION
                ),
            });
        }
        if (self.message_queue_offset as usize) < BROADCAST_HEADER_SIZE {
            return Err(ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!("queue offset {}", self.message_queue_offset),
            });
        }
        Ok(())
    }

    fn queue<'a>(&self, region: &'a [u8]) -> ShmResult<&'a [u8]> {
        let offset = self.message_queue_offset as usize;
        region.get(offset..).ok_or(ShmError::OutOfBounds {
            offset,
            len: 0,
            size: region.len(),
        })
    }

    fn queue_mut<'a>(&self, region: &'a mut [u8]) -> ShmResult<&'a mut [u8]> {
        let offset = self.message_queue_offset as usize;
        let size = region.len();
        region.get_mut(offset..).ok_or(ShmError::OutOfBounds {
            offset,
            len: 0,
            size,
        })
    }
}

/// Write a fresh header and an empty ring
fn reset_layout(region: &mut [u8], max_queue_size: usize) -> ShmResult<()> {
    let header = BroadcastHeader::new();
    header.encode(region)?;
    RingViewMut::init(header.queue_mut(region)?, max_queue_size)?;
    Ok(())
}

/// Event broadcast backed by a named memory file
pub struct MemfileBroadcast {
    name: String,
    max_queue_size: usize,
    memfile: Option<MemoryFile>,
    process_id: i32,
    last_timestamp: i64,
    access_timeout: Duration,
    snapshot: Vec<u8>,
}

impl MemfileBroadcast {
    /// Open or create the broadcast `name` with room for `max_queue_size` messages
    ///
    /// A fresh region is initialized. An existing region must carry a
    /// compatible header and be at least as large as required.
    pub fn create(name: &str, max_queue_size: usize) -> ShmResult<Self> {
        if max_queue_size == 0 {
            return Err(ShmError::InvalidSize {
                size: 0,
                required: 1,
            });
        }

        let required = checked_ring_size(max_queue_size)
            .and_then(|size| size.checked_add(BROADCAST_HEADER_SIZE))
            .ok_or_else(|| ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!("queue size {} overflows", max_queue_size),
            })?;
        let mut memfile = MemoryFile::create(name, required, MEMFILE_ACCESS_TIMEOUT)?;
        {
            let mut access = memfile.write_access(MEMFILE_ACCESS_TIMEOUT)?;
            if access.cur_data_size() == 0 {
                reset_layout(access.data_mut(), max_queue_size)?;
                access.set_cur_data_size(required)?;
                debug!(name, max_queue_size, "broadcast region initialized");
            } else {
                BroadcastHeader::decode(access.data_mut())?.check(name)?;
            }
        }

        info!(name, max_queue_size, "broadcast created");

        Ok(Self {
            name: name.to_string(),
            max_queue_size,
            memfile: Some(memfile),
            process_id: get_current_pid(),
            last_timestamp: 0,
            access_timeout: MEMFILE_ACCESS_TIMEOUT,
            snapshot: Vec::with_capacity(required),
        })
    }

    /// Stamp outgoing messages with `process_id` and skip incoming ones from it
    pub fn with_process_id(mut self, process_id: i32) -> Self {
        self.process_id = process_id;
        self
    }

    /// Unmap the region; the backing file stays for other processes
    pub fn destroy(&mut self) {
        if self.memfile.take().is_some() {
            info!(name = %self.name, "broadcast destroyed");
        }
    }

    /// Broadcast name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process id used for outgoing messages and loopback filtering
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// True until [`destroy`](Self::destroy) is called
    pub fn is_created(&self) -> bool {
        self.memfile.is_some()
    }

    /// Timestamp of the newest message this instance has consumed
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// Push one message into the ring
    ///
    /// Fails with `AccessTimeout` when the region is busy; callers retry on
    /// their next cycle.
    pub fn broadcast(
        &mut self,
        payload_memfile_id: u64,
        event: BroadcastEventType,
    ) -> ShmResult<()> {
        let memfile = self.memfile.as_mut().ok_or(ShmError::NotCreated)?;
        let mut access = memfile.write_access(self.access_timeout)?;

        if access.cur_data_size() == 0 {
            reset_layout(access.data_mut(), self.max_queue_size)?;
            access.set_cur_data_size(broadcast_size(self.max_queue_size))?;
        }

        let region = access.data_mut();
        let mut header = BroadcastHeader::decode(region)?;
        header.check(&self.name)?;

        // Strictly increasing, even for two writers within the same microsecond.
        let timestamp = monotonic_timestamp_us().max(header.timestamp.saturating_add(1));
        let message = BroadcastMessage {
            process_id: self.process_id,
            timestamp,
            payload_memfile_id,
            event,
        };
        RingViewMut::attach(header.queue_mut(region)?)?.push(&message)?;

        header.timestamp = timestamp;
        header.encode(region)?;

        trace!(name = %self.name, payload_memfile_id, ?event, timestamp, "broadcast");
        Ok(())
    }

    /// Collect messages newer than the last call into `out`, newest first
    ///
    /// With `timeout_ms > 0`, messages older than `now - timeout_ms` are
    /// skipped. Messages from this process are skipped unless `loopback` is set.
    pub fn receive_broadcast(
        &mut self,
        out: &mut Vec<BroadcastMessage>,
        timeout_ms: i64,
        loopback: bool,
    ) -> ShmResult<()> {
        let memfile = self.memfile.as_ref().ok_or(ShmError::NotCreated)?;
        {
            let access = memfile.read_access(self.access_timeout)?;
            self.snapshot.clear();
            self.snapshot.extend_from_slice(access.data());
        }
        if self.snapshot.is_empty() {
            return Ok(());
        }

        let header = BroadcastHeader::decode(&self.snapshot)?;
        header.check(&self.name)?;
        let ring = RingView::new(header.queue(&self.snapshot)?)?;

        let oldest_allowed = (timeout_ms > 0)
            .then(|| monotonic_timestamp_us().saturating_sub(timeout_ms.saturating_mul(1000)));
        for message in ring.iter_newest_first() {
            let message = message?;
            let expired = oldest_allowed.is_some_and(|limit| message.timestamp <= limit);
            if expired || message.timestamp <= self.last_timestamp {
                break;
            }
            if !loopback && message.process_id == self.process_id {
                continue;
            }
            out.push(message);
        }

        self.last_timestamp = header.timestamp;
        Ok(())
    }

    /// Forget all pending messages for this instance without delivering them
    pub fn flush_local_event_queue(&mut self) -> ShmResult<()> {
        let memfile = self.memfile.as_ref().ok_or(ShmError::NotCreated)?;
        let access = memfile.read_access(self.access_timeout)?;
        if access.cur_data_size() > 0 {
            let header = BroadcastHeader::decode(access.data())?;
            header.check(&self.name)?;
            self.last_timestamp = header.timestamp;
        }
        Ok(())
    }

    /// Empty the shared ring for every participant
    ///
    /// The header timestamp is kept so readers' high-water marks stay valid.
    pub fn flush_global_event_queue(&mut self) -> ShmResult<()> {
        let memfile = self.memfile.as_mut().ok_or(ShmError::NotCreated)?;
        let mut access = memfile.write_access(self.access_timeout)?;
        if access.cur_data_size() == 0 {
            reset_layout(access.data_mut(), self.max_queue_size)?;
            access.set_cur_data_size(broadcast_size(self.max_queue_size))?;
            return Ok(());
        }

        let region = access.data_mut();
        let header = BroadcastHeader::decode(region)?;
        header.check(&self.name)?;
        RingViewMut::attach(header.queue_mut(region)?)?.clear()?;
        debug!(name = %self.name, "global event queue flushed");
        Ok(())
    }
}

impl Drop for MemfileBroadcast {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for MemfileBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemfileBroadcast")
            .field("name", &self.name)
            .field("max_queue_size", &self.max_queue_size)
            .field("process_id", &self.process_id)
            .field("last_timestamp", &self.last_timestamp)
            .field("created", &self.memfile.is_some())
            .finish()
    }
}
