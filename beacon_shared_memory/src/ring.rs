//! Relocatable ring of fixed-size broadcast messages
//!
//! The ring lives inside a byte region at an arbitrary offset of a memory
//! file. It stores only indices, never addresses, so every process can map
//! it wherever it likes.
//!
//! ```text
//! ring header (RING_HEADER_SIZE bytes)
//!      0  8  capacity   slots in the ring
//!      8  8  size       slots currently holding a message
//!     16  8  end        slot the next push writes
//! slot (MESSAGE_SIZE bytes) × capacity
//!      0  4  process_id
//!      8  8  timestamp (µs, monotonic)
//!     16  8  payload_memfile_id
//!     24  1  event type
//! ```
//!
//! Pushing into a full ring overwrites the oldest slot.

use crate::error::{ShmError, ShmResult};
use crate::layout::{
    checked_range, read_i32, read_i64, read_u8, read_u64, write_i32, write_i64, write_u8,
    write_u64,
};
use static_assertions::const_assert_eq;

/// Bytes occupied by the ring header
pub const RING_HEADER_SIZE: usize = 32;

/// Bytes occupied by one message slot
pub const MESSAGE_SIZE: usize = 32;

const_assert_eq!(RING_HEADER_SIZE % 8, 0);
const_assert_eq!(MESSAGE_SIZE % 8, 0);

const OFF_CAPACITY: usize = 0;
const OFF_SIZE: usize = 8;
const OFF_END: usize = 16;

const MSG_PROCESS_ID: usize = 0;
const MSG_TIMESTAMP: usize = 8;
const MSG_PAYLOAD_ID: usize = 16;
const MSG_TYPE: usize = 24;

/// Bytes needed for a ring with `capacity` slots, saturating at `usize::MAX`
pub fn ring_size(capacity: usize) -> usize {
    checked_ring_size(capacity).unwrap_or(usize::MAX)
}

/// Bytes needed for a ring with `capacity` slots, `None` on overflow
pub fn checked_ring_size(capacity: usize) -> Option<usize> {
    capacity
        .checked_mul(MESSAGE_SIZE)?
        .checked_add(RING_HEADER_SIZE)
}

/// What happened to a payload memory file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BroadcastEventType {
    /// Payload file was created
    Created = 1,
    /// Payload file was removed
    Removed = 2,
    /// Payload file contents changed
    Updated = 3,
}

impl TryFrom<u8> for BroadcastEventType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Created),
            2 => Ok(Self::Removed),
            3 => Ok(Self::Updated),
            other => Err(other),
        }
    }
}

/// One entry of the broadcast ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastMessage {
    /// Process that broadcast the message
    pub process_id: i32,
    /// Monotonic timestamp in microseconds
    pub timestamp: i64,
    /// Payload memory file the message refers to
    pub payload_memfile_id: u64,
    /// Event type
    pub event: BroadcastEventType,
}

impl BroadcastMessage {
    fn decode(slot: &[u8]) -> ShmResult<Self> {
        let raw_type = read_u8(slot, MSG_TYPE)?;
        let event = BroadcastEventType::try_from(raw_type).map_err(|value| {
            ShmError::IncompatibleLayout {
                name: "broadcast ring".to_string(),
                reason: format!("unknown event type {value}"),
            }
        })?;
        Ok(Self {
            process_id: read_i32(slot, MSG_PROCESS_ID)?,
            timestamp: read_i64(slot, MSG_TIMESTAMP)?,
            payload_memfile_id: read_u64(slot, MSG_PAYLOAD_ID)?,
            event,
        })
    }

    fn encode(&self, slot: &mut [u8]) -> ShmResult<()> {
        slot.fill(0);
        write_i32(slot, MSG_PROCESS_ID, self.process_id)?;
        write_i64(slot, MSG_TIMESTAMP, self.timestamp)?;
        write_u64(slot, MSG_PAYLOAD_ID, self.payload_memfile_id)?;
        write_u8(slot, MSG_TYPE, self.event as u8)
    }
}

#[derive(Debug, Clone, Copy)]
struct RingState {
    capacity: usize,
    size: usize,
    end: usize,
}

impl RingState {
    fn decode(buf: &[u8]) -> ShmResult<Self> {
        let state = Self {
            capacity: read_u64(buf, OFF_CAPACITY)? as usize,
            size: read_u64(buf, OFF_SIZE)? as usize,
            end: read_u64(buf, OFF_END)? as usize,
        };
        let invalid = |reason: String| ShmError::IncompatibleLayout {
            name: "broadcast ring".to_string(),
            reason,
        };
        if state.capacity == 0 {
            return Err(invalid("zero capacity".to_string()));
        }
        if state.size > state.capacity || state.end >= state.capacity {
            return Err(invalid(format!(
                "size {} / end {} outside capacity {}",
                state.size, state.end, state.capacity
            )));
        }
        let required = checked_ring_size(state.capacity)
            .ok_or_else(|| invalid(format!("capacity {} overflows", state.capacity)))?;
        checked_range(buf.len(), 0, required)?;
        Ok(state)
    }

    fn encode(&self, buf: &mut [u8]) -> ShmResult<()> {
        write_u64(buf, OFF_CAPACITY, self.capacity as u64)?;
        write_u64(buf, OFF_SIZE, self.size as u64)?;
        write_u64(buf, OFF_END, self.end as u64)
    }

    /// Slot index of the `n`-th newest message
    fn slot_of_newest(&self, n: usize) -> usize {
        (self.end + self.capacity - 1 - n) % self.capacity
    }
}

fn slot_range(buf_len: usize, slot: usize) -> ShmResult<std::ops::Range<usize>> {
    checked_range(buf_len, RING_HEADER_SIZE + slot * MESSAGE_SIZE, MESSAGE_SIZE)
}

/// Read-only view over a ring
#[derive(Debug)]
pub struct RingView<'a> {
    buf: &'a [u8],
    state: RingState,
}

impl<'a> RingView<'a> {
    /// Attach to a ring at the start of `buf`, validating its header
    pub fn new(buf: &'a [u8]) -> ShmResult<Self> {
        let state = RingState::decode(buf)?;
        Ok(Self { buf, state })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.state.size
    }

    /// True if no message was pushed since the last reset
    pub fn is_empty(&self) -> bool {
        self.state.size == 0
    }

    /// The `n`-th newest message, `0` being the most recent
    pub fn newest(&self, n: usize) -> ShmResult<BroadcastMessage> {
        if n >= self.state.size {
            return Err(ShmError::OutOfBounds {
                offset: n,
                len: 1,
                size: self.state.size,
            });
        }
        let range = slot_range(self.buf.len(), self.state.slot_of_newest(n))?;
        BroadcastMessage::decode(&self.buf[range])
    }

    /// Messages from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = ShmResult<BroadcastMessage>> + '_ {
        (0..self.state.size).map(move |n| self.newest(n))
    }
}

/// Mutable view over a ring
#[derive(Debug)]
pub struct RingViewMut<'a> {
    buf: &'a mut [u8],
    state: RingState,
}

impl<'a> RingViewMut<'a> {
    /// Write a fresh, empty ring with `capacity` slots into `buf`
    pub fn init(buf: &'a mut [u8], capacity: usize) -> ShmResult<Self> {
        let range = checked_range(buf.len(), 0, ring_size(capacity))?;
        buf[range].fill(0);
        let state = RingState {
            capacity,
            size: 0,
            end: 0,
        };
        state.encode(buf)?;
        Ok(Self { buf, state })
    }

    /// Attach to an existing ring, validating its header
    pub fn attach(buf: &'a mut [u8]) -> ShmResult<Self> {
        let state = RingState::decode(buf)?;
        Ok(Self { buf, state })
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.state.size
    }

    /// True if the ring holds no message
    pub fn is_empty(&self) -> bool {
        self.state.size == 0
    }

    /// Append a message, overwriting the oldest one when full
    pub fn push(&mut self, message: &BroadcastMessage) -> ShmResult<()> {
        let range = slot_range(self.buf.len(), self.state.end)?;
        message.encode(&mut self.buf[range])?;

        self.state.end = (self.state.end + 1) % self.state.capacity;
        self.state.size = (self.state.size + 1).min(self.state.capacity);
        self.state.encode(self.buf)
    }

    /// Drop every message, keeping the capacity
    pub fn clear(&mut self) -> ShmResult<()> {
        self.state.size = 0;
        self.state.end = 0;
        self.state.encode(self.buf)
    }
}
