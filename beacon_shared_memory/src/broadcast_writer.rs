//! Payload writer announcing its updates through a broadcast

use crate::broadcast::{SharedBroadcast, payload_memfile_name};
use crate::error::ShmResult;
use crate::memfile::MemoryFile;
use crate::platform::{get_current_pid, unlink_memfile};
use crate::ring::BroadcastEventType;
use beacon::prelude::MEMFILE_ACCESS_TIMEOUT;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

static NEXT_PAYLOAD_SEQ: AtomicU32 = AtomicU32::new(1);

/// Process-unique payload id: pid in the upper half, a sequence in the lower
fn next_payload_memfile_id() -> u64 {
    let seq = NEXT_PAYLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
    ((get_current_pid() as u32 as u64) << 32) | seq as u64
}

/// Writes variable-size payloads into a private memory file
///
/// The payload file is created on the first write and doubled (as a new
/// file under a new id) whenever a write does not fit. Every write is
/// announced as `Updated`; replacement files as `Removed` + `Created`.
pub struct MemfileBroadcastWriter {
    broadcast: SharedBroadcast,
    broadcast_name: String,
    payload: Option<(u64, MemoryFile)>,
}

impl MemfileBroadcastWriter {
    /// Bind a writer to `broadcast`
    pub fn bind(broadcast: SharedBroadcast) -> Self {
        let broadcast_name = broadcast.lock().name().to_string();
        Self {
            broadcast,
            broadcast_name,
            payload: None,
        }
    }

    /// Id of the current payload memory file, if one exists
    pub fn payload_memfile_id(&self) -> Option<u64> {
        self.payload.as_ref().map(|(id, _)| *id)
    }

    /// Capacity of the current payload memory file
    pub fn capacity(&self) -> usize {
        self.payload
            .as_ref()
            .map_or(0, |(_, memfile)| memfile.max_data_size())
    }

    /// Copy `data` into the payload file and announce the update
    pub fn write(&mut self, data: &[u8]) -> ShmResult<()> {
        if data.len() > self.capacity() || self.payload.is_none() {
            let capacity = (self.capacity() * 2).max(data.len()).max(1);
            self.replace_payload(capacity)?;
        }

        let id = match self.payload.as_mut() {
            Some((id, memfile)) => {
                memfile.write_access(MEMFILE_ACCESS_TIMEOUT)?.write(data)?;
                *id
            }
            None => return Ok(()),
        };

        self.broadcast
            .lock()
            .broadcast(id, BroadcastEventType::Updated)
    }

    fn replace_payload(&mut self, capacity: usize) -> ShmResult<()> {
        self.release_payload();

        let id = next_payload_memfile_id();
        let name = payload_memfile_name(&self.broadcast_name, id);
        let memfile = MemoryFile::create(&name, capacity, MEMFILE_ACCESS_TIMEOUT)?;
        debug!(payload = %name, capacity, "payload memory file created");

        self.payload = Some((id, memfile));
        self.broadcast
            .lock()
            .broadcast(id, BroadcastEventType::Created)
    }

    fn release_payload(&mut self) {
        let Some((id, memfile)) = self.payload.take() else {
            return;
        };

        if let Err(e) = self.broadcast.lock().broadcast(id, BroadcastEventType::Removed) {
            warn!(payload_memfile_id = id, error = %e, "failed to announce payload removal");
        }
        let name = memfile.name().to_string();
        drop(memfile);
        if let Err(e) = unlink_memfile(&name) {
            warn!(payload = %name, error = %e, "failed to remove payload memory file");
        }
    }

    /// Remove the payload file and announce it
    pub fn unbind(&mut self) {
        self.release_payload();
    }
}

impl Drop for MemfileBroadcastWriter {
    fn drop(&mut self) {
        self.unbind();
    }
}
