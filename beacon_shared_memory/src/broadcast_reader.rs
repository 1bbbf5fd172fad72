//! Payload reader following a broadcast's message history

use crate::broadcast::{SharedBroadcast, payload_memfile_name};
use crate::error::ShmResult;
use crate::memfile::MemoryFile;
use crate::ring::{BroadcastEventType, BroadcastMessage};
use beacon::prelude::MEMFILE_ACCESS_TIMEOUT;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Payload change reported by [`MemfileBroadcastReader::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEvent {
    /// Current contents of an updated payload file
    Updated {
        /// Payload file id
        payload_memfile_id: u64,
        /// Payload bytes
        data: Vec<u8>,
    },
    /// Payload file went away
    Removed {
        /// Payload file id
        payload_memfile_id: u64,
    },
}

/// Consumes a broadcast and fetches the payloads it announces
///
/// Messages are handled in broadcast order. A payload updated several
/// times since the last read is fetched once; an update followed by a
/// removal in the same batch yields both events.
pub struct MemfileBroadcastReader {
    broadcast: SharedBroadcast,
    broadcast_name: String,
    loopback: bool,
    payloads: HashMap<u64, MemoryFile>,
    messages: Vec<BroadcastMessage>,
}

impl MemfileBroadcastReader {
    /// Bind to `broadcast`, skipping everything broadcast before this call
    pub fn bind(broadcast: SharedBroadcast, loopback: bool) -> ShmResult<Self> {
        let broadcast_name = {
            let mut guard = broadcast.lock();
            guard.flush_local_event_queue()?;
            guard.name().to_string()
        };
        Ok(Self {
            broadcast,
            broadcast_name,
            loopback,
            payloads: HashMap::new(),
            messages: Vec::new(),
        })
    }

    /// Number of payload files currently mapped
    pub fn open_payload_count(&self) -> usize {
        self.payloads.len()
    }

    /// Read every payload change since the previous call, oldest first
    pub fn read(&mut self, timeout_ms: i64) -> ShmResult<Vec<PayloadEvent>> {
        self.messages.clear();
        self.broadcast
            .lock()
            .receive_broadcast(&mut self.messages, timeout_ms, self.loopback)?;

        // Messages arrive newest first. Replay them oldest first so an
        // update is fetched from the open mapping before a later removal
        // drops it. A payload file only holds its latest contents, so one
        // fetch per id and batch is enough.
        let mut events = Vec::new();
        let mut fetched: Vec<u64> = Vec::new();
        for index in (0..self.messages.len()).rev() {
            let BroadcastMessage {
                payload_memfile_id: id,
                event,
                ..
            } = self.messages[index];
            match event {
                BroadcastEventType::Removed => {
                    if self.payloads.remove(&id).is_some() {
                        debug!(payload_memfile_id = id, "payload released");
                    }
                    fetched.retain(|seen| *seen != id);
                    events.push(PayloadEvent::Removed {
                        payload_memfile_id: id,
                    });
                }
                BroadcastEventType::Created => {
                    self.payload(id);
                }
                BroadcastEventType::Updated => {
                    if fetched.contains(&id) {
                        continue;
                    }
                    if let Some(data) = self.fetch(id) {
                        fetched.push(id);
                        events.push(PayloadEvent::Updated {
                            payload_memfile_id: id,
                            data,
                        });
                    }
                }
            }
        }
        Ok(events)
    }

    /// Mapping for `id`, opened on first use
    fn payload(&mut self, id: u64) -> Option<&MemoryFile> {
        if !self.payloads.contains_key(&id) {
            let name = payload_memfile_name(&self.broadcast_name, id);
            match MemoryFile::open(&name) {
                Ok(memfile) => {
                    debug!(payload = %name, "payload mapped");
                    self.payloads.insert(id, memfile);
                }
                Err(e) => {
                    debug!(payload = %name, error = %e, "payload not available");
                    return None;
                }
            }
        }
        self.payloads.get(&id)
    }

    fn fetch(&mut self, id: u64) -> Option<Vec<u8>> {
        let memfile = self.payload(id)?;
        match memfile.read_access(MEMFILE_ACCESS_TIMEOUT) {
            Ok(access) => Some(access.data().to_vec()),
            Err(e) => {
                warn!(payload_memfile_id = id, error = %e, "payload read skipped");
                None
            }
        }
    }

    /// Drop every payload mapping
    pub fn unbind(&mut self) {
        self.payloads.clear();
    }
}
