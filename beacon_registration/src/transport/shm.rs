//! Shared memory registration transport

use crate::codec::{decode_sample_list, encode_sample_list};
use crate::error::RegistrationResult;
use crate::sample::Sample;
use crate::sample_list::SampleList;
use crate::transport::RegistrationSender;
use crate::worker::CyclicWorker;
use beacon::config::RegistrationConfig;
use beacon_shared_memory::{
    MemfileBroadcast, MemfileBroadcastReader, MemfileBroadcastWriter, PayloadEvent,
    SharedBroadcast,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

fn open_broadcast(config: &RegistrationConfig, process_id: i32) -> RegistrationResult<SharedBroadcast> {
    let broadcast = MemfileBroadcast::create(&config.shm.name, config.shm.queue_size)?
        .with_process_id(process_id);
    Ok(Arc::new(Mutex::new(broadcast)))
}

/// Publishes each cycle's sample list as one payload
pub struct ShmSender {
    writer: MemfileBroadcastWriter,
}

impl ShmSender {
    /// Attach to the broadcast named in `config`
    pub fn new(config: &RegistrationConfig, process_id: i32) -> RegistrationResult<Self> {
        let broadcast = open_broadcast(config, process_id)?;
        info!(name = %config.shm.name, "shm registration sender ready");
        Ok(Self {
            writer: MemfileBroadcastWriter::bind(broadcast),
        })
    }
}

impl RegistrationSender for ShmSender {
    fn send_sample_list(&mut self, samples: &SampleList) -> RegistrationResult<()> {
        let payload = encode_sample_list(samples.as_slice())?;
        self.writer.write(&payload)?;
        Ok(())
    }
}

/// Polls the broadcast and hands every decoded sample to a handler
pub struct ShmReceiver {
    worker: CyclicWorker,
}

impl ShmReceiver {
    /// Bind a reader and poll it every `poll_period`
    pub fn start<F>(
        config: &RegistrationConfig,
        process_id: i32,
        poll_period: Duration,
        handler: F,
    ) -> RegistrationResult<Self>
    where
        F: Fn(&Sample) + Send + 'static,
    {
        let broadcast = open_broadcast(config, process_id)?;
        // Own samples are filtered by the applier, so the reader keeps them.
        let mut reader = MemfileBroadcastReader::bind(broadcast, true)?;

        let worker = CyclicWorker::start("beacon-shm-rx", poll_period, move || {
            // No age limit; the high-water mark already prevents redelivery
            // and stale entities are expired by the timeout provider.
            let events = match reader.read(0) {
                Ok(events) => events,
                Err(e) => {
                    debug!(error = %e, "shm registration read skipped");
                    return;
                }
            };
            for event in events {
                let PayloadEvent::Updated { data, .. } = event else {
                    continue;
                };
                match decode_sample_list(&data) {
                    Ok(samples) => samples.iter().for_each(&handler),
                    Err(e) => debug!(error = %e, "shm registration payload dropped"),
                }
            }
        })?;

        info!(name = %config.shm.name, ?poll_period, "shm registration receiver started");
        Ok(Self { worker })
    }

    /// Stop polling
    pub fn stop(&mut self) {
        self.worker.stop();
    }
}
