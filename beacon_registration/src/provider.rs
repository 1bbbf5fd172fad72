//! Periodic registration sender
//!
//! Every refresh cycle the provider sends one sample list made of, in order:
//! the fresh process registration, every sample of every
//! [`RegistrationSource`], and the one-shot samples queued since the last
//! cycle.

use crate::error::{RegistrationError, RegistrationResult};
use crate::gates::RegistrationSource;
use crate::process::LocalProcess;
use crate::sample::Sample;
use crate::sample_list::SampleList;
use crate::transport::{RegistrationSender, ShmSender, UdpSender};
use crate::worker::CyclicWorker;
use beacon::config::{RegistrationConfig, TransportType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type Sources = Arc<Mutex<Vec<Arc<dyn RegistrationSource>>>>;

struct Cycle {
    process: Arc<LocalProcess>,
    sources: Sources,
    pending: Arc<Mutex<SampleList>>,
    sender: Arc<Mutex<Box<dyn RegistrationSender>>>,
    samples: SampleList,
}

impl Cycle {
    fn run(&mut self) {
        self.samples.clear();
        self.samples.push(self.process.registration_sample());

        let sources = self.sources.lock().clone();
        for source in &sources {
            source.get_registrations(&mut self.samples);
        }
        self.samples.extend(self.pending.lock().drain());

        if let Err(e) = self.sender.lock().send_sample_list(&self.samples) {
            debug!(error = %e, "registration send skipped");
        }
    }
}

/// Sends this process's registrations every refresh period
pub struct RegistrationProvider {
    process: Arc<LocalProcess>,
    sources: Sources,
    pending: Arc<Mutex<SampleList>>,
    sender: Arc<Mutex<Box<dyn RegistrationSender>>>,
    worker: Option<CyclicWorker>,
}

impl RegistrationProvider {
    /// Pick a transport from `config` and start the send cycle
    ///
    /// Shared memory is used when configured and available, UDP otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NoTransport`] if no transport could be opened.
    pub fn start(
        config: &RegistrationConfig,
        process: Arc<LocalProcess>,
    ) -> RegistrationResult<Self> {
        let sender = select_sender(config, process.process_id())?;
        Self::with_sender(config.refresh_period(), process, sender)
    }

    /// Start the send cycle on an explicit transport
    pub fn with_sender(
        refresh_period: Duration,
        process: Arc<LocalProcess>,
        sender: Box<dyn RegistrationSender>,
    ) -> RegistrationResult<Self> {
        let sources: Sources = Arc::new(Mutex::new(Vec::new()));
        let pending = Arc::new(Mutex::new(SampleList::new()));
        let sender = Arc::new(Mutex::new(sender));

        let mut cycle = Cycle {
            process: Arc::clone(&process),
            sources: Arc::clone(&sources),
            pending: Arc::clone(&pending),
            sender: Arc::clone(&sender),
            samples: SampleList::new(),
        };
        let worker = CyclicWorker::start("beacon-reg-tx", refresh_period, move || cycle.run())?;

        info!(?refresh_period, "registration provider started");
        Ok(Self {
            process,
            sources,
            pending,
            sender,
            worker: Some(worker),
        })
    }

    /// Include the samples of `source` in every cycle
    pub fn add_source(&self, source: Arc<dyn RegistrationSource>) {
        self.sources.lock().push(source);
    }

    /// Queue `sample` and send it without waiting for the period
    pub fn register_sample(&self, sample: Sample) {
        self.pending.lock().push(sample);
        if let Some(worker) = &self.worker {
            worker.trigger();
        }
    }

    /// Queue `sample` for the next cycle
    pub fn unregister_sample(&self, sample: Sample) {
        self.pending.lock().push(sample);
    }

    /// True until [`stop`](Self::stop)
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Send the process unregistration with the still queued samples and stop
    ///
    /// Calling it again does nothing.
    pub fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        worker.stop();

        let mut last = SampleList::new();
        last.extend(self.pending.lock().drain());
        last.push(self.process.unregistration_sample());
        if let Err(e) = self.sender.lock().send_sample_list(&last) {
            warn!(error = %e, "final registration send failed");
        }
        info!("registration provider stopped");
    }
}

impl Drop for RegistrationProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

fn select_sender(
    config: &RegistrationConfig,
    process_id: i32,
) -> RegistrationResult<Box<dyn RegistrationSender>> {
    if config.transport == TransportType::Shm {
        match ShmSender::new(config, process_id) {
            Ok(sender) => return Ok(Box::new(sender)),
            Err(e) => warn!(error = %e, "shm registration unavailable, falling back to udp"),
        }
    }
    match UdpSender::new(config) {
        Ok(sender) => Ok(Box::new(sender)),
        Err(e) => {
            error!(error = %e, "no registration transport available");
            Err(RegistrationError::NoTransport)
        }
    }
}
