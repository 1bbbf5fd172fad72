//! Application context wiring the registration layer together
//!
//! At most one context exists per process. [`RegistrationContext::create`]
//! fails with [`RegistrationError::AlreadyActive`] while another one is alive.
//!
//! ```text
//!  transport ──▶ RegistrationReceiver ──▶ SampleApplier ──┬─▶ RegistrationMonitor
//!                                               ▲         ├─▶ TimeoutProvider
//!                                               │         ├─▶ topic / service gates
//!                       synthetic unregistrations         └─▶ user callbacks
//!                                               │
//!                                        timeout checker
//!
//!  LocalProcess + sources + one-shot queue ──▶ RegistrationProvider ──▶ transport
//! ```

use crate::applier::SampleApplier;
use crate::error::{RegistrationError, RegistrationResult};
use crate::gates::{RegistrationSource, ServiceGate, TopicGate, attach_service_gate, attach_topic_gate};
use crate::monitoring::{Monitoring, RegistrationMonitor};
use crate::process::{Components, LocalProcess};
use crate::provider::RegistrationProvider;
use crate::receiver::RegistrationReceiver;
use crate::sample::Sample;
use crate::timeout::{SteadyClock, TimeoutProvider};
use crate::worker::CyclicWorker;
use beacon::config::RegistrationConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

static ACTIVE: AtomicBool = AtomicBool::new(false);

struct InstanceGuard;

impl InstanceGuard {
    fn acquire() -> RegistrationResult<Self> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| RegistrationError::AlreadyActive)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}

/// Owns every registration component of this process
pub struct RegistrationContext {
    config: RegistrationConfig,
    process: Arc<LocalProcess>,
    applier: Arc<SampleApplier>,
    monitor: Arc<RegistrationMonitor>,
    timeouts: Arc<TimeoutProvider<SteadyClock>>,
    provider: RegistrationProvider,
    receiver: RegistrationReceiver,
    timeout_checker: CyclicWorker,
    // Released after every component above has stopped.
    _guard: InstanceGuard,
}

impl RegistrationContext {
    /// Validate `config` and start sending and receiving registrations
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::Config`] if `config` is invalid
    /// - [`RegistrationError::AlreadyActive`] if a context already exists
    /// - [`RegistrationError::NoTransport`] if no transport could be opened
    pub fn create(
        config: &RegistrationConfig,
        unit_name: &str,
        components: Components,
    ) -> RegistrationResult<Self> {
        config.validate()?;
        let guard = InstanceGuard::acquire()?;

        let process = Arc::new(LocalProcess::new(unit_name, config, components));
        let applier = Arc::new(SampleApplier::new(
            process.scope(),
            config.network_enabled,
            config.loopback,
        ));

        let monitor = Arc::new(RegistrationMonitor::new());
        monitor.attach(&applier, "monitoring");

        let weak_applier = Arc::downgrade(&applier);
        let timeouts = Arc::new(TimeoutProvider::new(
            config.timeout(),
            SteadyClock,
            move |sample: &Sample| {
                if let Some(applier) = weak_applier.upgrade() {
                    applier.apply_sample(sample);
                }
            },
        ));
        let weak_timeouts = Arc::downgrade(&timeouts);
        applier.set_callback("timeouts", move |sample| {
            if let Some(timeouts) = weak_timeouts.upgrade() {
                timeouts.apply_sample(sample);
            }
        });

        let receiver = RegistrationReceiver::start(config, Arc::clone(&applier))?;
        let provider = RegistrationProvider::start(config, Arc::clone(&process))?;

        let checked = Arc::clone(&timeouts);
        let timeout_checker =
            CyclicWorker::start("beacon-timeouts", config.refresh_period(), move || {
                checked.check_for_timeouts();
            })?;

        info!(
            unit = unit_name,
            process_id = process.process_id(),
            host = process.host_name(),
            domain = process.shm_transport_domain(),
            "registration context created"
        );

        Ok(Self {
            config: config.clone(),
            process,
            applier,
            monitor,
            timeouts,
            provider,
            receiver,
            timeout_checker,
            _guard: guard,
        })
    }

    /// Configuration the context was created with
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// This process
    pub fn process(&self) -> &Arc<LocalProcess> {
        &self.process
    }

    /// Scoping filter and fan-out
    pub fn applier(&self) -> &Arc<SampleApplier> {
        &self.applier
    }

    /// Incoming side
    pub fn receiver(&self) -> &RegistrationReceiver {
        &self.receiver
    }

    /// Number of entities tracked for liveliness
    pub fn tracked_entities(&self) -> usize {
        self.timeouts.len()
    }

    /// Announce `sample` right away
    pub fn register_sample(&self, sample: Sample) {
        self.provider.register_sample(sample);
    }

    /// Withdraw with the next send
    pub fn unregister_sample(&self, sample: Sample) {
        self.provider.unregister_sample(sample);
    }

    /// Add local entities to every registration cycle
    pub fn add_registration_source(&self, source: Arc<dyn RegistrationSource>) {
        self.provider.add_source(source);
    }

    /// Forward accepted topic samples to `gate`
    pub fn set_topic_gate(&self, gate: Arc<dyn TopicGate>) {
        attach_topic_gate(&self.applier, "topic_gate", gate);
    }

    /// Forward accepted service and client samples to `gate`
    pub fn set_service_gate(&self, gate: Arc<dyn ServiceGate>) {
        attach_service_gate(&self.applier, "service_gate", gate);
    }

    /// Current monitoring snapshot
    pub fn monitoring(&self) -> Monitoring {
        self.monitor.snapshot()
    }

    /// Unregister this process and stop every component
    ///
    /// Dropping the context does the same.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if !self.provider.is_running() {
            return;
        }
        self.provider.stop();
        self.receiver.stop();
        self.timeout_checker.stop();
        info!("registration context shut down");
    }
}

impl Drop for RegistrationContext {
    fn drop(&mut self) {
        self.stop();
    }
}
