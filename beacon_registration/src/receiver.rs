//! Incoming registration traffic
//!
//! The receiver owns the transport listeners and feeds every decoded sample
//! into the [`SampleApplier`]. User callbacks per [`RegistrationEvent`] are
//! attached to the applier as one more consumer and receive the encoded
//! single-sample frame.

use crate::applier::SampleApplier;
use crate::codec::{decode_sample, encode_sample};
use crate::error::{RegistrationError, RegistrationResult};
use crate::sample::{RegistrationEvent, Sample};
use crate::transport::{ShmReceiver, UdpReceiver};
use beacon::config::{RegistrationConfig, TransportType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Raw user callback receiving an encoded sample
pub type RawSampleCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

const USER_CALLBACK_CUSTOMER: &str = "user_callbacks";

type UserCallbacks = Arc<Mutex<HashMap<RegistrationEvent, RawSampleCallback>>>;

/// Listens for registrations and applies them
pub struct RegistrationReceiver {
    applier: Arc<SampleApplier>,
    user_callbacks: UserCallbacks,
    udp: Option<UdpReceiver>,
    shm: Option<ShmReceiver>,
}

impl RegistrationReceiver {
    /// Start the listener matching `config`
    ///
    /// Shared memory is used when configured and available, UDP otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NoTransport`] if no listener could be started.
    pub fn start(
        config: &RegistrationConfig,
        applier: Arc<SampleApplier>,
    ) -> RegistrationResult<Self> {
        let mut receiver = Self::detached(applier);
        let process_id = receiver.applier.scope().process_id;

        if config.transport == TransportType::Shm {
            let applier = Arc::clone(&receiver.applier);
            let poll_period = config.refresh_period() / 2;
            match ShmReceiver::start(config, process_id, poll_period, move |sample| {
                applier.apply_sample(sample);
            }) {
                Ok(shm) => receiver.shm = Some(shm),
                Err(e) => warn!(error = %e, "shm registration listener unavailable"),
            }
        }

        if receiver.shm.is_none() {
            let applier = Arc::clone(&receiver.applier);
            match UdpReceiver::start(config, move |bytes| {
                apply_encoded(&applier, bytes);
            }) {
                Ok(udp) => receiver.udp = Some(udp),
                Err(e) => {
                    error!(error = %e, "no registration listener available");
                    return Err(RegistrationError::NoTransport);
                }
            }
        }

        info!(
            shm = receiver.shm.is_some(),
            udp = receiver.udp.is_some(),
            "registration receiver started"
        );
        Ok(receiver)
    }

    /// Receiver without listeners; samples arrive through
    /// [`apply_bytes`](Self::apply_bytes) and [`apply_sample`](Self::apply_sample)
    pub fn detached(applier: Arc<SampleApplier>) -> Self {
        let user_callbacks: UserCallbacks = Arc::new(Mutex::new(HashMap::new()));
        let callbacks = Arc::clone(&user_callbacks);
        applier.set_callback(USER_CALLBACK_CUSTOMER, move |sample| {
            dispatch_user_callback(&callbacks, sample);
        });

        Self {
            applier,
            user_callbacks,
            udp: None,
            shm: None,
        }
    }

    /// Applier samples are handed to
    pub fn applier(&self) -> &Arc<SampleApplier> {
        &self.applier
    }

    /// Decode one encoded sample and apply it; undecodable input is dropped
    pub fn apply_bytes(&self, bytes: &[u8]) -> bool {
        apply_encoded(&self.applier, bytes)
    }

    /// Apply one sample
    pub fn apply_sample(&self, sample: &Sample) -> bool {
        self.applier.apply_sample(sample)
    }

    /// Call `callback` with every accepted sample of kind `event`
    pub fn add_registration_callback<F>(&self, event: RegistrationEvent, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.user_callbacks.lock().insert(event, Arc::new(callback));
    }

    /// Remove the callback for `event`
    pub fn remove_registration_callback(&self, event: RegistrationEvent) -> bool {
        self.user_callbacks.lock().remove(&event).is_some()
    }

    /// Deliver samples produced by this process or not
    pub fn enable_loopback(&self, enabled: bool) {
        self.applier.set_loopback(enabled);
    }

    /// Stop all listeners
    pub fn stop(&mut self) {
        if let Some(mut udp) = self.udp.take() {
            udp.stop();
        }
        if let Some(mut shm) = self.shm.take() {
            shm.stop();
        }
    }
}

impl Drop for RegistrationReceiver {
    fn drop(&mut self) {
        self.stop();
        self.applier.remove_callback(USER_CALLBACK_CUSTOMER);
    }
}

fn apply_encoded(applier: &SampleApplier, bytes: &[u8]) -> bool {
    match decode_sample(bytes) {
        Ok(sample) => applier.apply_sample(&sample),
        Err(e) => {
            debug!(error = %e, size = bytes.len(), "registration sample dropped");
            false
        }
    }
}

fn dispatch_user_callback(callbacks: &UserCallbacks, sample: &Sample) {
    let event = sample.cmd_type().event();
    let Some(callback) = callbacks.lock().get(&event).cloned() else {
        return;
    };
    match encode_sample(sample) {
        Ok(bytes) => callback(&bytes),
        Err(e) => debug!(error = %e, "registration callback skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::LocalScope;
    use crate::sample::{Client, SampleIdentifier, Topic};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn receiver() -> RegistrationReceiver {
        let applier = Arc::new(SampleApplier::new(
            LocalScope {
                process_id: 1,
                host_name: "h1".into(),
                shm_transport_domain: "h1".into(),
            },
            false,
            false,
        ));
        RegistrationReceiver::detached(applier)
    }

    #[test]
    fn test_garbage_is_dropped() {
        let receiver = receiver();
        assert!(!receiver.apply_bytes(&[]));
        assert!(!receiver.apply_bytes(b"definitely not a sample"));
    }

    #[test]
    fn test_user_callback_gets_encoded_sample_of_its_kind() {
        let receiver = receiver();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        receiver.add_registration_callback(RegistrationEvent::Client, move |bytes| {
            sink.lock().push(decode_sample(bytes).unwrap());
        });

        let client = Sample::RegisterClient {
            identifier: SampleIdentifier::new(4, 2, "h1"),
            client: Client::default(),
        };
        let publisher = Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(5, 2, "h1"),
            topic: Topic::default(),
        };
        assert!(receiver.apply_bytes(&encode_sample(&client).unwrap()));
        assert!(receiver.apply_sample(&publisher));
        assert!(receiver.apply_sample(&client.to_unregistration()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], client);
        assert!(seen[1].is_unregistration());
    }

    #[test]
    fn test_removed_callback_is_silent() {
        let receiver = receiver();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        receiver.add_registration_callback(RegistrationEvent::Publisher, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(receiver.remove_registration_callback(RegistrationEvent::Publisher));
        assert!(!receiver.remove_registration_callback(RegistrationEvent::Publisher));

        receiver.apply_sample(&Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(5, 2, "h1"),
            topic: Topic::default(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_enable_loopback_delivers_own_samples() {
        let receiver = receiver();
        let own = Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(5, 1, "h1"),
            topic: Topic::default(),
        };
        assert!(!receiver.apply_sample(&own));
        receiver.enable_loopback(true);
        assert!(receiver.apply_sample(&own));
    }
}
