//! Scoping filter and fan-out for incoming samples
//!
//! A sample is *local* when it comes from this host or carries this
//! process's shm transport domain. Local samples are accepted unless they
//! come from this very process and loopback is off. Non-local samples are
//! accepted only with network registration enabled.

use crate::sample::Sample;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Consumer of accepted samples
pub type SampleCallback = Arc<dyn Fn(&Sample) + Send + Sync>;

/// Where this process sits, as seen by the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalScope {
    /// This process's id
    pub process_id: i32,
    /// This host's name
    pub host_name: String,
    /// This process's shm transport domain
    pub shm_transport_domain: String,
}

/// Filters incoming samples and hands accepted ones to named consumers
pub struct SampleApplier {
    scope: LocalScope,
    network_enabled: bool,
    loopback: AtomicBool,
    callbacks: Mutex<HashMap<String, SampleCallback>>,
}

impl SampleApplier {
    /// Create an applier for `scope`
    pub fn new(scope: LocalScope, network_enabled: bool, loopback: bool) -> Self {
        Self {
            scope,
            network_enabled,
            loopback: AtomicBool::new(loopback),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Local scope used for filtering
    pub fn scope(&self) -> &LocalScope {
        &self.scope
    }

    /// Deliver samples produced by this process or not
    pub fn set_loopback(&self, enabled: bool) {
        self.loopback.store(enabled, Ordering::Relaxed);
    }

    /// Current loopback setting
    pub fn loopback(&self) -> bool {
        self.loopback.load(Ordering::Relaxed)
    }

    /// Register or replace the consumer called `customer`
    pub fn set_callback<F>(&self, customer: &str, callback: F)
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .insert(customer.to_string(), Arc::new(callback));
    }

    /// Remove the consumer called `customer`
    pub fn remove_callback(&self, customer: &str) -> bool {
        self.callbacks.lock().remove(customer).is_some()
    }

    fn is_same_process(&self, sample: &Sample) -> bool {
        sample.identifier().process_id == self.scope.process_id
    }

    fn is_same_host(&self, sample: &Sample) -> bool {
        sample.identifier().host_name == self.scope.host_name
    }

    fn is_same_shm_domain(&self, sample: &Sample) -> bool {
        if self.is_same_host(sample) {
            return true;
        }
        // Process, service and client samples carry no domain and count as local.
        sample
            .shm_transport_domain()
            .is_none_or(|domain| domain == self.scope.shm_transport_domain)
    }

    /// Scoping decision for `sample`
    pub fn accept(&self, sample: &Sample) -> bool {
        if self.is_same_shm_domain(sample) {
            !(self.is_same_process(sample) && !self.loopback())
        } else {
            self.network_enabled
        }
    }

    /// Filter `sample` and pass it to every consumer if accepted
    ///
    /// Returns whether the sample was accepted.
    pub fn apply_sample(&self, sample: &Sample) -> bool {
        if !self.accept(sample) {
            debug!(
                entity_id = sample.identifier().entity_id,
                cmd = ?sample.cmd_type(),
                "sample rejected by scope"
            );
            return false;
        }

        let callbacks: Vec<SampleCallback> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(sample);
        }
        true
    }
}

impl std::fmt::Debug for SampleApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleApplier")
            .field("scope", &self.scope)
            .field("network_enabled", &self.network_enabled)
            .field("loopback", &self.loopback())
            .field("customers", &self.callbacks.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{SampleIdentifier, Service, Topic};
    use std::sync::atomic::AtomicUsize;

    fn scope() -> LocalScope {
        LocalScope {
            process_id: 100,
            host_name: "h1".to_string(),
            shm_transport_domain: "d1".to_string(),
        }
    }

    fn publisher(process_id: i32, host: &str, domain: &str) -> Sample {
        Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(7, process_id, host),
            topic: Topic {
                shm_transport_domain: domain.to_string(),
                topic_name: "foo".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_filter_matrix() {
        // (same_process, same_domain, network, loopback, unregister) -> accepted
        for same_process in [false, true] {
            for same_domain in [false, true] {
                for network in [false, true] {
                    for loopback in [false, true] {
                        for unregister in [false, true] {
                            let applier = SampleApplier::new(scope(), network, loopback);
                            let pid = if same_process { 100 } else { 200 };
                            let domain = if same_domain { "d1" } else { "d9" };
                            let mut sample = publisher(pid, "h9", domain);
                            if unregister {
                                sample = sample.to_unregistration();
                            }

                            let expected = if same_domain {
                                !same_process || loopback
                            } else {
                                network
                            };
                            assert_eq!(
                                applier.accept(&sample),
                                expected,
                                "process={same_process} domain={same_domain} \
                                 network={network} loopback={loopback} unreg={unregister}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_host_counts_as_same_domain() {
        let applier = SampleApplier::new(scope(), false, false);
        assert!(applier.accept(&publisher(200, "h1", "other")));
    }

    #[test]
    fn test_service_samples_count_as_same_domain() {
        let applier = SampleApplier::new(scope(), false, false);
        let sample = Sample::RegisterService {
            identifier: SampleIdentifier::new(3, 200, "h9"),
            service: Service::default(),
        };
        assert!(applier.accept(&sample));
    }

    #[test]
    fn test_accepted_samples_reach_every_customer() {
        let applier = SampleApplier::new(scope(), false, false);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&first);
        applier.set_callback("first", move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = Arc::clone(&second);
        applier.set_callback("second", move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        assert!(applier.apply_sample(&publisher(200, "h9", "d1")));
        assert!(!applier.apply_sample(&publisher(200, "h9", "d9")));
        assert!(applier.remove_callback("second"));
        assert!(applier.apply_sample(&publisher(200, "h9", "d1")));

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_apply_is_idempotent() {
        let applier = SampleApplier::new(scope(), false, false);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        applier.set_callback("count", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let sample = publisher(200, "h9", "d1");
        let decisions: Vec<bool> = (0..5).map(|_| applier.apply_sample(&sample)).collect();
        assert!(decisions.iter().all(|d| *d));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_callback_may_reenter_applier() {
        let applier = Arc::new(SampleApplier::new(scope(), false, false));
        let weak = Arc::downgrade(&applier);
        applier.set_callback("reentrant", move |_| {
            if let Some(applier) = weak.upgrade() {
                applier.remove_callback("reentrant");
            }
        });
        assert!(applier.apply_sample(&publisher(200, "h9", "d1")));
    }

    #[test]
    fn test_loopback_toggle() {
        let applier = SampleApplier::new(scope(), false, false);
        let own = publisher(100, "h1", "d1");
        assert!(!applier.accept(&own));
        applier.set_loopback(true);
        assert!(applier.accept(&own));
    }
}
