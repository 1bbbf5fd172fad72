//! Liveliness tracking with synthetic unregistration on silence
//!
//! The provider performs no I/O and never blocks on anything but its own
//! map lock; its owner calls [`TimeoutProvider::check_for_timeouts`]
//! periodically.

use crate::sample::{Sample, SampleIdentifier};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source for [`TimeoutProvider`]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyClock;

impl Clock for SteadyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Clock frozen at the moment of creation
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Callback receiving synthesized unregistrations
pub type TimeoutCallback = Box<dyn Fn(&Sample) + Send + Sync>;

/// Tracks the last sample per entity and expires silent ones
pub struct TimeoutProvider<C: Clock = SteadyClock> {
    timeout: Duration,
    clock: C,
    entries: Mutex<HashMap<SampleIdentifier, (Sample, Instant)>>,
    on_timeout: TimeoutCallback,
}

impl<C: Clock> TimeoutProvider<C> {
    /// Create a provider expiring entries after `timeout`
    pub fn new<F>(timeout: Duration, clock: C, on_timeout: F) -> Self
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        Self {
            timeout,
            clock,
            entries: Mutex::new(HashMap::new()),
            on_timeout: Box::new(on_timeout),
        }
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Refresh the entity of `sample`, or forget it on an unregistration
    pub fn apply_sample(&self, sample: &Sample) {
        let identifier = sample.identifier();
        let mut entries = self.entries.lock();
        if sample.is_unregistration() {
            entries.remove(identifier);
        } else {
            entries.insert(identifier.clone(), (sample.clone(), self.clock.now()));
        }
    }

    /// Expire silent entities and report each one once
    ///
    /// Returns the number of expired entities.
    pub fn check_for_timeouts(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<Sample> = {
            let mut entries = self.entries.lock();
            let stale: Vec<SampleIdentifier> = entries
                .iter()
                .filter(|(_, (_, seen))| now.saturating_duration_since(*seen) > self.timeout)
                .map(|(identifier, _)| identifier.clone())
                .collect();
            stale
                .iter()
                .filter_map(|identifier| entries.remove(identifier))
                .map(|(sample, _)| sample.to_unregistration())
                .collect()
        };

        for sample in &expired {
            debug!(
                entity_id = sample.identifier().entity_id,
                cmd = ?sample.cmd_type(),
                "registration timed out"
            );
            (self.on_timeout)(sample);
        }
        expired.len()
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{CmdType, Process, Topic};

    fn publisher(entity_id: u64) -> Sample {
        Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(entity_id, 1, "h"),
            topic: Topic {
                topic_name: format!("topic_{entity_id}"),
                data_clock: 77,
                ..Default::default()
            },
        }
    }

    fn provider(clock: Arc<ManualClock>) -> (TimeoutProvider<Arc<ManualClock>>, Arc<Mutex<Vec<Sample>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let provider = TimeoutProvider::new(Duration::from_secs(5), clock, move |s: &Sample| {
            sink.lock().push(s.clone());
        });
        (provider, fired)
    }

    #[test]
    fn test_silent_entity_expires_exactly_once() {
        let clock = Arc::new(ManualClock::new());
        let (provider, fired) = provider(Arc::clone(&clock));

        provider.apply_sample(&publisher(1));
        clock.advance(Duration::from_secs(4));
        assert_eq!(provider.check_for_timeouts(), 0);

        clock.advance(Duration::from_secs(2));
        assert_eq!(provider.check_for_timeouts(), 1);
        assert_eq!(provider.check_for_timeouts(), 0);

        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].cmd_type(), CmdType::UnregisterPublisher);
        assert_eq!(fired[0].identifier().entity_id, 1);
        match &fired[0] {
            Sample::UnregisterPublisher { topic, .. } => {
                assert_eq!(topic.topic_name, "topic_1");
                assert_eq!(topic.data_clock, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_refresh_postpones_expiry() {
        let clock = Arc::new(ManualClock::new());
        let (provider, fired) = provider(Arc::clone(&clock));

        provider.apply_sample(&publisher(1));
        for _ in 0..5 {
            clock.advance(Duration::from_secs(3));
            provider.apply_sample(&publisher(1));
            assert_eq!(provider.check_for_timeouts(), 0);
        }
        assert!(fired.lock().is_empty());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_explicit_unregister_suppresses_timeout() {
        let clock = Arc::new(ManualClock::new());
        let (provider, fired) = provider(Arc::clone(&clock));

        provider.apply_sample(&publisher(1));
        provider.apply_sample(&publisher(1).to_unregistration());
        assert!(provider.is_empty());

        clock.advance(Duration::from_secs(60));
        assert_eq!(provider.check_for_timeouts(), 0);
        assert!(fired.lock().is_empty());
    }

    #[test]
    fn test_unregister_of_unknown_entity_is_harmless() {
        let clock = Arc::new(ManualClock::new());
        let (provider, _) = provider(clock);
        provider.apply_sample(&publisher(9).to_unregistration());
        assert!(provider.is_empty());
    }

    #[test]
    fn test_only_stale_entities_expire() {
        let clock = Arc::new(ManualClock::new());
        let (provider, fired) = provider(Arc::clone(&clock));

        provider.apply_sample(&publisher(1));
        clock.advance(Duration::from_secs(4));
        provider.apply_sample(&Sample::RegisterProcess {
            identifier: SampleIdentifier::new(2, 1, "h"),
            process: Process::default(),
        });
        clock.advance(Duration::from_secs(2));

        assert_eq!(provider.check_for_timeouts(), 1);
        assert_eq!(fired.lock()[0].identifier().entity_id, 1);
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_callback_may_apply_samples() {
        let clock = Arc::new(ManualClock::new());
        let slot: Arc<Mutex<Option<Arc<TimeoutProvider<Arc<ManualClock>>>>>> =
            Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let provider = Arc::new(TimeoutProvider::new(
            Duration::from_secs(1),
            Arc::clone(&clock),
            move |s: &Sample| {
                let provider = inner.lock().clone();
                if let Some(provider) = provider {
                    provider.apply_sample(s);
                }
            },
        ));
        *slot.lock() = Some(Arc::clone(&provider));

        provider.apply_sample(&publisher(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(provider.check_for_timeouts(), 1);

        slot.lock().take();
    }
}
