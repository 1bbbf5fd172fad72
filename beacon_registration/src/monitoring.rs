//! Snapshot of everything currently registered

use crate::applier::SampleApplier;
use crate::sample::{Client, Process, Sample, SampleIdentifier, Service, Topic};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One known entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringEntry<T> {
    /// Entity identifier
    pub identifier: SampleIdentifier,
    /// Last announced payload
    pub info: T,
}

/// Registered entities at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Monitoring {
    /// Processes
    pub processes: Vec<MonitoringEntry<Process>>,
    /// Publishers
    pub publishers: Vec<MonitoringEntry<Topic>>,
    /// Subscribers
    pub subscribers: Vec<MonitoringEntry<Topic>>,
    /// Services
    pub services: Vec<MonitoringEntry<Service>>,
    /// Clients
    pub clients: Vec<MonitoringEntry<Client>>,
}

impl Monitoring {
    /// Total number of entities
    pub fn len(&self) -> usize {
        self.processes.len()
            + self.publishers.len()
            + self.subscribers.len()
            + self.services.len()
            + self.clients.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type EntityMap<T> = BTreeMap<SampleIdentifier, T>;

#[derive(Debug, Default)]
struct Entities {
    processes: EntityMap<Process>,
    publishers: EntityMap<Topic>,
    subscribers: EntityMap<Topic>,
    services: EntityMap<Service>,
    clients: EntityMap<Client>,
}

fn entries<T: Clone>(map: &EntityMap<T>) -> Vec<MonitoringEntry<T>> {
    map.iter()
        .map(|(identifier, info)| MonitoringEntry {
            identifier: identifier.clone(),
            info: info.clone(),
        })
        .collect()
}

/// Keeps the last sample of every registered entity
#[derive(Debug, Default)]
pub struct RegistrationMonitor {
    entities: Mutex<Entities>,
}

impl RegistrationMonitor {
    /// Empty monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume accepted samples from `applier` under the name `customer`
    pub fn attach(self: &Arc<Self>, applier: &SampleApplier, customer: &str) {
        let monitor = Arc::downgrade(self);
        applier.set_callback(customer, move |sample| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.apply_sample(sample);
            }
        });
    }

    /// Record or forget the entity of `sample`
    pub fn apply_sample(&self, sample: &Sample) {
        let mut entities = self.entities.lock();
        match sample {
            Sample::RegisterProcess {
                identifier,
                process,
            } => {
                entities
                    .processes
                    .insert(identifier.clone(), process.clone());
            }
            Sample::UnregisterProcess { identifier, .. } => {
                entities.processes.remove(identifier);
            }
            Sample::RegisterPublisher { identifier, topic } => {
                entities.publishers.insert(identifier.clone(), topic.clone());
            }
            Sample::UnregisterPublisher { identifier, .. } => {
                entities.publishers.remove(identifier);
            }
            Sample::RegisterSubscriber { identifier, topic } => {
                entities.subscribers.insert(identifier.clone(), topic.clone());
            }
            Sample::UnregisterSubscriber { identifier, .. } => {
                entities.subscribers.remove(identifier);
            }
            Sample::RegisterService {
                identifier,
                service,
            } => {
                entities.services.insert(identifier.clone(), service.clone());
            }
            Sample::UnregisterService { identifier, .. } => {
                entities.services.remove(identifier);
            }
            Sample::RegisterClient { identifier, client } => {
                entities.clients.insert(identifier.clone(), client.clone());
            }
            Sample::UnregisterClient { identifier, .. } => {
                entities.clients.remove(identifier);
            }
        }
    }

    /// Current registrations, ordered by entity id
    pub fn snapshot(&self) -> Monitoring {
        let entities = self.entities.lock();
        Monitoring {
            processes: entries(&entities.processes),
            publishers: entries(&entities.publishers),
            subscribers: entries(&entities.subscribers),
            services: entries(&entities.services),
            clients: entries(&entities.clients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(entity_id: u64, topic_name: &str) -> Sample {
        Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(entity_id, 2, "h"),
            topic: Topic {
                topic_name: topic_name.to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_snapshot_tracks_register_and_unregister() {
        let monitor = RegistrationMonitor::new();
        monitor.apply_sample(&publisher(2, "b"));
        monitor.apply_sample(&publisher(1, "a"));
        monitor.apply_sample(&Sample::RegisterService {
            identifier: SampleIdentifier::new(3, 2, "h"),
            service: Service::default(),
        });

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.len(), 3);
        let names: Vec<&str> = snapshot
            .publishers
            .iter()
            .map(|e| e.info.topic_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        monitor.apply_sample(&publisher(1, "a").to_unregistration());
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.publishers.len(), 1);
        assert_eq!(snapshot.services.len(), 1);
    }

    #[test]
    fn test_refresh_replaces_payload() {
        let monitor = RegistrationMonitor::new();
        monitor.apply_sample(&publisher(1, "old"));
        monitor.apply_sample(&publisher(1, "new"));
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.publishers.len(), 1);
        assert_eq!(snapshot.publishers[0].info.topic_name, "new");
    }

    #[test]
    fn test_snapshot_serializes() {
        let monitor = RegistrationMonitor::new();
        monitor.apply_sample(&publisher(1, "a"));
        let json = serde_json::to_value(monitor.snapshot()).unwrap();
        assert_eq!(json["publishers"][0]["identifier"]["entity_id"], 1);
        assert_eq!(json["publishers"][0]["info"]["topic_name"], "a");
        assert!(json["processes"].as_array().unwrap().is_empty());
    }
}
