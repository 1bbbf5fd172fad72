//! Seams to the pub/sub and service layers
//!
//! Local gates feed their live entities into each registration cycle
//! through [`RegistrationSource`]. Remote entities accepted by the applier
//! reach them through [`TopicGate`] and [`ServiceGate`].

use crate::applier::SampleApplier;
use crate::sample::{Client, Sample, SampleIdentifier, Service, Topic};
use crate::sample_list::SampleList;
use std::sync::Arc;

/// Producer of locally registered entities
pub trait RegistrationSource: Send + Sync {
    /// Append a fresh sample for every live local entity
    fn get_registrations(&self, samples: &mut SampleList);
}

/// Consumer of remote publisher and subscriber announcements
pub trait TopicGate: Send + Sync {
    /// A remote publisher appeared or refreshed
    fn apply_publisher_registration(&self, identifier: &SampleIdentifier, topic: &Topic);
    /// A remote publisher went away
    fn apply_publisher_unregistration(&self, identifier: &SampleIdentifier, topic: &Topic);
    /// A remote subscriber appeared or refreshed
    fn apply_subscriber_registration(&self, identifier: &SampleIdentifier, topic: &Topic);
    /// A remote subscriber went away
    fn apply_subscriber_unregistration(&self, identifier: &SampleIdentifier, topic: &Topic);
}

/// Consumer of remote service and client announcements
pub trait ServiceGate: Send + Sync {
    /// A remote service appeared or refreshed
    fn apply_service_registration(&self, identifier: &SampleIdentifier, service: &Service);
    /// A remote service went away
    fn apply_service_unregistration(&self, identifier: &SampleIdentifier, service: &Service);
    /// A remote client appeared or refreshed
    fn apply_client_registration(&self, identifier: &SampleIdentifier, client: &Client);
    /// A remote client went away
    fn apply_client_unregistration(&self, identifier: &SampleIdentifier, client: &Client);
}

/// Route topic samples to `gate`
pub fn dispatch_topic(gate: &dyn TopicGate, sample: &Sample) {
    match sample {
        Sample::RegisterPublisher { identifier, topic } => {
            gate.apply_publisher_registration(identifier, topic)
        }
        Sample::UnregisterPublisher { identifier, topic } => {
            gate.apply_publisher_unregistration(identifier, topic)
        }
        Sample::RegisterSubscriber { identifier, topic } => {
            gate.apply_subscriber_registration(identifier, topic)
        }
        Sample::UnregisterSubscriber { identifier, topic } => {
            gate.apply_subscriber_unregistration(identifier, topic)
        }
        _ => {}
    }
}

/// Route service and client samples to `gate`
pub fn dispatch_service(gate: &dyn ServiceGate, sample: &Sample) {
    match sample {
        Sample::RegisterService {
            identifier,
            service,
        } => gate.apply_service_registration(identifier, service),
        Sample::UnregisterService {
            identifier,
            service,
        } => gate.apply_service_unregistration(identifier, service),
        Sample::RegisterClient { identifier, client } => {
            gate.apply_client_registration(identifier, client)
        }
        Sample::UnregisterClient { identifier, client } => {
            gate.apply_client_unregistration(identifier, client)
        }
        _ => {}
    }
}

/// Attach `gate` to `applier` as the consumer named `customer`
pub fn attach_topic_gate(applier: &SampleApplier, customer: &str, gate: Arc<dyn TopicGate>) {
    applier.set_callback(customer, move |sample| dispatch_topic(gate.as_ref(), sample));
}

/// Attach `gate` to `applier` as the consumer named `customer`
pub fn attach_service_gate(applier: &SampleApplier, customer: &str, gate: Arc<dyn ServiceGate>) {
    applier.set_callback(customer, move |sample| dispatch_service(gate.as_ref(), sample));
}
