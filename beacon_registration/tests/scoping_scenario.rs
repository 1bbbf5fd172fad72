//! Three processes on three hosts exchanging one publisher registration

use beacon_registration::{
    LocalScope, RegistrationEvent, RegistrationReceiver, Sample, SampleApplier, SampleIdentifier,
    Topic, encode_sample,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn process(pid: i32, host: &str, domain: &str, network: bool) -> RegistrationReceiver {
    let applier = Arc::new(SampleApplier::new(
        LocalScope {
            process_id: pid,
            host_name: host.to_string(),
            shm_transport_domain: domain.to_string(),
        },
        network,
        false,
    ));
    RegistrationReceiver::detached(applier)
}

fn foo_publisher() -> Sample {
    Sample::RegisterPublisher {
        identifier: SampleIdentifier::new(7, 100, "h1"),
        topic: Topic {
            shm_transport_domain: "h1".to_string(),
            host_name: "h1".to_string(),
            process_id: 100,
            topic_name: "foo".to_string(),
            ..Default::default()
        },
    }
}

#[test]
fn test_publisher_visibility_across_domains() {
    let wire = encode_sample(&foo_publisher()).unwrap();

    // A: the publishing process itself, loopback off
    let a = process(100, "h1", "h1", false);
    assert!(!a.apply_bytes(&wire));

    // B: other host in the same domain
    let b = process(200, "h2", "h1", false);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    b.add_registration_callback(RegistrationEvent::Publisher, move |bytes| {
        sink.lock().push(bytes.to_vec());
    });
    assert!(b.apply_bytes(&wire));
    assert_eq!(*seen.lock(), vec![wire.clone()]);

    // C: foreign domain, network off then on
    let c = process(300, "h3", "h3", false);
    assert!(!c.apply_bytes(&wire));
    let c = process(300, "h3", "h3", true);
    assert!(c.apply_bytes(&wire));
}

#[test]
fn test_loopback_lets_publisher_see_itself() {
    let a = process(100, "h1", "h1", false);
    a.enable_loopback(true);
    assert!(a.apply_sample(&foo_publisher()));
}

#[test]
fn test_unregistration_follows_same_scoping() {
    let unregister = foo_publisher().to_unregistration();
    assert!(process(200, "h2", "h1", false).apply_sample(&unregister));
    assert!(!process(300, "h3", "h3", false).apply_sample(&unregister));
}
