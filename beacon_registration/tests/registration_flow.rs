//! End-to-end registration through a real transport

use beacon::config::{RegistrationConfig, TransportType};
use beacon_registration::transport::{ShmReceiver, ShmSender};
use beacon_registration::{
    CmdType, Components, LocalProcess, RegistrationContext, RegistrationError,
    RegistrationProvider, RegistrationSource, Sample, SampleIdentifier, SampleList, Topic,
    TopicDirection,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .map(|a| a.port())
        .unwrap()
}

fn udp_config() -> RegistrationConfig {
    let mut config = RegistrationConfig::default();
    config.refresh_ms = 50;
    config.timeout_ms = 500;
    config.loopback = true;
    config.udp.local_address = "127.0.0.1".to_string();
    config.udp.port = free_port();
    config
}

fn shm_config() -> RegistrationConfig {
    let mut config = udp_config();
    config.transport = TransportType::Shm;
    config.shm.name = format!(
        "beacon_flow_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    );
    config.shm.queue_size = 64;
    config
}

fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

struct FooPublisher {
    identifier: SampleIdentifier,
}

impl RegistrationSource for FooPublisher {
    fn get_registrations(&self, samples: &mut SampleList) {
        samples.push(Sample::RegisterPublisher {
            identifier: self.identifier.clone(),
            topic: Topic {
                topic_name: "foo".to_string(),
                direction: TopicDirection::Publisher,
                ..Default::default()
            },
        });
    }
}

fn run_self_discovery(config: &RegistrationConfig) {
    let context = RegistrationContext::create(config, "flow", Components::PUBLISHER).unwrap();
    let own_id = context.process().identifier().entity_id;

    assert!(eventually(|| {
        context
            .monitoring()
            .processes
            .iter()
            .any(|p| p.identifier.entity_id == own_id)
    }));

    let publisher = Arc::new(FooPublisher {
        identifier: SampleIdentifier::new(
            0xF00,
            context.process().process_id(),
            context.process().host_name(),
        ),
    });
    context.add_registration_source(publisher);
    assert!(eventually(|| {
        context
            .monitoring()
            .publishers
            .iter()
            .any(|p| p.info.topic_name == "foo")
    }));

    context.shutdown();
}

#[test]
#[serial]
fn test_process_discovers_itself_over_udp() {
    run_self_discovery(&udp_config());
}

#[test]
#[serial]
fn test_process_discovers_itself_over_shm() {
    let config = shm_config();
    run_self_discovery(&config);
    let _ = beacon_shared_memory::unlink_memfile(&config.shm.name);
}

#[test]
#[serial]
fn test_unregistration_reaches_shm_peer_after_stop() {
    let config = shm_config();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    // Slower than the refresh cycle so the last update and the payload
    // removal land in the same poll.
    let mut receiver = ShmReceiver::start(&config, 7002, Duration::from_millis(300), move |s| {
        sink.lock().push(s.cmd_type());
    })
    .unwrap();

    let process = Arc::new(LocalProcess::with_identity(
        "leaving",
        "h1",
        7001,
        "h1",
        Components::PUBLISHER,
    ));
    let mut provider = RegistrationProvider::with_sender(
        Duration::from_millis(50),
        process,
        Box::new(ShmSender::new(&config, 7001).unwrap()),
    )
    .unwrap();

    assert!(eventually(|| seen.lock().contains(&CmdType::RegisterProcess)));
    provider.stop();
    drop(provider);

    assert!(eventually(|| seen.lock().contains(&CmdType::UnregisterProcess)));
    receiver.stop();
    let _ = beacon_shared_memory::unlink_memfile(&config.shm.name);
}

#[test]
#[serial]
fn test_context_shutdown_announces_unregistration() {
    let config = shm_config();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut peer = ShmReceiver::start(&config, 7003, Duration::from_millis(20), move |s| {
        sink.lock().push(s.cmd_type());
    })
    .unwrap();

    let context = RegistrationContext::create(&config, "short", Components::empty()).unwrap();
    assert!(eventually(|| seen.lock().contains(&CmdType::RegisterProcess)));
    context.shutdown();

    assert!(eventually(|| seen.lock().contains(&CmdType::UnregisterProcess)));
    assert!(RegistrationContext::create(&config, "next", Components::empty()).is_ok());

    peer.stop();
    let _ = beacon_shared_memory::unlink_memfile(&config.shm.name);
}

#[test]
#[serial]
fn test_second_context_is_refused() {
    let config = udp_config();
    let first = RegistrationContext::create(&config, "first", Components::empty()).unwrap();
    assert!(matches!(
        RegistrationContext::create(&config, "second", Components::empty()),
        Err(RegistrationError::AlreadyActive)
    ));
    drop(first);

    let again = RegistrationContext::create(&config, "again", Components::empty());
    assert!(again.is_ok());
}

#[test]
#[serial]
fn test_invalid_config_is_rejected_without_holding_the_slot() {
    let mut config = udp_config();
    config.timeout_ms = config.refresh_ms;
    assert!(matches!(
        RegistrationContext::create(&config, "bad", Components::empty()),
        Err(RegistrationError::Config(_))
    ));
    assert!(RegistrationContext::create(&udp_config(), "good", Components::empty()).is_ok());
}

#[test]
#[serial]
fn test_silent_entity_times_out_and_explicit_unregister_is_applied() {
    let config = udp_config();
    let context = RegistrationContext::create(&config, "timeouts", Components::empty()).unwrap();
    let process = Arc::clone(context.process());

    // Announced once and never refreshed.
    let ghost = Sample::RegisterSubscriber {
        identifier: SampleIdentifier::new(0xDEAD, process.process_id(), process.host_name()),
        topic: Topic {
            topic_name: "ghost".to_string(),
            ..Default::default()
        },
    };
    context.register_sample(ghost.clone());
    assert!(eventually(|| context.monitoring().subscribers.len() == 1));
    assert!(eventually(|| context.monitoring().subscribers.is_empty()));

    let short_lived = Sample::RegisterSubscriber {
        identifier: SampleIdentifier::new(0xBEEF, process.process_id(), process.host_name()),
        topic: Topic::default(),
    };
    context.register_sample(short_lived.clone());
    assert!(eventually(|| context.monitoring().subscribers.len() == 1));
    let unregister = short_lived.to_unregistration();
    assert_eq!(unregister.cmd_type(), CmdType::UnregisterSubscriber);
    context.unregister_sample(unregister);
    assert!(eventually(|| context.monitoring().subscribers.is_empty()));
}
