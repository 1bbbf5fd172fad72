//! Registration sample model
//!
//! A [`Sample`] announces or withdraws one entity: a process, a topic
//! endpoint (publisher or subscriber), a service or a client. Every variant
//! carries the entity's [`SampleIdentifier`] and only the payload that is
//! meaningful for its command.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Identity of a registered entity
///
/// Equality, ordering and hashing use `entity_id` only; host and process
/// are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleIdentifier {
    /// Globally unique id of the entity
    pub entity_id: u64,
    /// Process that owns the entity
    pub process_id: i32,
    /// Host the owning process runs on
    pub host_name: String,
}

impl SampleIdentifier {
    /// Identifier with an explicit entity id
    pub fn new(entity_id: u64, process_id: i32, host_name: impl Into<String>) -> Self {
        Self {
            entity_id,
            process_id,
            host_name: host_name.into(),
        }
    }

    /// Identifier with a freshly drawn random entity id
    pub fn generate(process_id: i32, host_name: impl Into<String>) -> Self {
        Self::new(rand::random(), process_id, host_name)
    }
}

impl PartialEq for SampleIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
    }
}

impl Eq for SampleIdentifier {}

impl Hash for SampleIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_id.hash(state);
    }
}

impl PartialOrd for SampleIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SampleIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.entity_id.cmp(&other.entity_id)
    }
}

/// Process health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    /// Not reported
    #[default]
    Unknown,
    /// Operating normally
    Healthy,
    /// Degraded
    Warning,
    /// Severely degraded
    Critical,
    /// Not operational
    Failed,
}

/// Refinement of [`Severity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeverityLevel {
    /// Not reported
    #[default]
    Unknown,
    /// Level 1
    Level1,
    /// Level 2
    Level2,
    /// Level 3
    Level3,
    /// Level 4
    Level4,
    /// Level 5
    Level5,
}

/// Time synchronization mode of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeSyncState {
    /// No time synchronization
    #[default]
    None,
    /// Synchronized to a real-time source
    Realtime,
    /// Driven by a replay source
    Replay,
}

/// Health report of a process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessState {
    /// Severity
    pub severity: Severity,
    /// Severity level
    pub severity_level: SeverityLevel,
    /// Free text
    pub info: String,
}

/// Process payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Process {
    /// Host name
    pub host_name: String,
    /// Shm transport domain of the process
    pub shm_transport_domain: String,
    /// Operating system process id
    pub process_id: i32,
    /// Executable path or name
    pub process_name: String,
    /// Logical unit name
    pub unit_name: String,
    /// Command line
    pub process_parameter: String,
    /// Health
    pub state: ProcessState,
    /// Time synchronization mode
    pub time_sync_state: TimeSyncState,
    /// Name of the time synchronization module
    pub time_sync_module_name: String,
    /// Bitmask of initialized components
    pub component_init_state: u32,
    /// Human readable form of `component_init_state`
    pub component_init_info: String,
    /// Runtime version of the registration library
    pub runtime_version: String,
}

/// Encoding, type name and descriptor of a topic or method type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataTypeInfo {
    /// Encoding, e.g. "proto"
    pub encoding: String,
    /// Type name
    pub name: String,
    /// Opaque type descriptor
    pub descriptor: Vec<u8>,
}

/// Transport-specific connection parameters of a topic layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerParameter {
    /// UDP multicast data transport
    UdpMulticast,
    /// Shared memory data transport
    Shm {
        /// Memory files carrying the topic data
        memory_files: Vec<String>,
    },
    /// TCP data transport
    Tcp {
        /// Port the writer listens on
        port: u16,
    },
}

/// One data transport layer of a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportLayer {
    /// Layer version
    pub version: i32,
    /// Layer is in use
    pub active: bool,
    /// Connection parameters
    pub parameter: LayerParameter,
}

/// Direction of a topic endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TopicDirection {
    /// Writes data
    #[default]
    Publisher,
    /// Reads data
    Subscriber,
}

/// Topic endpoint payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topic {
    /// Shm transport domain of the owning process
    pub shm_transport_domain: String,
    /// Host name
    pub host_name: String,
    /// Owning process id
    pub process_id: i32,
    /// Owning process name
    pub process_name: String,
    /// Owning unit name
    pub unit_name: String,
    /// Topic name
    pub topic_name: String,
    /// Publisher or subscriber
    pub direction: TopicDirection,
    /// Data type
    pub datatype: DataTypeInfo,
    /// Active transport layers
    pub transport_layers: Vec<TransportLayer>,
    /// Size of the last message in bytes
    pub topic_size: i32,
    /// Connected entities on this host
    pub connections_local: i32,
    /// Connected entities on other hosts
    pub connections_external: i32,
    /// Dropped messages
    pub message_drops: i32,
    /// Id of the last sent message
    pub data_id: i64,
    /// Send or receive counter
    pub data_clock: i64,
    /// Send or receive frequency in mHz
    pub data_frequency: i32,
}

/// One method of a service or client
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Request type
    pub request_type: DataTypeInfo,
    /// Response type
    pub response_type: DataTypeInfo,
    /// Number of calls so far
    pub call_count: i64,
}

/// Service payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Service {
    /// Host name
    pub host_name: String,
    /// Owning process id
    pub process_id: i32,
    /// Owning process name
    pub process_name: String,
    /// Owning unit name
    pub unit_name: String,
    /// Service name
    pub service_name: String,
    /// Methods offered
    pub methods: Vec<Method>,
    /// TCP port the service listens on
    pub tcp_port: u16,
}

/// Client payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Client {
    /// Host name
    pub host_name: String,
    /// Owning process id
    pub process_id: i32,
    /// Owning process name
    pub process_name: String,
    /// Owning unit name
    pub unit_name: String,
    /// Name of the service the client calls
    pub service_name: String,
    /// Methods used
    pub methods: Vec<Method>,
}

/// Registration command carried by a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdType {
    /// Process announcement
    RegisterProcess,
    /// Process withdrawal
    UnregisterProcess,
    /// Publisher announcement
    RegisterPublisher,
    /// Publisher withdrawal
    UnregisterPublisher,
    /// Subscriber announcement
    RegisterSubscriber,
    /// Subscriber withdrawal
    UnregisterSubscriber,
    /// Service announcement
    RegisterService,
    /// Service withdrawal
    UnregisterService,
    /// Client announcement
    RegisterClient,
    /// Client withdrawal
    UnregisterClient,
}

impl CmdType {
    /// True for the withdrawal commands
    pub fn is_unregistration(self) -> bool {
        matches!(
            self,
            CmdType::UnregisterProcess
                | CmdType::UnregisterPublisher
                | CmdType::UnregisterSubscriber
                | CmdType::UnregisterService
                | CmdType::UnregisterClient
        )
    }

    /// Entity kind the command refers to
    pub fn event(self) -> RegistrationEvent {
        match self {
            CmdType::RegisterProcess | CmdType::UnregisterProcess => RegistrationEvent::Process,
            CmdType::RegisterPublisher | CmdType::UnregisterPublisher => {
                RegistrationEvent::Publisher
            }
            CmdType::RegisterSubscriber | CmdType::UnregisterSubscriber => {
                RegistrationEvent::Subscriber
            }
            CmdType::RegisterService | CmdType::UnregisterService => RegistrationEvent::Service,
            CmdType::RegisterClient | CmdType::UnregisterClient => RegistrationEvent::Client,
        }
    }
}

/// Entity kind user callbacks subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationEvent {
    /// Publisher (un)registrations
    Publisher,
    /// Subscriber (un)registrations
    Subscriber,
    /// Service (un)registrations
    Service,
    /// Client (un)registrations
    Client,
    /// Process (un)registrations
    Process,
}

/// One registration announcement or withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    /// Process is alive
    RegisterProcess {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Process details
        process: Process,
    },
    /// Process is gone
    UnregisterProcess {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Identifying process fields
        process: Process,
    },
    /// Publisher is alive
    RegisterPublisher {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Topic details
        topic: Topic,
    },
    /// Publisher is gone
    UnregisterPublisher {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Identifying topic fields
        topic: Topic,
    },
    /// Subscriber is alive
    RegisterSubscriber {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Topic details
        topic: Topic,
    },
    /// Subscriber is gone
    UnregisterSubscriber {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Identifying topic fields
        topic: Topic,
    },
    /// Service is alive
    RegisterService {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Service details
        service: Service,
    },
    /// Service is gone
    UnregisterService {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Identifying service fields
        service: Service,
    },
    /// Client is alive
    RegisterClient {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Client details
        client: Client,
    },
    /// Client is gone
    UnregisterClient {
        /// Entity identity
        identifier: SampleIdentifier,
        /// Identifying client fields
        client: Client,
    },
}

impl Sample {
    /// Identity of the entity the sample is about
    pub fn identifier(&self) -> &SampleIdentifier {
        match self {
            Sample::RegisterProcess { identifier, .. }
            | Sample::UnregisterProcess { identifier, .. }
            | Sample::RegisterPublisher { identifier, .. }
            | Sample::UnregisterPublisher { identifier, .. }
            | Sample::RegisterSubscriber { identifier, .. }
            | Sample::UnregisterSubscriber { identifier, .. }
            | Sample::RegisterService { identifier, .. }
            | Sample::UnregisterService { identifier, .. }
            | Sample::RegisterClient { identifier, .. }
            | Sample::UnregisterClient { identifier, .. } => identifier,
        }
    }

    /// Command of the sample
    pub fn cmd_type(&self) -> CmdType {
        match self {
            Sample::RegisterProcess { .. } => CmdType::RegisterProcess,
            Sample::UnregisterProcess { .. } => CmdType::UnregisterProcess,
            Sample::RegisterPublisher { .. } => CmdType::RegisterPublisher,
            Sample::UnregisterPublisher { .. } => CmdType::UnregisterPublisher,
            Sample::RegisterSubscriber { .. } => CmdType::RegisterSubscriber,
            Sample::UnregisterSubscriber { .. } => CmdType::UnregisterSubscriber,
            Sample::RegisterService { .. } => CmdType::RegisterService,
            Sample::UnregisterService { .. } => CmdType::UnregisterService,
            Sample::RegisterClient { .. } => CmdType::RegisterClient,
            Sample::UnregisterClient { .. } => CmdType::UnregisterClient,
        }
    }

    /// True for withdrawals
    pub fn is_unregistration(&self) -> bool {
        self.cmd_type().is_unregistration()
    }

    /// Shm transport domain carried by the sample
    ///
    /// Only topic samples carry one. Process, service and client samples
    /// return `None`.
    pub fn shm_transport_domain(&self) -> Option<&str> {
        match self {
            Sample::RegisterPublisher { topic, .. }
            | Sample::UnregisterPublisher { topic, .. }
            | Sample::RegisterSubscriber { topic, .. }
            | Sample::UnregisterSubscriber { topic, .. } => Some(&topic.shm_transport_domain),
            _ => None,
        }
    }

    /// Withdrawal matching this sample
    ///
    /// Keeps the identifier and the fields needed to recognize the entity,
    /// drops statistics and type information. A withdrawal maps to itself.
    pub fn to_unregistration(&self) -> Sample {
        match self {
            Sample::RegisterProcess {
                identifier,
                process,
            } => Sample::UnregisterProcess {
                identifier: identifier.clone(),
                process: Process {
                    host_name: process.host_name.clone(),
                    shm_transport_domain: process.shm_transport_domain.clone(),
                    process_id: process.process_id,
                    process_name: process.process_name.clone(),
                    unit_name: process.unit_name.clone(),
                    ..Default::default()
                },
            },
            Sample::RegisterPublisher { identifier, topic } => Sample::UnregisterPublisher {
                identifier: identifier.clone(),
                topic: identifying_topic(topic),
            },
            Sample::RegisterSubscriber { identifier, topic } => Sample::UnregisterSubscriber {
                identifier: identifier.clone(),
                topic: identifying_topic(topic),
            },
            Sample::RegisterService {
                identifier,
                service,
            } => Sample::UnregisterService {
                identifier: identifier.clone(),
                service: Service {
                    host_name: service.host_name.clone(),
                    process_id: service.process_id,
                    process_name: service.process_name.clone(),
                    unit_name: service.unit_name.clone(),
                    service_name: service.service_name.clone(),
                    ..Default::default()
                },
            },
            Sample::RegisterClient { identifier, client } => Sample::UnregisterClient {
                identifier: identifier.clone(),
                client: Client {
                    host_name: client.host_name.clone(),
                    process_id: client.process_id,
                    process_name: client.process_name.clone(),
                    unit_name: client.unit_name.clone(),
                    service_name: client.service_name.clone(),
                    ..Default::default()
                },
            },
            unregistration => unregistration.clone(),
        }
    }
}

fn identifying_topic(topic: &Topic) -> Topic {
    Topic {
        shm_transport_domain: topic.shm_transport_domain.clone(),
        host_name: topic.host_name.clone(),
        process_id: topic.process_id,
        process_name: topic.process_name.clone(),
        unit_name: topic.unit_name.clone(),
        topic_name: topic.topic_name.clone(),
        direction: topic.direction,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn publisher(entity_id: u64) -> Sample {
        Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(entity_id, 100, "h1"),
            topic: Topic {
                shm_transport_domain: "h1".to_string(),
                host_name: "h1".to_string(),
                process_id: 100,
                process_name: "talker".to_string(),
                topic_name: "foo".to_string(),
                datatype: DataTypeInfo {
                    encoding: "proto".to_string(),
                    name: "Foo".to_string(),
                    descriptor: vec![1, 2, 3],
                },
                data_clock: 42,
                data_frequency: 10_000,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_identifier_identity_is_entity_id() {
        let a = SampleIdentifier::new(7, 100, "h1");
        let b = SampleIdentifier::new(7, 200, "h2");
        let c = SampleIdentifier::new(8, 100, "h1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_generated_identifiers_differ() {
        let a = SampleIdentifier::generate(1, "h");
        let b = SampleIdentifier::generate(1, "h");
        assert_ne!(a.entity_id, b.entity_id);
    }

    #[test]
    fn test_unregistration_keeps_identifying_fields() {
        let sample = publisher(7);
        let unreg = sample.to_unregistration();

        assert_eq!(unreg.cmd_type(), CmdType::UnregisterPublisher);
        assert_eq!(unreg.identifier(), sample.identifier());
        match unreg {
            Sample::UnregisterPublisher { topic, .. } => {
                assert_eq!(topic.topic_name, "foo");
                assert_eq!(topic.process_name, "talker");
                assert_eq!(topic.shm_transport_domain, "h1");
                assert_eq!(topic.datatype, DataTypeInfo::default());
                assert_eq!(topic.data_clock, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unregistration_of_unregistration_is_identity() {
        let unreg = publisher(7).to_unregistration();
        assert_eq!(unreg.to_unregistration(), unreg);
    }

    #[test]
    fn test_domain_only_for_topics() {
        assert_eq!(publisher(1).shm_transport_domain(), Some("h1"));
        let service = Sample::RegisterService {
            identifier: SampleIdentifier::new(2, 1, "h1"),
            service: Service::default(),
        };
        assert_eq!(service.shm_transport_domain(), None);
    }

    #[test]
    fn test_cmd_type_event_mapping() {
        assert_eq!(CmdType::UnregisterClient.event(), RegistrationEvent::Client);
        assert_eq!(CmdType::RegisterProcess.event(), RegistrationEvent::Process);
        assert!(CmdType::UnregisterService.is_unregistration());
        assert!(!CmdType::RegisterSubscriber.is_unregistration());
    }
}
