//! # Beacon Registration
//!
//! Soft-state discovery for processes, topic endpoints, services and
//! clients. Every process re-announces what it owns once per refresh
//! period; peers that fall silent for longer than the timeout are withdrawn
//! with a synthetic unregistration, so lost packets heal themselves.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  sample list   ┌───────────┐  sample   ┌──────────────┐
//! │ Registration ├───────────────►│ UDP / SHM ├──────────►│ Registration │
//! │ Provider     │  every period  │ transport │           │ Receiver     │
//! └──────────────┘                └───────────┘           └──────┬───────┘
//!                                                                │
//!                               ┌────────────────┐               ▼
//!                               │ Timeout        │◄──────┌──────────────┐
//!                               │ Provider       ├──────►│ Sample       │
//!                               └────────────────┘ unreg │ Applier      │
//!                                                        └──────┬───────┘
//!                                           gates, monitoring,  │
//!                                           user callbacks  ◄───┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon::config::RegistrationConfig;
//! use beacon_registration::{Components, RegistrationContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistrationConfig::default();
//! let context = RegistrationContext::create(&config, "my_unit", Components::MONITORING)?;
//! for process in context.monitoring().processes {
//!     println!("{} on {}", process.info.unit_name, process.info.host_name);
//! }
//! context.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Only constructors return errors. Once running, send failures, lock
//! timeouts and undecodable input are logged and skipped; the next refresh
//! cycle repairs whatever they lost.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod applier;
pub mod codec;
pub mod context;
pub mod error;
pub mod gates;
pub mod monitoring;
pub mod process;
pub mod provider;
pub mod receiver;
pub mod sample;
pub mod sample_list;
pub mod timeout;
pub mod transport;
pub mod worker;

pub use applier::{LocalScope, SampleApplier, SampleCallback};
pub use codec::{CodecError, decode_sample, decode_sample_list, encode_sample, encode_sample_list};
pub use context::RegistrationContext;
pub use error::{RegistrationError, RegistrationResult};
pub use gates::{RegistrationSource, ServiceGate, TopicGate};
pub use monitoring::{Monitoring, MonitoringEntry, RegistrationMonitor};
pub use process::{Components, LocalProcess};
pub use provider::RegistrationProvider;
pub use receiver::{RawSampleCallback, RegistrationReceiver};
pub use sample::{
    Client, CmdType, DataTypeInfo, LayerParameter, Method, Process, ProcessState,
    RegistrationEvent, Sample, SampleIdentifier, Service, Severity, SeverityLevel,
    TimeSyncState, Topic, TopicDirection, TransportLayer,
};
pub use sample_list::SampleList;
pub use timeout::{Clock, ManualClock, SteadyClock, TimeoutProvider};
pub use transport::RegistrationSender;
pub use worker::CyclicWorker;
