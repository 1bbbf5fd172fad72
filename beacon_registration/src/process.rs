//! Description of the local process and its registration samples

use crate::applier::LocalScope;
use crate::sample::{
    Process, ProcessState, Sample, SampleIdentifier, Severity, SeverityLevel, TimeSyncState,
};
use beacon::config::RegistrationConfig;
use beacon_shared_memory::{get_current_pid, host_name};
use bitflags::bitflags;
use parking_lot::Mutex;

bitflags! {
    /// Components a process initialized
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Components: u32 {
        /// Publishing
        const PUBLISHER = 0x01;
        /// Subscribing
        const SUBSCRIBER = 0x02;
        /// Services and clients
        const SERVICE = 0x04;
        /// Monitoring
        const MONITORING = 0x08;
        /// Logging
        const LOGGING = 0x10;
        /// Time synchronization
        const TIMESYNC = 0x20;
    }
}

impl Components {
    /// Short names joined by `|`, e.g. `"pub|sub|mon"`
    pub fn describe(&self) -> String {
        const NAMES: [(Components, &str); 6] = [
            (Components::PUBLISHER, "pub"),
            (Components::SUBSCRIBER, "sub"),
            (Components::SERVICE, "srv"),
            (Components::MONITORING, "mon"),
            (Components::LOGGING, "log"),
            (Components::TIMESYNC, "time"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Debug, Clone, Default)]
struct Health {
    state: ProcessState,
    time_sync_state: TimeSyncState,
    time_sync_module_name: String,
}

/// The process this library runs in
#[derive(Debug)]
pub struct LocalProcess {
    identifier: SampleIdentifier,
    shm_transport_domain: String,
    process_name: String,
    unit_name: String,
    process_parameter: String,
    components: Components,
    health: Mutex<Health>,
}

impl LocalProcess {
    /// Describe the current process
    pub fn new(unit_name: &str, config: &RegistrationConfig, components: Components) -> Self {
        let host = host_name();
        let process_name = std::env::current_exe()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        let process_parameter = std::env::args().collect::<Vec<_>>().join(" ");

        Self::with_identity(
            unit_name,
            &host,
            get_current_pid(),
            &config.effective_shm_domain(&host),
            components,
        )
        .with_process_info(process_name, process_parameter)
    }

    /// Describe a process with an explicit identity
    pub fn with_identity(
        unit_name: &str,
        host_name: &str,
        process_id: i32,
        shm_transport_domain: &str,
        components: Components,
    ) -> Self {
        Self {
            identifier: SampleIdentifier::generate(process_id, host_name),
            shm_transport_domain: shm_transport_domain.to_string(),
            process_name: unit_name.to_string(),
            unit_name: unit_name.to_string(),
            process_parameter: String::new(),
            components,
            health: Mutex::new(Health::default()),
        }
    }

    fn with_process_info(mut self, process_name: String, process_parameter: String) -> Self {
        if !process_name.is_empty() {
            self.process_name = process_name;
        }
        self.process_parameter = process_parameter;
        self
    }

    /// Identifier of the process entity
    pub fn identifier(&self) -> &SampleIdentifier {
        &self.identifier
    }

    /// Host name
    pub fn host_name(&self) -> &str {
        &self.identifier.host_name
    }

    /// Process id
    pub fn process_id(&self) -> i32 {
        self.identifier.process_id
    }

    /// Shm transport domain
    pub fn shm_transport_domain(&self) -> &str {
        &self.shm_transport_domain
    }

    /// Unit name
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Filter scope of this process
    pub fn scope(&self) -> LocalScope {
        LocalScope {
            process_id: self.process_id(),
            host_name: self.host_name().to_string(),
            shm_transport_domain: self.shm_transport_domain.clone(),
        }
    }

    /// Report process health
    pub fn set_state(&self, severity: Severity, severity_level: SeverityLevel, info: &str) {
        let mut health = self.health.lock();
        health.state = ProcessState {
            severity,
            severity_level,
            info: info.to_string(),
        };
    }

    /// Report time synchronization mode
    pub fn set_time_sync(&self, state: TimeSyncState, module_name: &str) {
        let mut health = self.health.lock();
        health.time_sync_state = state;
        health.time_sync_module_name = module_name.to_string();
    }

    fn payload(&self) -> Process {
        let health = self.health.lock().clone();
        Process {
            host_name: self.host_name().to_string(),
            shm_transport_domain: self.shm_transport_domain.clone(),
            process_id: self.process_id(),
            process_name: self.process_name.clone(),
            unit_name: self.unit_name.clone(),
            process_parameter: self.process_parameter.clone(),
            state: health.state,
            time_sync_state: health.time_sync_state,
            time_sync_module_name: health.time_sync_module_name,
            component_init_state: self.components.bits(),
            component_init_info: self.components.describe(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Fresh registration sample with the current health
    pub fn registration_sample(&self) -> Sample {
        Sample::RegisterProcess {
            identifier: self.identifier.clone(),
            process: self.payload(),
        }
    }

    /// Unregistration sample for this process
    pub fn unregistration_sample(&self) -> Sample {
        self.registration_sample().to_unregistration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::CmdType;

    #[test]
    fn test_components_description() {
        let all = Components::all();
        assert_eq!(all.describe(), "pub|sub|srv|mon|log|time");
        assert_eq!(
            (Components::SUBSCRIBER | Components::LOGGING).describe(),
            "sub|log"
        );
        assert_eq!(Components::empty().describe(), "");
    }

    #[test]
    fn test_registration_sample_carries_health() {
        let process = LocalProcess::with_identity(
            "unit",
            "h1",
            100,
            "d1",
            Components::PUBLISHER | Components::MONITORING,
        );
        process.set_state(Severity::Warning, SeverityLevel::Level2, "disk almost full");
        process.set_time_sync(TimeSyncState::Realtime, "ptp");

        match process.registration_sample() {
            Sample::RegisterProcess {
                identifier,
                process: payload,
            } => {
                assert_eq!(identifier, *process.identifier());
                assert_eq!(payload.host_name, "h1");
                assert_eq!(payload.shm_transport_domain, "d1");
                assert_eq!(payload.state.severity, Severity::Warning);
                assert_eq!(payload.state.info, "disk almost full");
                assert_eq!(payload.time_sync_state, TimeSyncState::Realtime);
                assert_eq!(payload.component_init_state, 0x09);
                assert_eq!(payload.component_init_info, "pub|mon");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unregistration_sample() {
        let process = LocalProcess::with_identity("unit", "h1", 100, "d1", Components::empty());
        let sample = process.unregistration_sample();
        assert_eq!(sample.cmd_type(), CmdType::UnregisterProcess);
        assert_eq!(sample.identifier(), process.identifier());
    }

    #[test]
    fn test_current_process_uses_host_domain_by_default() {
        let config = RegistrationConfig::default();
        let process = LocalProcess::new("unit", &config, Components::empty());
        assert_eq!(process.process_id(), get_current_pid());
        assert_eq!(process.shm_transport_domain(), process.host_name());
    }
}
