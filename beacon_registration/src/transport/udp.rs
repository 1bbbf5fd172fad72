//! UDP registration transport
//!
//! With network registration enabled samples go to the multicast group;
//! otherwise they go to the local broadcast address and never leave the host.

use crate::codec::encode_sample;
use crate::error::RegistrationResult;
use crate::sample_list::SampleList;
use crate::transport::RegistrationSender;
use beacon::config::RegistrationConfig;
use beacon::consts::MAX_UDP_DATAGRAM_SIZE;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const RECEIVE_CYCLE: Duration = Duration::from_millis(100);

/// Sends each sample as its own datagram
pub struct UdpSender {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpSender {
    /// Open the sending socket described by `config`
    pub fn new(config: &RegistrationConfig) -> RegistrationResult<Self> {
        let destination = SocketAddr::V4(SocketAddrV4::new(
            config.udp_destination()?,
            config.udp.port,
        ));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_send_buffer_size(config.udp.send_buffer)?;
        if config.network_enabled {
            socket.set_multicast_ttl_v4(config.udp.ttl)?;
            socket.set_multicast_loop_v4(true)?;
        } else {
            socket.set_broadcast(true)?;
        }
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind_addr.into())?;

        info!(%destination, "udp registration sender ready");
        Ok(Self {
            socket: socket.into(),
            destination,
        })
    }

    /// Address datagrams are sent to
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl RegistrationSender for UdpSender {
    fn send_sample_list(&mut self, samples: &SampleList) -> RegistrationResult<()> {
        for sample in samples {
            let datagram = encode_sample(sample)?;
            if datagram.len() > MAX_UDP_DATAGRAM_SIZE {
                warn!(
                    entity_id = sample.identifier().entity_id,
                    size = datagram.len(),
                    "registration sample exceeds datagram limit, dropped"
                );
                continue;
            }
            self.socket.send_to(&datagram, self.destination)?;
        }
        trace!(count = samples.len(), "udp registration samples sent");
        Ok(())
    }
}

/// Background socket loop handing every received datagram to a handler
pub struct UdpReceiver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    /// Bind the registration port and start the receive thread
    pub fn start<F>(config: &RegistrationConfig, mut handler: F) -> RegistrationResult<Self>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let socket = receive_socket(config)?;
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("beacon-udp-rx".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; MAX_UDP_DATAGRAM_SIZE];
                while thread_running.load(Ordering::Relaxed) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, _)) => handler(&buf[..len]),
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::WouldBlock
                                    | io::ErrorKind::TimedOut
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            debug!(error = %e, "udp registration receive failed");
                            thread::sleep(RECEIVE_CYCLE);
                        }
                    }
                }
            })?;

        info!(port = config.udp.port, "udp registration receiver started");
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the receive thread and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("udp registration receiver panicked");
            }
            debug!("udp registration receiver stopped");
        }
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_socket(config: &RegistrationConfig) -> RegistrationResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(config.udp.receive_buffer)?;
    let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.udp.port));
    socket.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket.into();
    if config.network_enabled {
        let group = config.udp_destination()?;
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        debug!(%group, "joined registration multicast group");
    }
    socket.set_read_timeout(Some(RECEIVE_CYCLE))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_sample;
    use crate::sample::{Sample, SampleIdentifier, Topic};
    use parking_lot::Mutex;
    use std::time::Instant;

    fn loopback_config(port: u16) -> RegistrationConfig {
        let mut config = RegistrationConfig::default();
        config.udp.local_address = "127.0.0.1".to_string();
        config.udp.port = port;
        config
    }

    fn free_port() -> u16 {
        UdpSocket::bind("127.0.0.1:0")
            .and_then(|s| s.local_addr())
            .map(|a| a.port())
            .unwrap()
    }

    #[test]
    fn test_samples_arrive_one_per_datagram() {
        let config = loopback_config(free_port());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let mut receiver = UdpReceiver::start(&config, move |bytes| {
            sink.lock().push(decode_sample(bytes).unwrap());
        })
        .unwrap();

        let mut sender = UdpSender::new(&config).unwrap();
        let mut samples = SampleList::new();
        for entity_id in 1..=3 {
            samples.push(Sample::RegisterPublisher {
                identifier: SampleIdentifier::new(entity_id, 9, "h"),
                topic: Topic::default(),
            });
        }
        sender.send_sample_list(&samples).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while received.lock().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        receiver.stop();

        let ids: Vec<u64> = received
            .lock()
            .iter()
            .map(|s| s.identifier().entity_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_oversized_sample_is_dropped() {
        let config = loopback_config(free_port());
        let mut sender = UdpSender::new(&config).unwrap();
        let mut samples = SampleList::new();
        samples.push(Sample::RegisterPublisher {
            identifier: SampleIdentifier::new(1, 9, "h"),
            topic: Topic {
                topic_name: "x".repeat(MAX_UDP_DATAGRAM_SIZE),
                ..Default::default()
            },
        });
        assert!(sender.send_sample_list(&samples).is_ok());
    }

    #[test]
    fn test_destination_follows_network_flag() {
        let mut config = RegistrationConfig::default();
        let sender = UdpSender::new(&config).unwrap();
        assert_eq!(
            sender.destination(),
            "127.255.255.255:14000".parse::<SocketAddr>().unwrap()
        );

        config.network_enabled = true;
        assert_eq!(config.udp_destination().unwrap(), Ipv4Addr::new(239, 0, 0, 1));
    }
}
