//! Registration transports
//!
//! | transport | sender | receiver |
//! |---|---|---|
//! | UDP | one datagram per sample | blocking socket loop |
//! | SHM | one framed sample list per cycle | broadcast reader polled at half the refresh period |

pub mod shm;
pub mod udp;

use crate::error::RegistrationResult;
use crate::sample_list::SampleList;

pub use shm::{ShmReceiver, ShmSender};
pub use udp::{UdpReceiver, UdpSender};

/// Outgoing side of a registration transport
pub trait RegistrationSender: Send {
    /// Ship every sample of `samples` to the peers
    fn send_sample_list(&mut self, samples: &SampleList) -> RegistrationResult<()>;
}
