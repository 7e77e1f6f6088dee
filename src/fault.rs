//! Transport contract violations

use crate::PortId;

/// The transport broke its contract.
///
/// These can't be recovered locally. The relay's [`FaultPolicy`](crate::FaultPolicy)
/// decides whether to halt or to reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum Fault {
    /// `port` delivered a packet larger than its
    /// [`max_packet_len()`](crate::Transport::max_packet_len).
    OversizePacket {
        /// The receiving port.
        port: PortId,
        /// The packet length.
        len: usize,
    },
    /// `port` delivered a packet while its receiver should have been
    /// suspended.
    UnexpectedPacket {
        /// The receiving port.
        port: PortId,
    },
}

impl Fault {
    /// Returns the port that misbehaved.
    pub fn port(&self) -> PortId {
        match *self {
            Fault::OversizePacket { port, .. } | Fault::UnexpectedPacket { port } => port,
        }
    }
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Fault::OversizePacket { port, len } => {
                write!(f, "port {:?} received an oversized packet ({} bytes)", port, len)
            }
            Fault::UnexpectedPacket { port } => {
                write!(f, "port {:?} received a packet while suspended", port)
            }
        }
    }
}
