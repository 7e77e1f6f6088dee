//! Events for the status display

use crate::{config::Config, fault::Fault, Ticks};

/// How promptly a packet is being forwarded.
///
/// Variants are ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum Latency {
    /// Younger than [`Config::late_after`].
    #[default]
    Realtime,
    /// Younger than [`Config::stale_after`].
    Late,
    /// Older than that.
    Stale,
    /// Never delivered.
    Dropped,
}

impl Latency {
    /// Classify a transfer that has been in flight for `age` ticks.
    pub(crate) fn classify(age: Ticks, config: &Config) -> Self {
        if age < config.late_after {
            Latency::Realtime
        } else if age < config.stale_after {
            Latency::Late
        } else {
            Latency::Stale
        }
    }
}

/// Something the status display should know.
///
/// Link events describe the port they're signaled for. Packet events are
/// signaled for the port that *received* the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum Event {
    /// The port detects bus power.
    PortPowered,
    /// The port lost bus power.
    PortUnpowered,
    /// The port is configured by its host.
    PortOnline,
    /// The port is no longer configured.
    PortOffline,
    /// A packet arrived while the other port was offline, and was discarded.
    PacketDroppedIncoming,
    /// Forwarding started. Carries the latency at start.
    PacketStarted(Latency),
    /// An in-flight packet moved into a worse latency class.
    LatencyChanged(Latency),
    /// The packet reached the other port. Carries the latency at delivery.
    PacketDelivered(Latency),
    /// The packet was aborted.
    PacketDropped,
    /// The transport broke its contract, and the relay is resetting.
    ///
    /// Only signaled with [`FaultPolicy::Reset`](crate::FaultPolicy::Reset).
    Fault(Fault),
}

/// Receives relay events
///
/// Events are signaled synchronously from [`Relay::process()`](crate::Relay::process).
/// Don't block.
///
/// Any `FnMut(PortId, Event)` is an `EventSink`.
pub trait EventSink {
    /// Handle `event` for `port`.
    fn event(&mut self, port: crate::PortId, event: Event);
}

impl<F> EventSink for F
where
    F: FnMut(crate::PortId, Event),
{
    fn event(&mut self, port: crate::PortId, event: Event) {
        self(port, event)
    }
}

#[cfg(test)]
mod tests {
    use super::Latency;
    use crate::Config;

    #[test]
    fn classify_by_age() {
        let config = Config::new();
        assert_eq!(Latency::classify(0, &config), Latency::Realtime);
        assert_eq!(Latency::classify(9, &config), Latency::Realtime);
        assert_eq!(Latency::classify(10, &config), Latency::Late);
        assert_eq!(Latency::classify(239, &config), Latency::Late);
        assert_eq!(Latency::classify(240, &config), Latency::Stale);
        assert_eq!(Latency::classify(u32::MAX, &config), Latency::Stale);
    }

    #[test]
    fn ordered_best_to_worst() {
        assert!(Latency::Realtime < Latency::Late);
        assert!(Latency::Late < Latency::Stale);
        assert!(Latency::Stale < Latency::Dropped);
    }
}
