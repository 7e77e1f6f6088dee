//! Packet relay engine for a dual-port USB-MIDI bridge
//!
//! `usb-midi-relay` forwards every packet received on one USB port to the
//! other port, unchanged and in order. While a packet is in flight, the
//! sending port's receiver stays suspended; that suspension is the only
//! backpressure. Stuck transfers time out and are aborted, and hot-unplug
//! of either port resets whatever was in flight.
//!
//! The crate doesn't talk to USB hardware. You provide a [`Transport`] for
//! each port, and an [`EventSink`] that drives your status display.
//!
//! # Usage
//!
//! 1. Allocate a `static` [`RelayState`]. It's the only state shared with
//!    interrupt handlers.
//! 2. Call [`RelayState::on_tick()`] from a 125us periodic timer interrupt.
//! 3. Call [`RelayState::on_receive()`] from your transport's receive-complete
//!    interrupt, handing over the received buffer as an [`RxLoan`].
//! 4. Build a [`Relay`] from both transports, and call [`Relay::process()`]
//!    from the main loop as often as you can.
//!
//! ```no_run
//! use usb_midi_relay::{Config, Event, PortId, Relay, RelayState, Transport};
//!
//! static RELAY_STATE: RelayState = RelayState::new();
//!
//! # struct Port;
//! # impl Transport for Port {
//! #     fn is_configured(&self) -> bool { true }
//! #     fn is_powered(&self) -> bool { true }
//! #     fn try_send(&mut self, _: &[u8]) -> usb_device::Result<()> { Ok(()) }
//! #     fn bytes_still_queued(&self) -> usize { 0 }
//! #     fn suspend_receive(&mut self, _: bool) {}
//! #     fn abort_send(&mut self) {}
//! # }
//! # fn set_led(_: PortId, _: Event) {}
//! let mut relay = Relay::new(
//!     [Port, Port],
//!     &RELAY_STATE,
//!     |port: PortId, event: Event| set_led(port, event),
//!     Config::new(),
//! );
//!
//! loop {
//!     relay.process();
//! }
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

// defmt's macros expand to `::defmt` paths.
#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod buffer;
mod config;
mod event;
mod fault;
mod interrupt;
mod link;
mod relay;
mod state;
mod transfer;
mod transport;

#[cfg(test)]
mod mock;

pub use buffer::RxLoan;
pub use config::{ms_to_ticks, us_to_ticks, Config, FaultPolicy, Ticks, TICK_PERIOD_US};
pub use event::{Event, EventSink, Latency};
pub use fault::Fault;
pub use link::LinkEvents;
pub use relay::Relay;
pub use state::RelayState;
pub use transfer::State;
pub use transport::Transport;

/// One of the two bridged ports
///
/// Each port forwards exclusively to the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum PortId {
    /// The first port.
    A,
    /// The second port.
    B,
}

impl PortId {
    /// Both ports, in index order.
    pub const ALL: [PortId; 2] = [PortId::A, PortId::B];

    /// Returns the port that this port forwards to.
    pub const fn other(self) -> PortId {
        match self {
            PortId::A => PortId::B,
            PortId::B => PortId::A,
        }
    }

    /// Returns an index for per-port arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}
