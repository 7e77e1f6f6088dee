//! State shared between interrupt handlers and the main loop

use core::{
    cell::{Cell, RefCell},
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{
    buffer::RxLoan,
    fault::Fault,
    interrupt::{self, Mutex},
    PortId, Ticks,
};

/// A packet waiting in a port's inbox, with the tick it arrived on
pub(crate) struct Inbound {
    pub loan: RxLoan,
    pub received_at: Ticks,
}

/// Inbound side of a port
///
/// The receive interrupt fills `pending`. The main loop empties it, and
/// marks the port `claimed` until the paired transfer is idle again.
struct Inbox {
    pending: Option<Inbound>,
    claimed: bool,
}

impl Inbox {
    const fn new() -> Self {
        Inbox {
            pending: None,
            claimed: false,
        }
    }
}

/// Transfer deadline, counted down by the ticker
#[derive(Clone, Copy)]
struct Countdown {
    remaining: Ticks,
    armed: bool,
    expired: bool,
}

impl Countdown {
    const IDLE: Self = Countdown {
        remaining: 0,
        armed: false,
        expired: false,
    };

    const fn armed(ticks: Ticks) -> Self {
        Countdown {
            remaining: ticks,
            armed: ticks != 0,
            expired: ticks == 0,
        }
    }

    fn tick(self) -> Self {
        if !self.armed {
            return self;
        }
        let remaining = self.remaining.saturating_sub(1);
        Countdown {
            remaining,
            armed: remaining != 0,
            expired: remaining == 0,
        }
    }
}

/// Per-port shared state
struct PortState {
    inbox: Mutex<RefCell<Inbox>>,
    /// Deadline of the transfer that's outgoing on this port.
    countdown: Mutex<Cell<Countdown>>,
}

impl PortState {
    const fn new() -> Self {
        PortState {
            inbox: Mutex::new(RefCell::new(Inbox::new())),
            countdown: Mutex::new(Cell::new(Countdown::IDLE)),
        }
    }
}

/// Relay state touched by interrupt handlers
///
/// Each relay needs a `RelayState`. Allocate a `static` object, and lend it
/// to [`Relay::new()`](crate::Relay::new). Interrupt handlers use the same
/// `static` to drive the ticker and to deliver received packets.
///
/// ```
/// use usb_midi_relay::RelayState;
///
/// static RELAY_STATE: RelayState = RelayState::new();
///
/// // From the 125us timer interrupt:
/// RELAY_STATE.on_tick();
/// assert_eq!(RELAY_STATE.ticks(), 1);
/// ```
///
/// Make sure that states are not shared across relays; otherwise, the relay
/// constructor panics.
pub struct RelayState {
    ticks: AtomicU32,
    ports: [PortState; 2],
    fault: Mutex<Cell<Option<Fault>>>,
    lent: Mutex<Cell<bool>>,
}

impl RelayState {
    /// Allocate relay state.
    pub const fn new() -> Self {
        RelayState {
            ticks: AtomicU32::new(0),
            ports: [PortState::new(), PortState::new()],
            fault: Mutex::new(Cell::new(None)),
            lent: Mutex::new(Cell::new(false)),
        }
    }

    /// Advance the ticker by one period.
    ///
    /// Call this from a periodic timer interrupt, every
    /// [`TICK_PERIOD_US`](crate::TICK_PERIOD_US). This only counts down
    /// timers; the main loop reacts to expired timers.
    pub fn on_tick(&self) {
        // Only writer.
        let now = self.ticks.load(Ordering::Relaxed).wrapping_add(1);
        self.ticks.store(now, Ordering::Relaxed);

        interrupt::free(|cs| {
            for port in &self.ports {
                let countdown = port.countdown.borrow(cs);
                countdown.set(countdown.get().tick());
            }
        });
    }

    /// Returns the free-running tick count.
    ///
    /// Wraps around after `u32::MAX` ticks.
    pub fn ticks(&self) -> Ticks {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Deliver a received packet
    ///
    /// Call this from your transport's receive-complete interrupt. The
    /// packet is forwarded from the main loop.
    ///
    /// Returns an error if `port` already has a packet in flight, or
    /// waiting. That means the transport didn't keep its receiver suspended.
    /// The fault is also remembered, and handled on the next
    /// [`Relay::process()`](crate::Relay::process). Zero-length packets never
    /// fault.
    pub fn on_receive(&self, port: PortId, loan: RxLoan) -> Result<(), Fault> {
        let received_at = self.ticks();
        interrupt::free(|cs| {
            let mut inbox = self.ports[port.index()].inbox.borrow(cs).borrow_mut();
            if inbox.claimed || inbox.pending.is_some() {
                if loan.is_empty() {
                    return Ok(());
                }
                let fault = Fault::UnexpectedPacket { port };
                self.fault.borrow(cs).set(Some(fault));
                return Err(fault);
            }
            inbox.pending = Some(Inbound { loan, received_at });
            Ok(())
        })
    }

    /// Lend the state to a relay.
    ///
    /// Returns `false` if it's already lent.
    pub(crate) fn lend(&self) -> bool {
        interrupt::free(|cs| !self.lent.borrow(cs).replace(true))
    }

    /// Take the port's pending packet, claiming the port.
    ///
    /// The port stays claimed until [`release()`](Self::release).
    pub(crate) fn claim(&self, port: PortId) -> Option<Inbound> {
        interrupt::free(|cs| {
            let mut inbox = self.ports[port.index()].inbox.borrow(cs).borrow_mut();
            let inbound = inbox.pending.take()?;
            inbox.claimed = true;
            Some(inbound)
        })
    }

    /// Indicates if a packet is waiting for `port`.
    pub(crate) fn has_pending(&self, port: PortId) -> bool {
        interrupt::free(|cs| {
            self.ports[port.index()]
                .inbox
                .borrow(cs)
                .borrow()
                .pending
                .is_some()
        })
    }

    /// Indicates if `port` has neither a waiting nor a claimed packet.
    pub(crate) fn is_vacant(&self, port: PortId) -> bool {
        interrupt::free(|cs| {
            let inbox = self.ports[port.index()].inbox.borrow(cs).borrow();
            inbox.pending.is_none() && !inbox.claimed
        })
    }

    /// Un-claim the port, so that it may deliver again.
    pub(crate) fn release(&self, port: PortId) {
        interrupt::free(|cs| {
            self.ports[port.index()].inbox.borrow(cs).borrow_mut().claimed = false;
        });
    }

    /// Arm the deadline for the transfer outgoing on `port`.
    pub(crate) fn arm(&self, port: PortId, ticks: Ticks) {
        interrupt::free(|cs| {
            self.ports[port.index()]
                .countdown
                .borrow(cs)
                .set(Countdown::armed(ticks));
        });
    }

    /// Disarm the deadline for the transfer outgoing on `port`.
    pub(crate) fn disarm(&self, port: PortId) {
        interrupt::free(|cs| {
            self.ports[port.index()]
                .countdown
                .borrow(cs)
                .set(Countdown::IDLE);
        });
    }

    /// Returns `true` once, after the deadline for `port` expires.
    pub(crate) fn take_expired(&self, port: PortId) -> bool {
        interrupt::free(|cs| {
            let countdown = self.ports[port.index()].countdown.borrow(cs);
            let current = countdown.get();
            if current.expired {
                countdown.set(Countdown { expired: false, ..current });
            }
            current.expired
        })
    }

    /// Remember a fault found in the main loop.
    pub(crate) fn latch_fault(&self, fault: Fault) {
        interrupt::free(|cs| self.fault.borrow(cs).set(Some(fault)));
    }

    /// Take the remembered fault, if any.
    pub(crate) fn take_fault(&self) -> Option<Fault> {
        interrupt::free(|cs| self.fault.borrow(cs).take())
    }

    /// Forget everything about `port`.
    ///
    /// Discards any waiting packet without reading it.
    pub(crate) fn clear(&self, port: PortId) {
        interrupt::free(|cs| {
            let state = &self.ports[port.index()];
            *state.inbox.borrow(cs).borrow_mut() = Inbox::new();
            state.countdown.borrow(cs).set(Countdown::IDLE);
        });
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RelayState;
    use crate::{mock::MockPort, Fault, PortId};

    #[test]
    fn lend_once() {
        let state = RelayState::new();
        assert!(state.lend());
        for _ in 0..10 {
            assert!(!state.lend());
        }
    }

    #[test]
    fn ticker_wraps() {
        let state = RelayState::new();
        state.ticks.store(u32::MAX, core::sync::atomic::Ordering::Relaxed);
        state.on_tick();
        assert_eq!(state.ticks(), 0);
    }

    #[test]
    fn countdown_expires_once() {
        let state = RelayState::new();
        state.arm(PortId::B, 3);
        state.on_tick();
        state.on_tick();
        assert!(!state.take_expired(PortId::B));
        state.on_tick();
        assert!(!state.take_expired(PortId::A));
        assert!(state.take_expired(PortId::B));
        assert!(!state.take_expired(PortId::B));

        // Doesn't re-expire while disarmed.
        for _ in 0..10 {
            state.on_tick();
        }
        assert!(!state.take_expired(PortId::B));
    }

    #[test]
    fn zero_deadline_expires_immediately() {
        let state = RelayState::new();
        state.arm(PortId::A, 0);
        assert!(state.take_expired(PortId::A));
    }

    #[test]
    fn disarm_cancels_expiry() {
        let state = RelayState::new();
        state.arm(PortId::A, 1);
        state.on_tick();
        state.disarm(PortId::A);
        assert!(!state.take_expired(PortId::A));
    }

    #[test]
    fn inbox_records_arrival_tick() {
        let mut port = MockPort::online();
        let state = RelayState::new();
        state.on_tick();
        state.on_tick();
        state.on_receive(PortId::A, port.deliver(&[1, 2, 3])).unwrap();
        assert!(state.has_pending(PortId::A));
        assert!(!state.has_pending(PortId::B));

        let inbound = state.claim(PortId::A).unwrap();
        assert_eq!(inbound.received_at, 2);
        assert_eq!(inbound.loan.as_slice(), &[1, 2, 3]);
        assert!(!state.has_pending(PortId::A));
    }

    #[test]
    fn receive_while_claimed_faults() {
        let mut port = MockPort::online();
        let state = RelayState::new();
        state.on_receive(PortId::A, port.deliver(&[1])).unwrap();
        let _inbound = state.claim(PortId::A).unwrap();

        let fault = state.on_receive(PortId::A, port.deliver(&[2])).unwrap_err();
        assert_eq!(fault, Fault::UnexpectedPacket { port: PortId::A });
        assert_eq!(state.take_fault(), Some(fault));
        assert_eq!(state.take_fault(), None);

        // Other port is unaffected.
        state.on_receive(PortId::B, port.deliver(&[3])).unwrap();
    }

    #[test]
    fn receive_while_pending_faults() {
        let mut port = MockPort::online();
        let state = RelayState::new();
        state.on_receive(PortId::B, port.deliver(&[1])).unwrap();
        assert!(state.on_receive(PortId::B, port.deliver(&[2])).is_err());

        // The first packet is kept.
        assert_eq!(state.claim(PortId::B).unwrap().loan.as_slice(), &[1]);
    }

    #[test]
    fn empty_packet_while_claimed_is_ignored() {
        let mut port = MockPort::online();
        let state = RelayState::new();
        state.on_receive(PortId::A, port.deliver(&[1])).unwrap();
        let _inbound = state.claim(PortId::A).unwrap();
        state.on_receive(PortId::A, port.deliver(&[])).unwrap();
        assert_eq!(state.take_fault(), None);
    }

    #[test]
    fn release_and_clear() {
        let mut port = MockPort::online();
        let state = RelayState::new();
        state.on_receive(PortId::A, port.deliver(&[1])).unwrap();
        let _inbound = state.claim(PortId::A).unwrap();
        assert!(!state.is_vacant(PortId::A));
        state.release(PortId::A);
        state.on_receive(PortId::A, port.deliver(&[2])).unwrap();

        assert!(!state.is_vacant(PortId::A));
        state.arm(PortId::A, 1);
        state.clear(PortId::A);
        assert!(state.is_vacant(PortId::A));
        state.on_tick();
        assert!(!state.has_pending(PortId::A));
        assert!(!state.take_expired(PortId::A));
    }
}
