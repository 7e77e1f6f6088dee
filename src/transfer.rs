//! Packet transfer state machine
//!
//! One `PacketTransfer` per port describes the packet that's *outgoing* on
//! that port. The packet was received on the other port, and it still lives
//! in that port's memory, loaned through an [`RxLoan`].
//!
//! Each [`step()`](PacketTransfer::step) advances the machine by one state.
//! A step either continues without touching the transport, or makes at most
//! one transport call and yields. The relay steps a transfer until it yields,
//! so that a single `process()` never blocks on the transport.

use crate::{buffer::RxLoan, config::Config, event::Latency, transport::Transport, Ticks};

/// Transfer state
///
/// Variants are ordered by progress through a transfer. The deadline
/// applies from `AwaitingSendAccepted` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum State {
    /// Nothing to forward; the inbound receiver is enabled.
    Idle,
    /// A packet was captured, and the inbound receiver suspended.
    Received,
    /// Computing the next chunk.
    Transmitting,
    /// Waiting for the transport to take the chunk.
    AwaitingSendAccepted,
    /// Waiting for the transport to finish sending the chunk.
    AwaitingSendComplete,
    /// Cancelling the transfer.
    Aborting,
}

/// The result of one step
#[derive(Debug)]
pub(crate) enum Step {
    /// Advanced without calling the transport. Step again.
    Continue,
    /// Nothing more to do until the next `process()`.
    Yield,
    /// Every byte reached the transport. The loan goes back to the inbound
    /// port.
    Delivered(RxLoan),
    /// The transfer was aborted. The loan goes back to the inbound port.
    Dropped(RxLoan),
}

/// A packet being forwarded
struct InFlight {
    state: State,
    loan: RxLoan,
    /// Bytes already handed to the transport.
    cursor: usize,
    /// Size of the chunk at `cursor`.
    chunk: usize,
    received_at: Ticks,
}

pub(crate) struct PacketTransfer {
    flight: Option<InFlight>,
    /// Set by an abort; shortens the next deadline.
    recently_dropped: bool,
    latency: Latency,
}

impl PacketTransfer {
    pub const fn new() -> Self {
        PacketTransfer {
            flight: None,
            recently_dropped: false,
            latency: Latency::Realtime,
        }
    }

    pub fn state(&self) -> State {
        self.flight
            .as_ref()
            .map_or(State::Idle, |flight| flight.state)
    }

    pub fn is_idle(&self) -> bool {
        self.flight.is_none()
    }

    /// The last latency verdict.
    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn recently_dropped(&self) -> bool {
        self.recently_dropped
    }

    /// Returns the loaned packet, if in flight.
    pub fn packet(&self) -> Option<&[u8]> {
        self.flight.as_ref().map(|flight| flight.loan.as_slice())
    }

    /// Capture a received packet
    ///
    /// Returns the deadline that the caller should arm. Using the short
    /// deadline clears `recently_dropped`, so a transfer that goes on to
    /// complete restores the long deadline for the one after it.
    ///
    /// The transfer must be idle.
    pub fn accept(
        &mut self,
        loan: RxLoan,
        received_at: Ticks,
        now: Ticks,
        config: &Config,
    ) -> Ticks {
        debug_assert!(self.is_idle(), "accepted a packet while in flight");
        let deadline = config.timeout(self.recently_dropped);
        self.recently_dropped = false;
        self.latency = Latency::classify(now.wrapping_sub(received_at), config);
        self.flight = Some(InFlight {
            state: State::Received,
            loan,
            cursor: 0,
            chunk: 0,
            received_at,
        });
        deadline
    }

    /// Re-classify the in-flight packet.
    ///
    /// Returns the new class if it's worse than the last one.
    pub fn update_latency(&mut self, now: Ticks, config: &Config) -> Option<Latency> {
        let flight = self.flight.as_ref()?;
        let latency = Latency::classify(now.wrapping_sub(flight.received_at), config);
        (latency > self.latency).then(|| {
            self.latency = latency;
            latency
        })
    }

    /// Advance by one state.
    ///
    /// `expired` indicates that the deadline passed. It's only acted upon
    /// once the transfer is waiting on the transport.
    pub fn step<T: Transport>(&mut self, out: &mut T, expired: bool) -> Step {
        let Some(flight) = self.flight.as_mut() else {
            return Step::Yield;
        };

        match flight.state {
            State::Idle => {
                // Never stored; idle is the absence of a flight.
                self.flight = None;
                Step::Yield
            }
            State::Received => {
                flight.state = State::Transmitting;
                Step::Continue
            }
            State::Transmitting => {
                let remaining = flight.loan.len() - flight.cursor;
                flight.chunk = remaining.min(out.max_transfer_size().max(1));
                flight.state = State::AwaitingSendAccepted;
                Step::Continue
            }
            State::AwaitingSendAccepted | State::AwaitingSendComplete if expired => {
                flight.state = State::Aborting;
                Step::Continue
            }
            State::AwaitingSendAccepted => {
                let chunk = &flight.loan.as_slice()[flight.cursor..flight.cursor + flight.chunk];
                if out.try_send(chunk).is_ok() {
                    trace!("SEND {} OF {}", flight.cursor + flight.chunk, flight.loan.len());
                    flight.state = State::AwaitingSendComplete;
                }
                Step::Yield
            }
            State::AwaitingSendComplete => {
                if out.bytes_still_queued() != 0 {
                    return Step::Yield;
                }
                flight.cursor += flight.chunk;
                flight.chunk = 0;
                if flight.cursor < flight.loan.len() {
                    flight.state = State::Transmitting;
                    return Step::Yield;
                }
                self.flight
                    .take()
                    .map_or(Step::Yield, |flight| Step::Delivered(flight.loan))
            }
            State::Aborting => self.abort(out).map_or(Step::Yield, Step::Dropped),
        }
    }

    /// Abort an in-flight transfer
    ///
    /// Cancels the send, and returns the loan. Does nothing when idle.
    pub fn abort<T: Transport>(&mut self, out: &mut T) -> Option<RxLoan> {
        let flight = self.flight.take()?;
        out.abort_send();
        self.recently_dropped = true;
        self.latency = Latency::Dropped;
        Some(flight.loan)
    }

    /// Forget everything, including the drop history.
    ///
    /// Returns the loan if the transfer was in flight. Doesn't touch the
    /// transport.
    pub fn reset(&mut self) -> Option<RxLoan> {
        let flight = core::mem::replace(self, Self::new()).flight;
        flight.map(|flight| flight.loan)
    }
}
