//! The main-loop half of the relay

use crate::{
    buffer::RxLoan,
    config::{Config, FaultPolicy},
    event::{Event, EventSink, Latency},
    fault::Fault,
    link::{LinkEvents, PortLink},
    state::{Inbound, RelayState},
    transfer::{PacketTransfer, State, Step},
    transport::Transport,
    PortId, Ticks,
};

/// A dual-port packet relay
///
/// The relay owns both transports. Packets received on one port are
/// forwarded to the other; see the [crate documentation](crate) for the
/// set up.
pub struct Relay<'a, T, S> {
    ports: [T; 2],
    links: [PortLink; 2],
    /// Indexed by the outgoing port.
    transfers: [PacketTransfer; 2],
    state: &'a RelayState,
    sink: S,
    config: Config,
}

impl<'a, T, S> Relay<'a, T, S>
where
    T: Transport,
    S: EventSink,
{
    /// Create a relay over two ports
    ///
    /// `ports[0]` is [`PortId::A`], and `ports[1]` is [`PortId::B`]. Both
    /// receivers are enabled, unless the port already delivered a packet
    /// into `state`. Link events are signaled on the first
    /// [`process()`](Relay::process).
    ///
    /// # Panics
    ///
    /// Panics if `state` is already lent to another relay.
    pub fn new(ports: [T; 2], state: &'a RelayState, sink: S, config: Config) -> Self {
        assert!(state.lend(), "Relay state already assigned");
        let mut relay = Relay {
            ports,
            links: [PortLink::new(), PortLink::new()],
            transfers: [PacketTransfer::new(), PacketTransfer::new()],
            state,
            sink,
            config,
        };
        for port in PortId::ALL {
            relay.resume_if_vacant(port);
        }
        relay
    }

    /// Move packets
    ///
    /// Call this from the main loop, as often as you can. It never blocks,
    /// and it makes at most a few transport calls per port.
    ///
    /// # Panics
    ///
    /// Panics if the transport broke its contract, and the fault policy is
    /// [`FaultPolicy::Halt`].
    pub fn process(&mut self) {
        if self.handle_fault() {
            return;
        }
        if self.ports.iter().any(Transport::has_error) {
            warn!("TRANSPORT ERROR");
            self.reinitialize();
            return;
        }

        for port in PortId::ALL {
            self.check_link(port);
        }
        for port in PortId::ALL {
            self.check_inbox(port);
        }
        if self.handle_fault() {
            return;
        }

        let now = self.state.ticks();
        for port in PortId::ALL {
            self.advance(port, now);
        }
    }

    /// Returns the state of the transfer that's outgoing on `port`.
    pub fn transfer_state(&self, port: PortId) -> State {
        self.transfers[port.index()].state()
    }

    /// Returns the latest latency class of the transfer that's outgoing on `port`.
    pub fn latency(&self, port: PortId) -> Latency {
        self.transfers[port.index()].latency()
    }

    /// Indicates if the last transfer outgoing on `port` was aborted.
    ///
    /// While set, the next transfer runs with the short deadline.
    pub fn recently_dropped(&self, port: PortId) -> bool {
        self.transfers[port.index()].recently_dropped()
    }

    /// Returns the packet that's outgoing on `port`, if any.
    pub fn packet(&self, port: PortId) -> Option<&[u8]> {
        self.transfers[port.index()].packet()
    }

    /// Indicates if a received packet is waiting on `port`.
    pub fn has_pending(&self, port: PortId) -> bool {
        self.state.has_pending(port)
    }

    /// Indicates if `port` was configured when last checked.
    pub fn is_online(&self, port: PortId) -> bool {
        self.links[port.index()].configured()
    }

    /// Indicates if `port` had bus power when last checked.
    pub fn is_powered(&self, port: PortId) -> bool {
        self.links[port.index()].powered()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transport for `port`.
    pub fn transport(&self, port: PortId) -> &T {
        &self.ports[port.index()]
    }

    /// Returns the transport for `port`.
    ///
    /// Don't send or receive through the transport while the relay is
    /// using it.
    pub fn transport_mut(&mut self, port: PortId) -> &mut T {
        &mut self.ports[port.index()]
    }

    /// Returns the event sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the event sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn emit(&mut self, port: PortId, event: Event) {
        trace!("{} {}", port, event);
        self.sink.event(port, event);
    }

    /// Give a loan back to the port that received it.
    ///
    /// The port may deliver again as soon as its receiver resumes, so it's
    /// released first.
    fn give_back(&mut self, port: PortId, loan: RxLoan) {
        self.state.release(port);
        loan.resume(&mut self.ports[port.index()]);
    }

    /// Enable the receiver, unless a loan from `port` is still outstanding.
    fn resume_if_vacant(&mut self, port: PortId) {
        if self.state.is_vacant(port) {
            self.ports[port.index()].suspend_receive(false);
        }
    }

    /// Apply the fault policy to a remembered fault.
    ///
    /// Returns `true` if the relay was reset.
    fn handle_fault(&mut self) -> bool {
        let Some(fault) = self.state.take_fault() else {
            return false;
        };
        match self.config.fault_policy {
            FaultPolicy::Halt => panic!("{}", fault),
            FaultPolicy::Reset => {
                warn!("FAULT {}", fault);
                self.emit(fault.port(), Event::Fault(fault));
                self.reinitialize();
                true
            }
        }
    }

    /// Start over on both ports.
    ///
    /// Aborts all sends, re-initializes both transports, discards all
    /// packets, and forgets the link history. Both receivers are enabled
    /// once nothing refers to their memory.
    fn reinitialize(&mut self) {
        for port in PortId::ALL {
            let index = port.index();
            let transport = &mut self.ports[index];
            transport.suspend_receive(true);
            transport.abort_send();
            transport.reinitialize();
            if self.transfers[index].reset().is_some() {
                self.emit(port.other(), Event::PacketDropped);
            }
            self.state.clear(port);
            self.links[index].unsettle();
        }
        for port in PortId::ALL {
            self.ports[port.index()].suspend_receive(false);
        }
        debug!("REINITIALIZED");
    }

    fn check_link(&mut self, port: PortId) {
        let index = port.index();
        let transport = &self.ports[index];
        let events = self.links[index].observe(transport.is_configured(), transport.is_powered());
        if events.is_empty() {
            return;
        }
        debug!("LINK {} {=u8:b}", port, events.bits());

        if events.contains(LinkEvents::ENTERED_ONLINE) {
            self.resume_if_vacant(port);
            self.emit(port, Event::PortOnline);
        }
        if events.contains(LinkEvents::ENTERED_OFFLINE) {
            self.unplug(port);
            self.emit(port, Event::PortOffline);
        }
        if events.contains(LinkEvents::POWERED_CHANGED) {
            let event = if self.links[index].powered() {
                Event::PortPowered
            } else {
                Event::PortUnpowered
            };
            self.emit(port, event);
        }
    }

    /// Abort everything that involves `port`, after it lost its configuration.
    fn unplug(&mut self, port: PortId) {
        let far = port.other();

        // Packet from `port`: the loaned memory belongs to a transport that's
        // gone. Stop sending it, and never look at it again.
        if self.transfers[far.index()]
            .abort(&mut self.ports[far.index()])
            .is_some()
        {
            self.state.disarm(far);
            self.emit(port, Event::PacketDropped);
        }

        // Packet to `port`: hand the memory back to the far side.
        if let Some(loan) = self.transfers[port.index()].abort(&mut self.ports[port.index()]) {
            self.give_back(far, loan);
            self.emit(far, Event::PacketDropped);
        }

        // Anything still waiting from `port` is just as stale.
        self.state.clear(port);
        debug!("UNPLUGGED {}", port);
    }

    /// Accept the packet waiting on inbound `port`, if any.
    fn check_inbox(&mut self, port: PortId) {
        let out = port.other();
        if !self.transfers[out.index()].is_idle() {
            return;
        }
        let Some(Inbound { loan, received_at }) = self.state.claim(port) else {
            return;
        };

        if loan.is_empty() {
            self.give_back(port, loan);
            return;
        }
        let max_packet_len = self.ports[port.index()].max_packet_len();
        if loan.len() > max_packet_len {
            // The port stays claimed; the fault handler starts over.
            self.state.latch_fault(Fault::OversizePacket {
                port,
                len: loan.len(),
            });
            return;
        }
        if !self.links[port.index()].configured() {
            // Arrived just as the port went away.
            self.give_back(port, loan);
            return;
        }
        if !self.links[out.index()].configured() {
            self.give_back(port, loan);
            self.emit(port, Event::PacketDroppedIncoming);
            return;
        }

        let now = self.state.ticks();
        let transfer = &mut self.transfers[out.index()];
        let deadline = transfer.accept(loan, received_at, now, &self.config);
        let latency = transfer.latency();
        self.ports[port.index()].suspend_receive(true);
        self.state.arm(out, deadline);
        debug!("START {} -> {} DEADLINE {}", port, out, deadline);
        self.emit(port, Event::PacketStarted(latency));
    }

    /// Drive the transfer that's outgoing on `out`.
    fn advance(&mut self, out: PortId, now: Ticks) {
        let port = out.other();
        let expired = self.state.take_expired(out);

        if let Some(latency) = self.transfers[out.index()].update_latency(now, &self.config) {
            self.emit(port, Event::LatencyChanged(latency));
        }

        loop {
            match self.transfers[out.index()].step(&mut self.ports[out.index()], expired) {
                Step::Continue => continue,
                Step::Yield => break,
                Step::Delivered(loan) => {
                    let latency = self.transfers[out.index()].latency();
                    self.state.disarm(out);
                    self.give_back(port, loan);
                    debug!("DELIVERED {} -> {}", port, out);
                    self.emit(port, Event::PacketDelivered(latency));
                    break;
                }
                Step::Dropped(loan) => {
                    self.state.disarm(out);
                    self.give_back(port, loan);
                    warn!("DROPPED {} -> {}", port, out);
                    self.emit(port, Event::PacketDropped);
                    break;
                }
            }
        }
    }
}
