//! Port link monitor
//!
//! Tracks whether a port is configured, and whether it's powered. The
//! monitor reports edges. It never retries, and never reports the same
//! edge twice.

bitflags::bitflags! {
    /// Link transitions found by one observation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LinkEvents : u8 {
        /// The port became configured.
        const ENTERED_ONLINE = 1 << 0;
        /// The port lost its configuration.
        const ENTERED_OFFLINE = 1 << 1;
        /// Bus power appeared or disappeared.
        const POWERED_CHANGED = 1 << 2;
    }
}

/// Link status of one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLink {
    configured: bool,
    powered: bool,
    /// Set after the first observation.
    settled: bool,
}

impl PortLink {
    pub const fn new() -> Self {
        PortLink {
            configured: false,
            powered: false,
            settled: false,
        }
    }

    /// Take a new observation of the port.
    ///
    /// The first observation after `new()` or `unsettle()` always reports
    /// the current values as transitions, so that a display starts out
    /// correct.
    pub fn observe(&mut self, configured: bool, powered: bool) -> LinkEvents {
        if !self.settled {
            self.settled = true;
            self.configured = !configured;
            self.powered = !powered;
        }

        let mut events = LinkEvents::empty();
        if configured != self.configured {
            self.configured = configured;
            events |= if configured {
                LinkEvents::ENTERED_ONLINE
            } else {
                LinkEvents::ENTERED_OFFLINE
            };
        }
        if powered != self.powered {
            self.powered = powered;
            events |= LinkEvents::POWERED_CHANGED;
        }
        events
    }

    /// Forget link history. The next observation reports everything again.
    pub fn unsettle(&mut self) {
        *self = Self::new();
    }

    /// Indicates if the last observation found the port configured.
    pub fn configured(&self) -> bool {
        self.settled && self.configured
    }

    /// Indicates if the last observation found bus power.
    pub fn powered(&self) -> bool {
        self.settled && self.powered
    }
}

impl Default for PortLink {
    fn default() -> Self {
        Self::new()
    }
}
