//! Relay timing and fault configuration

/// A duration, or a point in time, counted in ticker periods.
pub type Ticks = u32;

/// The ticker period, in microseconds.
///
/// All [`Ticks`] in this crate assume that [`RelayState::on_tick()`](crate::RelayState::on_tick)
/// runs at this period.
pub const TICK_PERIOD_US: u32 = 125;

/// Converts microseconds to ticks, rounding down.
pub const fn us_to_ticks(us: u32) -> Ticks {
    us / TICK_PERIOD_US
}

/// Converts milliseconds to ticks, rounding down.
///
/// Saturates for durations that don't fit in a `u32` of microseconds.
pub const fn ms_to_ticks(ms: u32) -> Ticks {
    us_to_ticks(ms.saturating_mul(1000))
}

/// What the relay does after the transport breaks its contract.
///
/// See [`Fault`](crate::Fault) for the conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum FaultPolicy {
    /// Panic with the fault diagnostic.
    ///
    /// Your panic handler is expected to halt and show an error
    /// indicator.
    #[default]
    Halt,
    /// Re-initialize both ports and keep going.
    ///
    /// The relay signals [`Event::Fault`](crate::Event::Fault) before
    /// the reset.
    Reset,
}

/// Relay configuration
///
/// The defaults are the reference timings for a 125us ticker.
///
/// ```
/// use usb_midi_relay::{ms_to_ticks, Config, FaultPolicy};
///
/// const CONFIG: Config = Config::new()
///     .with_timeouts(ms_to_ticks(500), ms_to_ticks(50))
///     .with_fault_policy(FaultPolicy::Reset);
///
/// assert_eq!(CONFIG.long_timeout, 4000);
/// assert_eq!(CONFIG.short_timeout, 400);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub struct Config {
    /// Deadline for a transfer that follows a healthy transfer.
    pub long_timeout: Ticks,
    /// Deadline for a transfer that follows an aborted transfer.
    pub short_timeout: Ticks,
    /// Transfers at least this old are [`Late`](crate::Latency::Late).
    pub late_after: Ticks,
    /// Transfers at least this old are [`Stale`](crate::Latency::Stale).
    pub stale_after: Ticks,
    /// Reaction to transport contract violations.
    pub fault_policy: FaultPolicy,
}

impl Config {
    /// The reference configuration
    ///
    /// - 1s deadline, 100ms right after a drop
    /// - late after 1.25ms, stale after 30ms
    /// - halt on faults
    pub const fn new() -> Self {
        Config {
            long_timeout: ms_to_ticks(1000),
            short_timeout: ms_to_ticks(100),
            late_after: us_to_ticks(1250),
            stale_after: ms_to_ticks(30),
            fault_policy: FaultPolicy::Halt,
        }
    }

    /// Set the long and short transfer deadlines.
    pub const fn with_timeouts(mut self, long: Ticks, short: Ticks) -> Self {
        self.long_timeout = long;
        self.short_timeout = short;
        self
    }

    /// Set the late and stale latency thresholds.
    pub const fn with_latency_thresholds(mut self, late: Ticks, stale: Ticks) -> Self {
        self.late_after = late;
        self.stale_after = stale;
        self
    }

    /// Set the fault policy.
    pub const fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Returns the deadline for the next transfer.
    pub(crate) const fn timeout(&self, recently_dropped: bool) -> Ticks {
        if recently_dropped {
            self.short_timeout
        } else {
            self.long_timeout
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
