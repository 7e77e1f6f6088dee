//! Logging interface, contingent on the `defmt-03` feature
//!
//! Every macro expands to nothing when the feature is off. Only log
//! values that the surrounding code uses anyway, so that disabling the
//! feature doesn't leave unused bindings behind.

macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt_03::trace!($($args)*)
    };
}

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt_03::debug!($($args)*)
    };
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt_03::warn!($($args)*)
    };
}
