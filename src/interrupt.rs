//! Critical sections
//!
//! On the embedded target, this is `cortex_m::interrupt::free`. Hosted
//! builds (tests, simulations) have no interrupts to mask, and a single
//! execution context, so the critical section is just the token.

pub use cortex_m::interrupt::{CriticalSection, Mutex};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m::interrupt::free;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub fn free<R>(func: impl FnOnce(&CriticalSection) -> R) -> R {
    // Safety: nothing else can preempt a hosted caller inside this crate.
    func(unsafe { &CriticalSection::new() })
}
