//! Host-side transport and event sink for tests

use std::{boxed::Box, vec::Vec};

use crate::{buffer::RxLoan, Event, Fault, PortId, RelayState, Transport};
use core::ptr::NonNull;
use usb_device::UsbError;

/// A scripted transport
pub struct MockPort {
    pub configured: bool,
    pub powered: bool,
    pub error: bool,
    /// `try_send()` reports `WouldBlock` while set.
    pub busy: bool,
    /// Accepted sends complete immediately while set. Otherwise, they stay
    /// queued until `complete()`.
    pub auto_complete: bool,
    pub max_transfer: usize,
    pub max_packet: usize,
    queued: usize,
    suspended: bool,
    /// Every accepted send, in order.
    pub sent: Vec<Vec<u8>>,
    pub send_attempts: usize,
    pub aborts: usize,
    pub reinits: usize,
    pub resume_hook: Option<ResumeHook>,
}

/// Acts as the receive interrupt, firing the moment the receiver resumes
pub struct ResumeHook {
    pub state: &'static RelayState,
    pub port: PortId,
    /// Delivered front to back, one per resume.
    pub packets: Vec<Vec<u8>>,
    pub results: Vec<Result<(), Fault>>,
    /// Set if the receiver resumed while `port` still had a loan out.
    pub resumed_with_loan: bool,
}

impl ResumeHook {
    pub fn new(state: &'static RelayState, port: PortId) -> Self {
        ResumeHook {
            state,
            port,
            packets: Vec::new(),
            results: Vec::new(),
            resumed_with_loan: false,
        }
    }
}

/// Leaked memory is never freed or written again.
fn leak(data: &[u8]) -> RxLoan {
    let bytes: &'static mut [u8] = Box::leak(data.to_vec().into_boxed_slice());
    let len = bytes.len();
    // Safety: see above.
    unsafe { RxLoan::new(NonNull::from(bytes).cast(), len) }
}

impl MockPort {
    pub fn online() -> Self {
        MockPort {
            configured: true,
            powered: true,
            error: false,
            busy: false,
            auto_complete: true,
            max_transfer: 512,
            max_packet: 4096,
            queued: 0,
            suspended: false,
            sent: Vec::new(),
            send_attempts: 0,
            aborts: 0,
            reinits: 0,
            resume_hook: None,
        }
    }

    pub fn offline() -> Self {
        MockPort {
            configured: false,
            powered: false,
            ..Self::online()
        }
    }

    /// Complete a receive, pausing the receiver like real hardware.
    ///
    /// The received bytes are leaked, so that the loan is always valid.
    pub fn deliver(&mut self, data: &[u8]) -> RxLoan {
        self.suspended = true;
        leak(data)
    }

    /// Finish the queued send.
    pub fn complete(&mut self) {
        self.queued = 0;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Every accepted byte, in order.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent.concat()
    }
}

impl Transport for MockPort {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn has_error(&self) -> bool {
        self.error
    }

    fn reinitialize(&mut self) {
        self.reinits += 1;
        self.error = false;
    }

    fn max_transfer_size(&self) -> usize {
        self.max_transfer
    }

    fn max_packet_len(&self) -> usize {
        self.max_packet
    }

    fn try_send(&mut self, data: &[u8]) -> usb_device::Result<()> {
        self.send_attempts += 1;
        assert!(data.len() <= self.max_transfer, "chunk exceeds transfer size");
        assert_eq!(self.queued, 0, "send while previous send is queued");
        if self.busy {
            return Err(UsbError::WouldBlock);
        }
        self.sent.push(data.to_vec());
        if !self.auto_complete {
            self.queued = data.len();
        }
        Ok(())
    }

    fn bytes_still_queued(&self) -> usize {
        self.queued
    }

    fn suspend_receive(&mut self, suspend: bool) {
        self.suspended = suspend;
        if suspend {
            return;
        }
        let Some(hook) = self.resume_hook.as_mut() else {
            return;
        };
        if !hook.state.is_vacant(hook.port) {
            hook.resumed_with_loan = true;
        }
        if !hook.packets.is_empty() {
            let data = hook.packets.remove(0);
            self.suspended = true;
            hook.results.push(hook.state.on_receive(hook.port, leak(&data)));
        }
    }

    fn abort_send(&mut self) {
        self.aborts += 1;
        self.queued = 0;
    }
}

/// Records events
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<(PortId, Event)>,
}

impl Recorder {
    /// Takes the recorded events.
    pub fn take(&mut self) -> Vec<(PortId, Event)> {
        core::mem::take(&mut self.events)
    }
}

impl crate::EventSink for Recorder {
    fn event(&mut self, port: PortId, event: Event) {
        self.events.push((port, event));
    }
}
