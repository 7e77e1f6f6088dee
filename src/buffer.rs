//! Inbound buffers, loaned by a transport

use crate::transport::Transport;
use core::ptr::NonNull;

/// A received packet that still lives in transport memory
///
/// A transport hands out an `RxLoan` when it completes a receive. While
/// the loan exists, the transport must not receive into that memory; its
/// receiver is suspended. The only way to give the memory back is
/// [`resume()`](RxLoan::resume), which consumes the loan and re-enables
/// the receiver. So once reception resumes, there's nothing left that can
/// reach the old bytes.
///
/// The relay never copies the bytes.
pub struct RxLoan {
    ptr: NonNull<u8>,
    len: usize,
}

// Safety: the loan is moved from the receive interrupt into the main loop.
// The constructor's contract guarantees exclusive access to the memory for
// the lifetime of the loan, regardless of the execution context.
unsafe impl Send for RxLoan {}

impl RxLoan {
    /// Loan `len` bytes starting at `ptr`
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` initialized bytes. Those bytes must remain
    /// valid, and nothing may write them, until the loan is handed back
    /// through [`resume()`](RxLoan::resume) (the receiver resumes), or until
    /// the transport is re-initialized.
    pub unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        RxLoan { ptr, len }
    }

    /// Returns the number of loaned bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Indicates if the loan is a zero-length packet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the loaned bytes.
    pub fn as_slice(&self) -> &[u8] {
        // Safety: see the constructor's contract. The slice can't outlive the
        // loan, and the loan can't outlive the suspended receiver.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Return the memory to its transport, resuming reception.
    pub fn resume<T: Transport>(self, transport: &mut T) {
        transport.suspend_receive(false);
    }
}

impl core::fmt::Debug for RxLoan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxLoan")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::RxLoan;
    use crate::mock::MockPort;
    use core::ptr::NonNull;

    #[test]
    fn loan_views_transport_memory() {
        let buffer = [1u8, 2, 3, 4];
        let loan = unsafe { RxLoan::new(NonNull::from(&buffer).cast(), 3) };
        assert_eq!(loan.len(), 3);
        assert!(!loan.is_empty());
        assert_eq!(loan.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn resume_enables_receiver() {
        let mut port = MockPort::online();
        let loan = port.deliver(&[0x90, 0x40, 0x7F]);
        assert!(port.is_suspended());
        loan.resume(&mut port);
        assert!(!port.is_suspended());
    }
}
