//! The USB transport seen by the relay

/// One USB-MIDI port, as needed by the relay
///
/// Implement `Transport` on your USB MIDI class (or driver) for each port.
/// All methods are called from the main loop, inside
/// [`Relay::process()`](crate::Relay::process). None of them may block.
///
/// # Reception
///
/// When a receive completes, call [`RelayState::on_receive()`](crate::RelayState::on_receive)
/// with an [`RxLoan`](crate::RxLoan) that describes the received bytes.
/// After delivering a loan, the transport keeps its receiver paused (for
/// example, it doesn't re-prime its OUT endpoint) until the relay calls
/// `suspend_receive(false)`. Resuming reception invalidates every loan
/// that the transport handed out.
pub trait Transport {
    /// Indicates if the port is enumerated and configured by its host.
    fn is_configured(&self) -> bool;

    /// Indicates if the port detects bus power.
    fn is_powered(&self) -> bool;

    /// Indicates that the transport hit an error it can't recover from by
    /// itself.
    ///
    /// When any port reports an error, the relay re-initializes both ports.
    fn has_error(&self) -> bool {
        false
    }

    /// Reset the transport after an error.
    ///
    /// Called for each port when the relay starts over, with the receiver
    /// suspended and no send in flight. Afterwards, `has_error()` should
    /// return `false`. Every loan the transport handed out is forgotten.
    fn reinitialize(&mut self) {}

    /// Returns the largest number of bytes accepted by a single `try_send()`.
    ///
    /// The relay splits larger packets into chunks of this size. Must be
    /// non-zero.
    fn max_transfer_size(&self) -> usize {
        512
    }

    /// Returns the largest packet this port can ever receive.
    ///
    /// A loan beyond this size means that the transport is broken, and
    /// results in a [`Fault`](crate::Fault).
    fn max_packet_len(&self) -> usize {
        4096
    }

    /// Start sending `data` without blocking.
    ///
    /// Return `Err(UsbError::WouldBlock)` if the transport can't take the data
    /// right now; the relay tries again on the next call. The relay treats any
    /// other error the same way. `data` is never longer than
    /// [`max_transfer_size()`](Transport::max_transfer_size).
    fn try_send(&mut self, data: &[u8]) -> usb_device::Result<()>;

    /// Returns how many bytes of the last accepted send are still queued.
    ///
    /// Zero means that the send has completed.
    fn bytes_still_queued(&self) -> usize;

    /// Suspend (`true`) or resume (`false`) reception.
    fn suspend_receive(&mut self, suspend: bool);

    /// Cancel the in-flight send.
    ///
    /// Afterwards, `bytes_still_queued()` returns zero and the next
    /// `try_send()` may succeed.
    fn abort_send(&mut self);
}
