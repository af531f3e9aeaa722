//! Contract between the transfer layer and an I2C controller.
//!
//! A controller only has to start a transaction, report whether it is still
//! running, say how many bytes went over the wire and be able to be switched
//! off and on again. Everything else (waiting, timeouts, recovery) lives in
//! [`crate::transfer`].

use bitflags::bitflags;

bitflags! {
    /// Controller status as returned by [`Master::status`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u32 {
        /// Transaction still in progress
        const BUSY = 1 << 0;
        /// Target did not acknowledge a data byte
        const DATA_NAK = 1 << 1;
        /// Target did not acknowledge its address
        const ADDR_NAK = 1 << 2;
        /// Another controller won the bus
        const ARB_LOST = 1 << 3;
        /// START condition could not be generated
        const ABORT_START = 1 << 4;
        /// Misplaced START/STOP or line fault
        const BUS_ERR = 1 << 5;

        /// Any of the bits that make a finished transaction a failure
        const ERRORS = Self::DATA_NAK.bits()
            | Self::ADDR_NAK.bits()
            | Self::ARB_LOST.bits()
            | Self::ABORT_START.bits()
            | Self::BUS_ERR.bits();
    }
}

impl Status {
    /// `true` while the controller is still moving bytes
    #[inline]
    pub fn is_busy(self) -> bool {
        self.contains(Status::BUSY)
    }

    /// `true` if any error bit is set
    #[inline]
    pub fn has_error(self) -> bool {
        self.intersects(Status::ERRORS)
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Controller to target
    Write,
    /// Target to controller
    Read,
}

/// An I2C controller able to run one master transaction at a time.
///
/// `start_write` / `start_read` only *start* a transaction. Implementations
/// that complete in the background keep using `data` until [`Master::status`]
/// stops reporting [`Status::BUSY`]; the caller keeps the buffer borrowed for
/// that whole time.
///
/// With `pending` set no STOP condition is generated, so the next `start_*`
/// continues the same bus session with a repeated START.
pub trait Master {
    /// Error returned when a transaction cannot be started
    type Error;

    /// Start writing `data` to the target at 7-bit `address`
    fn start_write(&mut self, address: u8, data: &[u8], pending: bool) -> Result<(), Self::Error>;

    /// Start reading `data.len()` bytes from the target at 7-bit `address`
    fn start_read(
        &mut self,
        address: u8,
        data: &mut [u8],
        pending: bool,
    ) -> Result<(), Self::Error>;

    /// Current status of the last started transaction
    fn status(&mut self) -> Status;

    /// Bytes transferred by the last started transaction
    fn transfer_count(&mut self) -> usize;

    /// Switch the controller off, dropping whatever is in flight
    fn disable(&mut self);

    /// Switch the controller back on
    fn enable(&mut self);
}

impl<M: Master + ?Sized> Master for &mut M {
    type Error = M::Error;

    fn start_write(&mut self, address: u8, data: &[u8], pending: bool) -> Result<(), Self::Error> {
        (**self).start_write(address, data, pending)
    }

    fn start_read(
        &mut self,
        address: u8,
        data: &mut [u8],
        pending: bool,
    ) -> Result<(), Self::Error> {
        (**self).start_read(address, data, pending)
    }

    fn status(&mut self) -> Status {
        (**self).status()
    }

    fn transfer_count(&mut self) -> usize {
        (**self).transfer_count()
    }

    fn disable(&mut self) {
        (**self).disable()
    }

    fn enable(&mut self) {
        (**self).enable()
    }
}
