/*!
  # Serial EEPROM write / read-back / verify

  Every write puts the two byte big-endian memory address in front of the
  payload. A read first writes the address alone, leaving the bus pending so
  the EEPROM's internal pointer is moved without a STOP, then reads the bytes
  back and ends the session.

  The payload is not supplied by the caller: byte `i` of a write is always
  `i as u8`, so the data read back can be checked against the last write
  without any extra state.

  Both buffers belong to the [`Eeprom`] instance. `W` is the write buffer
  size including the address prefix, `R` the read buffer size.

  ```no_run
    use embedded_hal::blocking::delay::DelayUs;
    use eeprom_selftest::eeprom::{Config, Eeprom};
    use eeprom_selftest::{Master, Outcome};

    fn check<M: Master, D: DelayUs<u32>>(master: M, delay: D) -> Outcome {
        let mut eeprom: Eeprom<M, D> = Eeprom::new(master, delay, Config::default());

        match eeprom.write(64) {
            Outcome::Complete => eeprom.read_and_verify(64),
            failed => failed,
        }
    }
  ```
*/

use embedded_hal::blocking::delay::DelayUs;

use crate::master::{Direction, Master};
use crate::transfer::{self, Outcome, Transfer};

/// Size of the memory address sent ahead of each write
pub const ADDRESS_LEN: usize = 2;

/// Payload size of one self-test cycle
pub const PAYLOAD_SIZE: usize = 64;

/// Default write buffer size
pub const WRITE_CAPACITY: usize = PAYLOAD_SIZE + ADDRESS_LEN;

/// Default read buffer size
pub const READ_CAPACITY: usize = PAYLOAD_SIZE;

/// EEPROM parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus parameters for the EEPROM target
    pub transfer: transfer::Config,
    /// Memory address all writes and reads start from
    pub base_address: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transfer: transfer::Config::default(),
            base_address: 0x0000,
        }
    }
}

/// EEPROM error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The write or read transaction failed
    Bus(transfer::Error<E>),
    /// The address write ahead of a read failed
    Reposition(transfer::Error<E>),
    /// Data read back differs from the last write
    Mismatch {
        /// First differing offset
        index: usize,
        /// Byte written at that offset
        expected: u8,
        /// Byte read back at that offset
        found: u8,
    },
}

/// A failed address write before a read reports [`Outcome::InvalidData`],
/// not [`Outcome::Error`]. Use the `try_*` methods to tell the two apart.
impl<E> From<Error<E>> for Outcome {
    fn from(e: Error<E>) -> Self {
        match e {
            Error::Bus(_) => Outcome::Error,
            Error::Reposition(_) | Error::Mismatch { .. } => Outcome::InvalidData,
        }
    }
}

impl<E> From<Result<(), Error<E>>> for Outcome {
    fn from(result: Result<(), Error<E>>) -> Self {
        match result {
            Ok(()) => Outcome::Complete,
            Err(e) => e.into(),
        }
    }
}

/// Serial EEPROM on an I2C bus
pub struct Eeprom<M, D, const W: usize = WRITE_CAPACITY, const R: usize = READ_CAPACITY>
where
    M: Master,
    D: DelayUs<u32>,
{
    transfer: Transfer<M, D>,
    base_address: u16,
    write_buf: [u8; W],
    read_buf: [u8; R],
}

impl<M, D, const W: usize, const R: usize> Eeprom<M, D, W, R>
where
    M: Master,
    D: DelayUs<u32>,
{
    /// Create instance
    pub fn new(master: M, delay: D, config: Config) -> Self {
        Eeprom {
            transfer: Transfer::new(master, delay, config.transfer),
            base_address: config.base_address,
            write_buf: [0; W],
            read_buf: [0; R],
        }
    }

    /// Largest payload [`Eeprom::write`] accepts
    pub fn write_capacity(&self) -> usize {
        W.saturating_sub(ADDRESS_LEN)
    }

    /// Largest size [`Eeprom::read_and_verify`] accepts
    pub fn read_capacity(&self) -> usize {
        R
    }

    /// Write the address prefix and `size` ramp bytes
    pub fn write(&mut self, size: usize) -> Outcome {
        self.try_write(size).into()
    }

    /// Write the address prefix and `size` ramp bytes, keeping the cause of a failure
    ///
    /// `size == 0` writes the address alone and leaves the bus pending for a
    /// following read.
    pub fn try_write(&mut self, size: usize) -> Result<(), Error<M::Error>> {
        self.send(size).map_err(Error::Bus)
    }

    /// Read `size` bytes back from the base address and compare with the last write
    pub fn read_and_verify(&mut self, size: usize) -> Outcome {
        self.try_read_and_verify(size).into()
    }

    /// Read `size` bytes back from the base address and compare with the last write,
    /// keeping the cause of a failure
    ///
    /// Verification only runs when the read itself succeeded. A `size` larger
    /// than either buffer fails before anything goes on the bus.
    pub fn try_read_and_verify(&mut self, size: usize) -> Result<(), Error<M::Error>> {
        self.check_verify_size(size).map_err(Error::Bus)?;
        self.send(0).map_err(Error::Reposition)?;

        self.transfer
            .try_execute(Direction::Read, &mut self.read_buf, size, false)
            .map_err(Error::Bus)?;
        trace!("eeprom read back: {=[u8]}", &self.read_buf[..size]);

        self.verify(size)
    }

    /// Compare the first `size` bytes of the read buffer with the last write payload
    ///
    /// Stops at the first differing byte. No bus traffic. A `size` beyond what
    /// either buffer holds is refused rather than compared in part.
    pub fn verify(&self, size: usize) -> Result<(), Error<M::Error>> {
        self.check_verify_size(size).map_err(Error::Bus)?;

        let written = &self.write_buf[ADDRESS_LEN.min(W)..];
        let mismatch = self
            .read_buf
            .iter()
            .zip(written)
            .take(size)
            .position(|(read, wrote)| read != wrote);

        match mismatch {
            None => Ok(()),
            Some(index) => {
                let (expected, found) = (written[index], self.read_buf[index]);
                warn!(
                    "eeprom mismatch at {}: wrote {=u8:#x}, read {=u8:#x}",
                    index,
                    expected,
                    found
                );
                Err(Error::Mismatch {
                    index,
                    expected,
                    found,
                })
            }
        }
    }

    /// Payload region of the write buffer, as last written
    pub fn written(&self) -> &[u8] {
        &self.write_buf[ADDRESS_LEN.min(W)..]
    }

    /// Whole write buffer, address prefix included
    pub fn write_buffer(&self) -> &[u8; W] {
        &self.write_buf
    }

    /// Read buffer, as last read
    pub fn read_buffer(&self) -> &[u8; R] {
        &self.read_buf
    }

    /// Mutable read buffer, mainly to inject faults before [`Eeprom::verify`]
    pub fn read_buffer_mut(&mut self) -> &mut [u8; R] {
        &mut self.read_buf
    }

    /// Block for `us` microseconds, e.g. to let an internal write cycle finish
    pub fn pause(&mut self, us: u32) {
        self.transfer.pause(us);
    }

    /// Borrow the controller
    pub fn master(&self) -> &M {
        self.transfer.master()
    }

    /// Mutably borrow the controller
    pub fn master_mut(&mut self) -> &mut M {
        self.transfer.master_mut()
    }

    /// Give back the controller and the delay source
    pub fn free(self) -> (M, D) {
        self.transfer.free()
    }

    /// Refuses a size that cannot be both read back and compared
    fn check_verify_size(&self, size: usize) -> Result<(), transfer::Error<M::Error>> {
        let capacity = self.write_capacity().min(R);
        if size > capacity {
            return Err(transfer::Error::Length {
                requested: size,
                capacity,
            });
        }
        Ok(())
    }

    fn send(&mut self, size: usize) -> Result<(), transfer::Error<M::Error>> {
        let length = match size.checked_add(ADDRESS_LEN) {
            Some(length) if length <= W => length,
            _ => {
                return Err(transfer::Error::Length {
                    requested: size.saturating_add(ADDRESS_LEN),
                    capacity: W,
                })
            }
        };

        self.write_buf[..ADDRESS_LEN].copy_from_slice(&self.base_address.to_be_bytes());
        for (i, byte) in self.write_buf[ADDRESS_LEN..length].iter_mut().enumerate() {
            *byte = i as u8;
        }
        if size != 0 {
            trace!("eeprom write: {=[u8]}", &self.write_buf[ADDRESS_LEN..length]);
        }

        let pending = size == 0;
        self.transfer
            .try_execute(Direction::Write, &mut self.write_buf, length, pending)
    }
}
