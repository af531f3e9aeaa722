/*!
  # Single I2C transaction with bounded wait and timeout recovery

  [`Transfer`] starts one write or read on a [`Master`], then polls its status
  with a fixed delay between polls until the controller goes idle or the poll
  budget runs out.

  - Start refused: the call fails at once, nothing is waited for.
  - Budget exhausted while still busy: the controller is disabled and enabled
    again, dropping the transaction, and the call fails.
  - Controller idle: the call succeeds only if no error bit is set and the
    controller moved exactly the requested number of bytes.

  There are no retries at this level.

  ```no_run
    use embedded_hal::blocking::delay::DelayUs;
    use eeprom_selftest::transfer::{Config, Outcome, Transfer};
    use eeprom_selftest::{Direction, Master};

    fn write_byte<M: Master, D: DelayUs<u32>>(master: M, delay: D) -> bool {
        let mut transfer = Transfer::new(master, delay, Config::default());

        // address 0x0000, one data byte
        let mut buf = [0x00, 0x00, 0xAB];
        transfer.execute(Direction::Write, &mut buf, 3, false) == Outcome::Complete
    }
  ```
*/

use embedded_hal::blocking::delay::DelayUs;

use crate::master::{Direction, Master, Status};

/// 7-bit address of a 24xx EEPROM with A0 strapped high
pub const DEFAULT_ADDRESS: u8 = 0x51;

/// Status polls before a transaction counts as stuck
pub const DEFAULT_TIMEOUT_POLLS: u32 = 1000;

/// Delay between two status polls, in microseconds
pub const DEFAULT_POLL_DELAY_US: u32 = 1;

/// Transfer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7-bit target address
    pub address: u8,
    /// Status polls allowed before the controller is reset
    pub timeout_polls: u32,
    /// Delay after each status poll, in microseconds
    pub poll_delay_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: DEFAULT_ADDRESS,
            timeout_polls: DEFAULT_TIMEOUT_POLLS,
            poll_delay_us: DEFAULT_POLL_DELAY_US,
        }
    }
}

/// Result of a protocol operation as seen by its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Transfer done and, where checked, data verified
    Complete,
    /// Transfer failed on the bus
    Error,
    /// Transfer done but the data read back is not what was written
    InvalidData,
}

impl Outcome {
    /// `true` for [`Outcome::Complete`]
    #[inline]
    pub fn is_complete(self) -> bool {
        self == Outcome::Complete
    }
}

/// Transfer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Controller refused to start the transaction
    Start(E),
    /// Controller stayed busy for the whole poll budget and was reset
    Timeout,
    /// Transaction finished with error bits set or a short byte count
    Transfer {
        /// Raw [`Status`] bits seen when the controller went idle
        status: u32,
        /// Bytes the controller reports as moved
        transferred: usize,
        /// Bytes requested
        expected: usize,
    },
    /// Requested length does not fit the buffer
    Length {
        /// Bytes requested
        requested: usize,
        /// Buffer size
        capacity: usize,
    },
}

impl<E> From<Error<E>> for Outcome {
    fn from(_: Error<E>) -> Self {
        Outcome::Error
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

/// Transaction runner bound to one controller, one delay source and one target
pub struct Transfer<M, D>
where
    M: Master,
    D: DelayUs<u32>,
{
    master: M,
    delay: D,
    config: Config,
}

impl<M, D> Transfer<M, D>
where
    M: Master,
    D: DelayUs<u32>,
{
    /// Create instance
    pub fn new(master: M, delay: D, config: Config) -> Self {
        Transfer {
            master,
            delay,
            config,
        }
    }

    /// Run one transaction and collapse its result into an [`Outcome`]
    ///
    /// Never returns [`Outcome::InvalidData`]; data checks belong to the caller.
    pub fn execute(
        &mut self,
        direction: Direction,
        buffer: &mut [u8],
        length: usize,
        pending: bool,
    ) -> Outcome {
        self.try_execute(direction, buffer, length, pending).into()
    }

    /// Run one transaction on the first `length` bytes of `buffer`
    pub fn try_execute(
        &mut self,
        direction: Direction,
        buffer: &mut [u8],
        length: usize,
        pending: bool,
    ) -> Result<(), Error<M::Error>> {
        if length > buffer.len() {
            return Err(Error::Length {
                requested: length,
                capacity: buffer.len(),
            });
        }

        let address = self.config.address;
        let data = &mut buffer[..length];
        let started = match direction {
            Direction::Write => self.master.start_write(address, data, pending),
            Direction::Read => self.master.start_read(address, data, pending),
        };
        if let Err(e) = started {
            warn!("i2c {} of {} bytes refused to start", direction, length);
            return Err(Error::Start(e));
        }

        let status = match self.wait_idle() {
            Some(status) => status,
            None => {
                warn!(
                    "i2c {} stuck after {} polls, resetting controller",
                    direction,
                    self.config.timeout_polls
                );
                self.recover();
                return Err(Error::Timeout);
            }
        };

        let transferred = self.master.transfer_count();
        trace!(
            "i2c {} done: status {=u32:#x}, {} of {} bytes",
            direction,
            status.bits(),
            transferred,
            length
        );

        if status.has_error() || transferred != length {
            return Err(Error::Transfer {
                status: status.bits(),
                transferred,
                expected: length,
            });
        }

        Ok(())
    }

    /// Block for `us` microseconds on the transfer's delay source
    #[inline]
    pub fn pause(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Borrow the controller
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Mutably borrow the controller
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Give back the controller and the delay source
    pub fn free(self) -> (M, D) {
        (self.master, self.delay)
    }

    /// Poll until the controller is idle; `None` once the budget is spent
    fn wait_idle(&mut self) -> Option<Status> {
        for _ in 0..self.config.timeout_polls {
            let status = self.master.status();
            self.delay.delay_us(self.config.poll_delay_us);
            if !status.is_busy() {
                return Some(status);
            }
        }
        None
    }

    #[inline]
    fn recover(&mut self) {
        self.master.disable();
        self.master.enable();
    }
}
