//! Button-triggered EEPROM self-test.
//!
//! An interrupt handler calls [`Trigger::signal`]; the main loop calls
//! [`SelfTest::poll`], which runs one write / read-back / verify cycle per
//! trigger and blinks the result on an [`Indicator`]:
//!
//! | report                   | blinks |
//! |--------------------------|--------|
//! | [`Report::Verified`]     | 1      |
//! | [`Report::Mismatch`]     | 2      |
//! | [`Report::WriteFailed`]  | 3      |
//! | [`Report::ReadFailed`]   | 3      |

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;

use crate::eeprom::{Eeprom, PAYLOAD_SIZE};
use crate::master::Master;
use crate::transfer::Outcome;

/// Self-test parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bytes written and read back per cycle
    pub payload_size: usize,
    /// Wait between the write and the read-back, in microseconds
    pub write_cycle_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            payload_size: PAYLOAD_SIZE,
            write_cycle_us: 5_000,
        }
    }
}

/// "Work requested" flag shared between an interrupt handler and the main loop
///
/// Only plain loads and stores are used, so this works on cores without
/// atomic read-modify-write instructions.
#[derive(Debug, Default)]
pub struct Trigger(AtomicBool);

impl Trigger {
    /// Create an unsignalled trigger, usable in a `static`
    pub const fn new() -> Self {
        Trigger(AtomicBool::new(false))
    }

    /// Request one cycle; safe to call from an interrupt handler
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// `true` once [`Trigger::signal`] was called and not yet cleared
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Acknowledge the request after the cycle has been reported
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Terminal state of one self-test cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    /// Data read back matches the write
    Verified,
    /// Data read back differs, or the EEPROM could not be addressed for the read
    Mismatch,
    /// The write failed
    WriteFailed,
    /// The read failed on the bus
    ReadFailed,
}

impl Report {
    /// Map a write outcome and, if the write completed, a read outcome
    pub fn from_outcomes(write: Outcome, read: Option<Outcome>) -> Self {
        match (write, read) {
            (Outcome::Complete, Some(Outcome::Complete)) => Report::Verified,
            (Outcome::Complete, Some(Outcome::InvalidData)) => Report::Mismatch,
            (Outcome::Complete, Some(Outcome::Error)) => Report::ReadFailed,
            _ => Report::WriteFailed,
        }
    }

    /// Number of blinks signalling this report
    pub fn blinks(self) -> u8 {
        match self {
            Report::Verified => 1,
            Report::Mismatch => 2,
            Report::WriteFailed | Report::ReadFailed => 3,
        }
    }
}

/// Something able to show a small count to a human
pub trait Indicator {
    /// Error type
    type Error;

    /// Signal `count`
    fn blink(&mut self, count: u8) -> Result<(), Self::Error>;
}

/// Active-low LED blinked with a fixed on and off time
pub struct Led<P, D>
where
    P: OutputPin,
    D: DelayMs<u32>,
{
    pin: P,
    delay: D,
    period_ms: u32,
}

/// On and off time of one blink, in milliseconds
pub const BLINK_PERIOD_MS: u32 = 500;

impl<P, D> Led<P, D>
where
    P: OutputPin,
    D: DelayMs<u32>,
{
    /// Create instance with the default blink period
    pub fn new(pin: P, delay: D) -> Self {
        Led::with_period(pin, delay, BLINK_PERIOD_MS)
    }

    /// Create instance with `period_ms` on and `period_ms` off per blink
    pub fn with_period(pin: P, delay: D, period_ms: u32) -> Self {
        Led {
            pin,
            delay,
            period_ms,
        }
    }

    /// Release the pin and the delay
    pub fn free(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

impl<P, D> Indicator for Led<P, D>
where
    P: OutputPin,
    D: DelayMs<u32>,
{
    type Error = P::Error;

    fn blink(&mut self, count: u8) -> Result<(), Self::Error> {
        for _ in 0..count {
            self.pin.set_low()?;
            self.delay.delay_ms(self.period_ms);

            self.pin.set_high()?;
            self.delay.delay_ms(self.period_ms);
        }
        Ok(())
    }
}

/// One EEPROM, one indicator, one trigger
pub struct SelfTest<'t, M, D, I, const W: usize, const R: usize>
where
    M: Master,
    D: DelayUs<u32>,
    I: Indicator,
{
    eeprom: Eeprom<M, D, W, R>,
    indicator: I,
    trigger: &'t Trigger,
    config: Config,
}

impl<'t, M, D, I, const W: usize, const R: usize> SelfTest<'t, M, D, I, W, R>
where
    M: Master,
    D: DelayUs<u32>,
    I: Indicator,
{
    /// Create instance
    pub fn new(
        eeprom: Eeprom<M, D, W, R>,
        indicator: I,
        trigger: &'t Trigger,
        config: Config,
    ) -> Self {
        SelfTest {
            eeprom,
            indicator,
            trigger,
            config,
        }
    }

    /// Run one cycle if the trigger is set, report it and clear the trigger
    ///
    /// Returns `Ok(None)` when there was nothing to do. If the indicator
    /// fails the trigger stays set, so the cycle runs again on the next poll.
    pub fn poll(&mut self) -> Result<Option<Report>, I::Error> {
        if !self.trigger.is_pending() {
            return Ok(None);
        }

        let report = self.run_cycle();
        self.indicator.blink(report.blinks())?;
        self.trigger.clear();

        Ok(Some(report))
    }

    /// Write, wait for the write cycle, read back and verify
    pub fn run_cycle(&mut self) -> Report {
        let size = self.config.payload_size;

        debug!("self-test: writing {} bytes", size);
        let write = self.eeprom.write(size);
        let read = if write.is_complete() {
            self.eeprom.pause(self.config.write_cycle_us);
            debug!("self-test: reading back");
            Some(self.eeprom.read_and_verify(size))
        } else {
            None
        };

        let report = Report::from_outcomes(write, read);
        info!("self-test: {}", report);
        report
    }

    /// Borrow the EEPROM
    pub fn eeprom(&self) -> &Eeprom<M, D, W, R> {
        &self.eeprom
    }

    /// Mutably borrow the EEPROM
    pub fn eeprom_mut(&mut self) -> &mut Eeprom<M, D, W, R> {
        &mut self.eeprom
    }

    /// Borrow the indicator
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Give back the EEPROM and the indicator
    pub fn free(self) -> (Eeprom<M, D, W, R>, I) {
        (self.eeprom, self.indicator)
    }
}
