#![allow(dead_code)]

pub mod sim;
pub mod wire;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::timer::{CountDown, Periodic};

/// Delay that only adds up the time it was asked to wait
#[derive(Debug, Default)]
pub struct Clock {
    pub us: u64,
}

impl DelayUs<u32> for Clock {
    fn delay_us(&mut self, us: u32) {
        self.us += u64::from(us);
    }
}

impl DelayMs<u32> for Clock {
    fn delay_ms(&mut self, ms: u32) {
        self.us += u64::from(ms) * 1000;
    }
}

/// Periodic timer that is always due
pub struct Tick;

impl CountDown for Tick {
    type Time = ();

    fn start<T: Into<()>>(&mut self, _: T) {}

    fn wait(&mut self) -> nb::Result<(), void::Void> {
        Ok(())
    }
}

impl Periodic for Tick {}

/// 0, 1, 2, ... wrapping at 256
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}
