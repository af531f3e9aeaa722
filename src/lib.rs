//! Write / read-back / verify self-test for I2C serial EEPROMs, built on the
//! [`embedded-hal`] traits.
//!
//! The crate is layered leaf first:
//!
//! - [`master`]: the contract a bus controller has to fulfil
//! - [`i2c`]: a [bit banging] controller implementing that contract
//! - [`transfer`]: one transaction, bounded wait, timeout recovery
//! - [`eeprom`]: addressed writes, address-then-read reads, verification
//! - [`selftest`]: the button / LED loop driving one write-read-verify cycle
//!
//! [bit banging]: https://en.wikipedia.org/wiki/Bit_banging
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! ## Usage examples
//!
//! See the board demo in the demos folder in the crate sources

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// must come first so the macros are visible to the other modules
#[macro_use]
mod fmt;

pub mod eeprom;
pub mod i2c;
pub mod master;
pub mod selftest;
pub mod transfer;

pub use eeprom::Eeprom;
pub use master::{Direction, Master, Status};
pub use transfer::{Outcome, Transfer};
