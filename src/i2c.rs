/*!
  # I2C controller based on GPIO bitbang

  [`I2cBB`] implements [`Master`] in software, so the EEPROM self-test runs on
  boards without a usable I2C block.

  This implementation consumes the following hardware resources:
  - A periodic timer to mark clock cycles
  - Two GPIO pins for SDA and SCL lines.

  Each `start_*` call runs the whole transaction before it returns, so
  [`Master::status`] never reports [`Status::BUSY`]. The outcome is kept in the
  status bits and the transfer count until the next transaction starts.

  Note that the current implementation does not support I2C clock stretching.

  ## Hardware requirements

  1. Configure GPIO pins as Open-Drain outputs.
  2. Configure timer frequency to be twice the desired I2C clock frequency.

  ## Example

  Any open-drain pin pair and periodic timer will do; `demos/selftest.rs`
  wires this up on a Blue Pill with PA1/PA2 and TIM3 at 200 kHz.

  ```no_run
    use embedded_hal::blocking::delay::DelayUs;
    use embedded_hal::digital::v2::{InputPin, OutputPin};
    use embedded_hal::timer::{CountDown, Periodic};
    use eeprom_selftest::i2c::I2cBB;
    use eeprom_selftest::{eeprom, Eeprom};

    fn eeprom<SCL, SDA, CLK, D, E>(
        scl: SCL,
        sda: SDA,
        tmr: CLK,
        delay: D,
    ) -> Eeprom<I2cBB<SCL, SDA, CLK>, D>
    where
        SCL: OutputPin<Error = E>,
        SDA: OutputPin<Error = E> + InputPin<Error = E>,
        CLK: CountDown + Periodic,
        D: DelayUs<u32>,
    {
        let i2c = I2cBB::new(scl, sda, tmr);
        Eeprom::new(i2c, delay, eeprom::Config::default())
    }
  ```
*/

use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::timer::{CountDown, Periodic};
use nb::block;

use crate::master::{Master, Status};

/// I2C error
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received for the address byte
    AddressNack,
    /// No ack received for a data byte
    DataNack,
    /// Controller is disabled
    Disabled,
}

/// Bit banging I2C controller
pub struct I2cBB<SCL, SDA, CLK>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    CLK: CountDown + Periodic,
{
    scl: SCL,
    sda: SDA,
    clk: CLK,
    enabled: bool,
    held: bool,
    status: Status,
    count: usize,
}

impl<SCL, SDA, CLK, E> I2cBB<SCL, SDA, CLK>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    CLK: CountDown + Periodic,
{
    /// Create instance, enabled and with the bus idle
    pub fn new(scl: SCL, sda: SDA, clk: CLK) -> Self {
        I2cBB {
            scl,
            sda,
            clk,
            enabled: true,
            held: false,
            status: Status::empty(),
            count: 0,
        }
    }

    /// Release the pins and the timer
    pub fn free(self) -> (SCL, SDA, CLK) {
        (self.scl, self.sda, self.clk)
    }

    /// `true` if the last transaction was left without a STOP
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// `true` unless [`Master::disable`] was called last
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record how a transaction ended and close the bus unless it stays held
    fn finish(&mut self, result: Result<(), Error<E>>, pending: bool) {
        self.status = match result {
            Ok(()) => Status::empty(),
            Err(Error::AddressNack) => Status::ADDR_NAK,
            Err(Error::DataNack) => Status::DATA_NAK,
            Err(_) => {
                error!("i2c: gpio fault mid-transaction");
                Status::BUS_ERR
            }
        };

        let keep = pending && result.is_ok();
        if !keep && self.i2c_stop().is_err() {
            error!("i2c: gpio fault while sending STOP");
            self.status |= Status::BUS_ERR;
        }
        self.held = keep;
    }

    fn write_transaction(&mut self, address: u8, output: &[u8]) -> Result<(), Error<E>> {
        // ST or SR
        self.i2c_start()?;

        // SAD + W
        self.i2c_write_byte((address << 1) | 0x0)?;
        if !self.i2c_is_ack()? {
            return Err(Error::AddressNack);
        }

        for byte in output {
            self.i2c_write_byte(*byte)?;
            if !self.i2c_is_ack()? {
                return Err(Error::DataNack);
            }
            self.count += 1;
        }
        Ok(())
    }

    fn read_transaction(&mut self, address: u8, input: &mut [u8]) -> Result<(), Error<E>> {
        // ST or SR
        self.i2c_start()?;

        // SAD + R
        self.i2c_write_byte((address << 1) | 0x1)?;
        if !self.i2c_is_ack()? {
            return Err(Error::AddressNack);
        }

        let last = input.len().saturating_sub(1);
        for (i, byte) in input.iter_mut().enumerate() {
            *byte = self.i2c_read_byte(i != last)?;
            self.count += 1;
        }
        Ok(())
    }

    fn i2c_start(&mut self) -> Result<(), Error<E>> {
        // SDA first so a held bus sees a repeated START, not a STOP
        self.set_sda_high()?;
        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_sda_low()?;
        self.wait_for_clk();

        self.set_scl_low()?;
        self.wait_for_clk();

        Ok(())
    }

    fn i2c_stop(&mut self) -> Result<(), Error<E>> {
        self.set_sda_low()?;
        self.wait_for_clk();

        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_sda_high()?;
        self.wait_for_clk();

        Ok(())
    }

    fn i2c_is_ack(&mut self) -> Result<bool, Error<E>> {
        self.set_sda_high()?;
        self.set_scl_high()?;
        self.wait_for_clk();

        let ack = self.sda.is_low().map_err(Error::Bus)?;

        self.set_scl_low()?;
        self.set_sda_low()?;
        self.wait_for_clk();

        Ok(ack)
    }

    fn i2c_read_byte(&mut self, should_send_ack: bool) -> Result<u8, Error<E>> {
        let mut byte: u8 = 0;

        self.set_sda_high()?;

        for bit_offset in 0..8 {
            self.set_scl_high()?;
            self.wait_for_clk();

            if self.sda.is_high().map_err(Error::Bus)? {
                byte |= 1 << (7 - bit_offset);
            }

            self.set_scl_low()?;
            self.wait_for_clk();
        }

        if should_send_ack {
            self.set_sda_low()?;
        } else {
            self.set_sda_high()?;
        }

        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_scl_low()?;
        self.set_sda_low()?;
        self.wait_for_clk();

        Ok(byte)
    }

    fn i2c_write_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        for bit_offset in 0..8 {
            let out_bit = (byte >> (7 - bit_offset)) & 0b1;

            if out_bit == 1 {
                self.set_sda_high()?;
            } else {
                self.set_sda_low()?;
            }

            self.set_scl_high()?;
            self.wait_for_clk();

            self.set_scl_low()?;
            self.set_sda_low()?;
            self.wait_for_clk();
        }

        Ok(())
    }

    #[inline]
    fn set_scl_high(&mut self) -> Result<(), Error<E>> {
        self.scl.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_scl_low(&mut self) -> Result<(), Error<E>> {
        self.scl.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn set_sda_high(&mut self) -> Result<(), Error<E>> {
        self.sda.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_sda_low(&mut self) -> Result<(), Error<E>> {
        self.sda.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn wait_for_clk(&mut self) {
        block!(self.clk.wait()).ok();
    }
}

impl<SCL, SDA, CLK, E> Master for I2cBB<SCL, SDA, CLK>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    CLK: CountDown + Periodic,
{
    type Error = Error<E>;

    fn start_write(&mut self, address: u8, data: &[u8], pending: bool) -> Result<(), Self::Error> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        self.count = 0;

        let result = self.write_transaction(address, data);
        self.finish(result, pending);
        Ok(())
    }

    fn start_read(
        &mut self,
        address: u8,
        data: &mut [u8],
        pending: bool,
    ) -> Result<(), Self::Error> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        self.count = 0;

        let result = self.read_transaction(address, data);
        self.finish(result, pending);
        Ok(())
    }

    fn status(&mut self) -> Status {
        self.status
    }

    fn transfer_count(&mut self) -> usize {
        self.count
    }

    fn disable(&mut self) {
        // SCL before SDA, so a held bus sees a STOP; failures have nowhere to go
        self.set_scl_high().ok();
        self.set_sda_high().ok();
        self.enabled = false;
        self.held = false;
        self.status = Status::empty();
        self.count = 0;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }
}
