//! EEPROM self-test on a Blue Pill
//!
//! - 24xx EEPROM on PA1 (SCL) and PA2 (SDA), bit-banged at 200 kHz ticks
//! - button on PA0 to ground, falling edge on EXTI0 starts a cycle
//! - LED on PC13: 1 blink verified, 2 mismatch, 3 bus failure

#![no_std]
#![no_main]

use panic_halt as _;

use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use stm32f1xx_hal::delay::Delay;
use stm32f1xx_hal::prelude::*;
use stm32f1xx_hal::stm32::{self, interrupt, Interrupt};
use stm32f1xx_hal::timer::Timer;

use eeprom_selftest::i2c::I2cBB;
use eeprom_selftest::selftest::{self, Led, SelfTest, Trigger};
use eeprom_selftest::{eeprom, Eeprom};

const SYSCLK_HZ: u32 = 32_000_000;

static TRIGGER: Trigger = Trigger::new();

/// Busy-wait delay for the LED; SYST is taken by the EEPROM
struct Spin;

impl DelayMs<u32> for Spin {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            cortex_m::asm::delay(SYSCLK_HZ / 1000);
        }
    }
}

#[entry]
fn main() -> ! {
    let pdev = stm32::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut flash = pdev.FLASH.constrain();
    let mut rcc = pdev.RCC.constrain();
    let mut gpioa = pdev.GPIOA.split(&mut rcc.apb2);
    let mut gpioc = pdev.GPIOC.split(&mut rcc.apb2);

    let clocks = rcc
        .cfgr
        .use_hse(8.mhz())
        .sysclk(SYSCLK_HZ.hz())
        .pclk1(16.mhz())
        .freeze(&mut flash.acr);

    let tmr = Timer::tim3(pdev.TIM3, &clocks, &mut rcc.apb1).start_count_down(200.khz());
    let scl = gpioa.pa1.into_open_drain_output(&mut gpioa.crl);
    let sda = gpioa.pa2.into_open_drain_output(&mut gpioa.crl);
    let i2c = I2cBB::new(scl, sda, tmr);

    let delay = Delay::new(cp.SYST, clocks);
    let eeprom: Eeprom<_, _> = Eeprom::new(i2c, delay, eeprom::Config::default());

    let mut pin = gpioc.pc13.into_push_pull_output(&mut gpioc.crh);
    // active low, start dark
    pin.set_high().ok();
    let led = Led::new(pin, Spin);

    // EXTI0 routes to port A after reset
    let _button = gpioa.pa0.into_pull_up_input(&mut gpioa.crl);
    pdev.EXTI.ftsr.modify(|_, w| w.tr0().set_bit());
    pdev.EXTI.imr.modify(|_, w| w.mr0().set_bit());
    unsafe { NVIC::unmask(Interrupt::EXTI0) };

    let mut test = SelfTest::new(eeprom, led, &TRIGGER, selftest::Config::default());

    loop {
        test.poll().ok();
    }
}

#[interrupt]
fn EXTI0() {
    // only this handler touches PR
    unsafe { (*stm32::EXTI::ptr()).pr.write(|w| w.pr0().set_bit()) };
    TRIGGER.signal();
}
