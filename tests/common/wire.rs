//! Open-drain SDA/SCL pair with a 24xx EEPROM target listening on it.

use core::cell::RefCell;

use embedded_hal::digital::v2::{InputPin, OutputPin};

/// What happened on the bus, as the target saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    /// Byte clocked in from the controller (address bytes included)
    Write(u8),
    /// Byte sent to the controller
    Read(u8),
}

pub struct Target {
    pub address: u8,
    pub memory: Vec<u8>,
    pub pointer: usize,
    /// Acknowledge only this many data bytes per write
    pub ack_limit: Option<usize>,
}

#[derive(Default)]
struct Frame {
    bit: u8,
    shift: u8,
    index: usize,
    read: bool,
    selected: bool,
    addr_hi: u8,
    out: u8,
    done: bool,
}

pub struct Wire {
    scl: bool,
    sda: bool,
    frame: Option<Frame>,
    pub target: Target,
    pub log: Vec<Event>,
}

impl Wire {
    pub fn new(address: u8, size: usize) -> RefCell<Self> {
        RefCell::new(Wire {
            scl: true,
            sda: true,
            frame: None,
            target: Target {
                address,
                memory: vec![0xFF; size],
                pointer: 0,
                ack_limit: None,
            },
            log: Vec::new(),
        })
    }

    pub fn is_idle(&self) -> bool {
        self.scl && self.sda && self.frame.is_none()
    }

    fn set_scl(&mut self, level: bool) {
        let was = self.scl;
        self.scl = level;
        if !was && level {
            self.on_rise();
        } else if was && !level {
            self.on_fall();
        }
    }

    fn set_sda(&mut self, level: bool) {
        let was = self.sda;
        self.sda = level;
        if self.scl && was != level {
            if level {
                self.frame = None;
                self.log.push(Event::Stop);
            } else {
                self.frame = Some(Frame::default());
                self.log.push(Event::Start);
            }
        }
    }

    fn level(&self) -> bool {
        self.sda && !self.target_pulls_low()
    }

    fn target_pulls_low(&self) -> bool {
        let f = match &self.frame {
            Some(f) => f,
            None => return false,
        };
        let slot = match f.bit.checked_sub(1) {
            Some(slot) => slot,
            None => return false,
        };
        let t = &self.target;

        if f.index == 0 {
            return slot == 8 && (f.shift >> 1) == t.address;
        }
        if !f.selected {
            return false;
        }
        if f.read {
            slot < 8 && !f.done && ((f.out >> (7 - slot)) & 1) == 0
        } else {
            slot == 8 && t.ack_limit.map_or(true, |n| f.index - 1 < n)
        }
    }

    /// Bits are counted on rising edges; `bit` is the slot about to be clocked
    fn on_rise(&mut self) {
        let sda = self.sda;
        if let Some(f) = self.frame.as_mut() {
            if f.bit < 8 && (f.index == 0 || !f.read) {
                f.shift = (f.shift << 1) | sda as u8;
            }
            if f.bit == 8 && f.read && f.index > 0 && sda {
                // controller NACK ends the read
                f.done = true;
            }
            f.bit += 1;
        }
    }

    /// The fall after the ninth clock completes a byte
    fn on_fall(&mut self) {
        let acked = self.target_pulls_low();
        let f = match self.frame.as_mut() {
            Some(f) if f.bit >= 9 => f,
            _ => return,
        };
        f.bit = 0;

        let t = &mut self.target;
        let size = t.memory.len();
        if f.index == 0 {
            f.read = (f.shift & 1) == 1;
            f.selected = (f.shift >> 1) == t.address;
            self.log.push(Event::Write(f.shift));
            if f.selected && f.read {
                f.out = t.memory[t.pointer % size];
            }
        } else if f.read {
            self.log.push(Event::Read(f.out));
            t.pointer = (t.pointer + 1) % size;
            f.out = t.memory[t.pointer];
        } else {
            self.log.push(Event::Write(f.shift));
            if f.selected {
                match f.index {
                    1 => f.addr_hi = f.shift,
                    2 => {
                        t.pointer = usize::from(u16::from_be_bytes([f.addr_hi, f.shift])) % size
                    }
                    _ if acked => {
                        t.memory[t.pointer] = f.shift;
                        t.pointer = (t.pointer + 1) % size;
                    }
                    _ => {}
                }
            }
        }
        f.shift = 0;
        f.index += 1;
    }
}

pub struct Scl<'a>(pub &'a RefCell<Wire>);

pub struct Sda<'a>(pub &'a RefCell<Wire>);

impl OutputPin for Scl<'_> {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().set_scl(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().set_scl(true);
        Ok(())
    }
}

impl OutputPin for Sda<'_> {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().set_sda(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().set_sda(true);
        Ok(())
    }
}

impl InputPin for Sda<'_> {
    type Error = ();

    fn is_high(&self) -> Result<bool, ()> {
        Ok(self.0.borrow().level())
    }

    fn is_low(&self) -> Result<bool, ()> {
        Ok(!self.0.borrow().level())
    }
}
