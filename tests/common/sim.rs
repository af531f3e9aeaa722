//! Simulated I2C controller with a 24xx-style EEPROM behind it.

use eeprom_selftest::{Master, Status};

pub const MEMORY_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    Refused,
    Disabled,
}

/// Controller model with knobs for every failure the transfer layer handles
pub struct SimEeprom {
    pub memory: Vec<u8>,
    pointer: usize,
    enabled: bool,

    /// `start_*` fails
    pub refuse_start: bool,
    /// Every transaction stays busy for this many status polls
    pub busy_polls: u32,
    /// Transactions never finish until the controller is reset
    pub stuck: bool,
    /// Error bits reported for writes carrying payload
    pub write_status: Status,
    /// Error bits reported for address-only writes
    pub reposition_status: Status,
    /// Error bits reported for reads
    pub read_status: Status,
    /// Bytes missing from the reported count of every read
    pub read_shortfall: usize,
    /// Byte forced into the read data at an offset
    pub corrupt: Option<(usize, u8)>,

    pub writes: Vec<(Vec<u8>, bool)>,
    pub reads: Vec<(usize, bool)>,
    pub polls: u32,
    pub disables: u32,
    pub enables: u32,

    busy_left: u32,
    in_flight: bool,
    status: Status,
    count: usize,
}

impl Default for SimEeprom {
    fn default() -> Self {
        SimEeprom {
            memory: vec![0xFF; MEMORY_SIZE],
            pointer: 0,
            enabled: true,
            refuse_start: false,
            busy_polls: 0,
            stuck: false,
            write_status: Status::empty(),
            reposition_status: Status::empty(),
            read_status: Status::empty(),
            read_shortfall: 0,
            corrupt: None,
            writes: Vec::new(),
            reads: Vec::new(),
            polls: 0,
            disables: 0,
            enables: 0,
            busy_left: 0,
            in_flight: false,
            status: Status::empty(),
            count: 0,
        }
    }
}

impl SimEeprom {
    pub fn new() -> Self {
        SimEeprom::default()
    }

    fn begin(&mut self) -> Result<(), SimError> {
        if !self.enabled {
            return Err(SimError::Disabled);
        }
        if self.refuse_start {
            return Err(SimError::Refused);
        }
        self.busy_left = self.busy_polls;
        self.in_flight = true;
        Ok(())
    }
}

impl Master for SimEeprom {
    type Error = SimError;

    fn start_write(&mut self, _: u8, data: &[u8], pending: bool) -> Result<(), SimError> {
        self.begin()?;
        self.writes.push((data.to_vec(), pending));

        let status = if data.len() > 2 {
            self.write_status
        } else {
            self.reposition_status
        };
        self.status = status;
        if status.has_error() {
            self.count = 0;
            return Ok(());
        }

        if data.len() >= 2 {
            self.pointer = usize::from(u16::from_be_bytes([data[0], data[1]])) % MEMORY_SIZE;
        }
        for byte in data.iter().skip(2) {
            self.memory[self.pointer] = *byte;
            self.pointer = (self.pointer + 1) % MEMORY_SIZE;
        }
        self.count = data.len();
        Ok(())
    }

    fn start_read(&mut self, _: u8, data: &mut [u8], pending: bool) -> Result<(), SimError> {
        self.begin()?;
        self.reads.push((data.len(), pending));

        self.status = self.read_status;
        for byte in data.iter_mut() {
            *byte = self.memory[self.pointer];
            self.pointer = (self.pointer + 1) % MEMORY_SIZE;
        }
        if let Some((index, value)) = self.corrupt {
            if let Some(byte) = data.get_mut(index) {
                *byte = value;
            }
        }
        self.count = data.len().saturating_sub(self.read_shortfall);
        Ok(())
    }

    fn status(&mut self) -> Status {
        self.polls += 1;
        if self.in_flight && (self.stuck || self.busy_left > 0) {
            self.busy_left = self.busy_left.saturating_sub(1);
            return self.status | Status::BUSY;
        }
        self.in_flight = false;
        self.status
    }

    fn transfer_count(&mut self) -> usize {
        self.count
    }

    fn disable(&mut self) {
        self.disables += 1;
        self.enabled = false;
        self.in_flight = false;
        self.status = Status::empty();
        self.count = 0;
    }

    fn enable(&mut self) {
        self.enables += 1;
        self.enabled = true;
    }
}
