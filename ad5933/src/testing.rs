use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use super::{Addr, ADDRESS};

/// Register file behind a pointer-addressed I2C bus.
pub struct Registers {
    pub map: [u8; 256],
    pointer: u8,
    /// Every (register, value) write in bus order
    pub writes: Vec<(u8, u8)>,
    /// Every register read in bus order
    pub reads: Vec<u8>,
    /// Status polls since the last control write
    polls: usize,
    /// Data and temperature become valid after this many status polls
    pub ready_after: Option<usize>,
    /// Fail the n-th (one based) transaction
    pub fail_at: Option<usize>,
    transactions: usize,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            map: [0; 256],
            pointer: 0,
            writes: Vec::new(),
            reads: Vec::new(),
            polls: 0,
            ready_after: Some(0),
            fail_at: None,
            transactions: 0,
        }
    }

    pub fn set_sample(&mut self, real: i16, imag: i16) {
        let real = real.to_be_bytes();
        let imag = imag.to_be_bytes();
        self.map[Addr::Real as usize..][..2].copy_from_slice(&real);
        self.map[Addr::Imaginary as usize..][..2].copy_from_slice(&imag);
    }

    /// Values written to the control high byte, in order
    pub fn controls(&self) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(reg, _)| *reg == Addr::Control as u8)
            .map(|(_, v)| *v)
            .collect()
    }

    fn store(&mut self, reg: u8, value: u8) {
        self.writes.push((reg, value));
        self.map[reg as usize] = value;
        if reg == Addr::Control as u8 {
            self.polls = 0;
        }
    }

    fn load(&mut self, reg: u8) -> u8 {
        self.reads.push(reg);
        if reg != Addr::Status as u8 {
            return self.map[reg as usize];
        }
        let polls = self.polls;
        self.polls += 1;
        match self.ready_after {
            Some(n) if polls >= n => 0x03,
            _ => 0x00,
        }
    }
}

impl ErrorType for Registers {
    type Error = ErrorKind;
}

impl I2c for Registers {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        assert_eq!(address, ADDRESS);
        self.transactions += 1;
        if self.fail_at == Some(self.transactions) {
            return Err(ErrorKind::Other);
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    if let Some((&reg, values)) = data.split_first() {
                        self.pointer = reg;
                        for &v in values {
                            self.store(self.pointer, v);
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.load(self.pointer);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Records requested delays in ms instead of sleeping.
#[derive(Default, Debug)]
pub struct Delays(pub Vec<u32>);

impl Delays {
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl DelayNs for Delays {
    fn delay_ns(&mut self, ns: u32) {
        self.0.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.push(ms);
    }
}
