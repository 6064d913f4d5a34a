//! Simulated AD5933
//!
//! # Design
//! The simulator sits behind the same I2C register interface as the real device. Control writes
//! are decoded into the device state machine: init resets the frequency index, increment advances
//! it, and start/repeat/increment trigger a conversion. A conversion evaluates the admittance of a
//! [Load] at the excitation frequency derived from the programmed codes and scales it to ADC
//! counts. The data valid flag asserts after a configurable number of status polls.
//!
//! Handles are cheap clones sharing one device. One handle is moved into the driver while another
//! can swap the load, e.g. between calibration and measurement.
use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

use ad5933::{code_to_frequency, Addr, Function, ADDRESS};
use arbitrary_int::u24;
use embedded_hal::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation,
};
use serde::{Deserialize, Serialize};

/// Load topology
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Topology {
    #[default]
    Resistor,
    SeriesRc,
    ParallelRc,
    Open,
}

/// Impedance connected between the excitation and receive pins.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Load {
    pub topology: Topology,
    /// Ohm
    pub resistance: f64,
    /// Farad
    pub capacitance: f64,
}

impl Default for Load {
    fn default() -> Self {
        Self::resistor(200e3)
    }
}

impl Load {
    pub fn resistor(resistance: f64) -> Self {
        Self {
            topology: Topology::Resistor,
            resistance,
            capacitance: 0.0,
        }
    }

    pub fn parallel_rc(resistance: f64, capacitance: f64) -> Self {
        Self {
            topology: Topology::ParallelRc,
            resistance,
            capacitance,
        }
    }

    pub fn series_rc(resistance: f64, capacitance: f64) -> Self {
        Self {
            topology: Topology::SeriesRc,
            resistance,
            capacitance,
        }
    }

    pub fn open() -> Self {
        Self {
            topology: Topology::Open,
            resistance: f64::INFINITY,
            capacitance: 0.0,
        }
    }

    /// Complex admittance (conductance, susceptance) in S.
    pub fn admittance(&self, frequency: f64) -> (f64, f64) {
        let wc = 2.0 * PI * frequency * self.capacitance;
        match self.topology {
            Topology::Resistor => (self.resistance.recip(), 0.0),
            Topology::ParallelRc => (self.resistance.recip(), wc),
            Topology::SeriesRc => {
                let x = -wc.recip();
                let den = self.resistance * self.resistance + x * x;
                (self.resistance / den, -x / den)
            }
            Topology::Open => (0.0, 0.0),
        }
    }

    /// Impedance magnitude in Ohm.
    pub fn impedance(&self, frequency: f64) -> f64 {
        let (g, b) = self.admittance(frequency);
        (g * g + b * b).sqrt().recip()
    }
}

/// Gain factor used when no other is given: counts per Siemens is its inverse.
pub const GAIN_FACTOR: f64 = 1.0895e-8;

const FUNCTIONS: [Function; 8] = [
    Function::Nop,
    Function::InitStartFrequency,
    Function::StartSweep,
    Function::IncrementFrequency,
    Function::RepeatFrequency,
    Function::MeasureTemperature,
    Function::PowerDown,
    Function::Standby,
];

fn function(control: u8) -> Option<Function> {
    FUNCTIONS
        .into_iter()
        .find(|f| f.raw_value().value() == control >> 4)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Pending {
    Idle,
    Data,
    Temperature,
}

#[derive(Debug)]
struct Device {
    registers: [u8; 256],
    pointer: u8,
    clock: f64,
    load: Load,
    scale: f64,
    temperature: f32,
    index: u16,
    pending: Pending,
    polls: usize,
    conversion_polls: usize,
    stalled: bool,
    conversions: usize,
    resets: usize,
}

impl Device {
    fn field(&self, addr: Addr, width: usize) -> u32 {
        let start = addr as usize;
        self.registers[start..start + width]
            .iter()
            .fold(0, |v, b| (v << 8) | *b as u32)
    }

    fn frequency(&self) -> f64 {
        let start = self.field(Addr::StartFrequency, 3);
        let increment = self.field(Addr::FrequencyIncrement, 3);
        // 24 bit accumulator
        let code = start
            .wrapping_add((self.index as u32).wrapping_mul(increment));
        code_to_frequency(u24::new(code & u24::MASK), self.clock)
    }

    fn increments(&self) -> u16 {
        self.field(Addr::Increments, 2) as u16 & 0x1ff
    }

    fn convert(&mut self) {
        let (g, b) = self.load.admittance(self.frequency());
        let counts = |x: f64| {
            (x * self.scale).round().clamp(i16::MIN as _, i16::MAX as _) as i16
        };
        let (real, imag) = (counts(g), counts(b));
        let at = Addr::Real as usize;
        self.registers[at..at + 2].copy_from_slice(&real.to_be_bytes());
        let at = Addr::Imaginary as usize;
        self.registers[at..at + 2].copy_from_slice(&imag.to_be_bytes());
        self.pending = Pending::Data;
        self.polls = 0;
        self.conversions += 1;
    }

    fn control(&mut self, value: u8) {
        match function(value) {
            Some(Function::InitStartFrequency) => {
                self.index = 0;
                self.pending = Pending::Idle;
            }
            Some(Function::StartSweep) | Some(Function::RepeatFrequency) => {
                self.convert()
            }
            Some(Function::IncrementFrequency) => {
                self.index = self.index.saturating_add(1);
                self.convert();
            }
            Some(Function::MeasureTemperature) => {
                let code = ((self.temperature * 32.0).round() as i16) & 0x3fff;
                let at = Addr::Temperature as usize;
                self.registers[at..at + 2]
                    .copy_from_slice(&(code as u16).to_be_bytes());
                self.pending = Pending::Temperature;
                self.polls = 0;
            }
            _ => self.pending = Pending::Idle,
        }
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.registers[reg as usize] = value;
        if reg == Addr::Control as u8 {
            self.control(value);
        } else if reg == Addr::ControlLow as u8 && value & 0x10 != 0 {
            self.index = 0;
            self.pending = Pending::Idle;
            self.resets += 1;
        }
    }

    fn status(&mut self) -> u8 {
        let done = !self.stalled && self.polls >= self.conversion_polls;
        self.polls += 1;
        let mut status = 0;
        match self.pending {
            Pending::Data if done => status |= 0x02,
            Pending::Temperature if done => status |= 0x01,
            _ => {}
        }
        if self.index >= self.increments() {
            status |= 0x04;
        }
        status
    }

    fn read(&mut self, reg: u8) -> u8 {
        if reg == Addr::Status as u8 {
            self.status()
        } else {
            self.registers[reg as usize]
        }
    }
}

/// Shared handle to one simulated device.
#[derive(Clone, Debug)]
pub struct Simulator(Rc<RefCell<Device>>);

impl Simulator {
    /// # Args
    /// * `clock` - System clock in Hz
    /// * `load` - Initially connected load
    /// * `gain_factor` - The gain factor a correct calibration arrives at
    pub fn new(clock: f64, load: Load, gain_factor: f64) -> Self {
        Self(Rc::new(RefCell::new(Device {
            registers: [0; 256],
            pointer: 0,
            clock,
            load,
            scale: gain_factor.recip(),
            temperature: 25.0,
            index: 0,
            pending: Pending::Idle,
            polls: 0,
            conversion_polls: 0,
            stalled: false,
            conversions: 0,
            resets: 0,
        })))
    }

    pub fn set_load(&self, load: Load) {
        self.0.borrow_mut().load = load;
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.0.borrow_mut().temperature = celsius;
    }

    /// Status polls before a conversion reports valid.
    pub fn set_conversion_polls(&self, polls: usize) {
        self.0.borrow_mut().conversion_polls = polls;
    }

    /// Never report valid data.
    pub fn set_stalled(&self, stalled: bool) {
        self.0.borrow_mut().stalled = stalled;
    }

    /// Current excitation frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.0.borrow().frequency()
    }

    pub fn conversions(&self) -> usize {
        self.0.borrow().conversions
    }

    pub fn resets(&self) -> usize {
        self.0.borrow().resets
    }
}

impl ErrorType for Simulator {
    type Error = ErrorKind;
}

impl I2c for Simulator {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let mut dev = self.0.borrow_mut();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    if let Some((&reg, values)) = data.split_first() {
                        dev.pointer = reg;
                        for &v in values {
                            let reg = dev.pointer;
                            dev.write(reg, v);
                            dev.pointer = reg.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        let reg = dev.pointer;
                        *b = dev.read(reg);
                        dev.pointer = reg.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}
