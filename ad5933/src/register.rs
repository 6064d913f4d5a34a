use bitbybit::{bitenum, bitfield};
use serde::{Deserialize, Serialize};

/// Fixed 7-bit I2C address
pub const ADDRESS: u8 = 0x0D;

/// Settling time cycles written with every sweep configuration
pub const SETTLING_CYCLES: u16 = 15;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Addr {
    Control = 0x80,
    ControlLow = 0x81,
    StartFrequency = 0x82,
    FrequencyIncrement = 0x85,
    Increments = 0x88,
    SettlingCycles = 0x8a,
    Status = 0x8f,
    Temperature = 0x92,
    Real = 0x94,
    Imaginary = 0x96,
}

impl Addr {
    /// Register address of byte `offset` of a multi-byte field.
    pub fn offset(self, offset: u8) -> u8 {
        self as u8 + offset
    }
}

#[bitenum(u4, exhaustive = false)]
#[derive(Debug, PartialEq)]
pub enum Function {
    Nop = 0x0,
    InitStartFrequency = 0x1,
    StartSweep = 0x2,
    IncrementFrequency = 0x3,
    RepeatFrequency = 0x4,
    MeasureTemperature = 0x9,
    PowerDown = 0xa,
    Standby = 0xb,
}

/// Peak-to-peak excitation voltage
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum Range {
    #[default]
    Vpp2000 = 0,
    Vpp200 = 1,
    Vpp400 = 2,
    Vpp1000 = 3,
}

/// Receive stage PGA gain
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gain {
    #[default]
    X1,
    X5,
}

impl Gain {
    /// The PGA select bit is set for unity gain.
    pub fn bit(self) -> bool {
        self == Self::X1
    }
}

#[bitfield(u8, default = 0x00)]
#[derive(Debug, PartialEq)]
pub struct Control {
    #[bit(0, rw)]
    pub pga_x1: bool,
    #[bits(1..=2, rw)]
    pub range: Range,
    #[bits(4..=7, rw)]
    pub function: Option<Function>,
}

#[bitfield(u8, default = 0x00)]
#[derive(Debug, PartialEq)]
pub struct ControlLow {
    #[bit(0, rw)]
    pub pga_x1: bool,
    #[bit(3, rw)]
    pub external_clock: bool,
    #[bit(4, rw)]
    pub reset: bool,
}

#[bitfield(u8)]
#[derive(Debug, PartialEq)]
pub struct Status {
    #[bit(0, r)]
    pub temperature_valid: bool,
    #[bit(1, r)]
    pub data_valid: bool,
    #[bit(2, r)]
    pub sweep_complete: bool,
}

/// Pack function, range and gain into the control high byte.
pub fn control_byte(function: Function, range: Range, gain: Gain) -> u8 {
    Control::default()
        .with_function(function)
        .with_range(range)
        .with_pga_x1(gain.bit())
        .raw_value()
}
