use arbitrary_int::u24;
use serde::{Deserialize, Serialize};

use crate::{Error, Reading};

/// Internal system clock in Hz
pub const INTERNAL_CLOCK: f64 = 16e6;

/// The increment counter is 9 bits wide.
pub const MAX_POINTS: u16 = 511;

/// Frequency code: `frequency * 4 / clock * 2**27`, truncated.
///
/// No aliasing or clamping: codes outside 24 bits are rejected.
pub fn frequency_to_code(frequency: f64, clock: f64) -> Result<u24, Error> {
    let code = frequency * 4.0 / clock * (1u32 << 27) as f64;
    if !(code >= 0.0 && code <= u24::MASK as f64) {
        return Err(Error::Frequency);
    }
    Ok(u24::new(code as u32))
}

pub fn code_to_frequency(code: u24, clock: f64) -> f64 {
    code.value() as f64 * clock / 4.0 / (1u32 << 27) as f64
}

/// Validated sweep description with precomputed register codes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SweepParameters {
    start: f64,
    increment: f64,
    points: u16,
    start_code: u24,
    increment_code: u24,
}

impl SweepParameters {
    /// # Args
    /// * `start` - First frequency in Hz
    /// * `increment` - Frequency step in Hz
    /// * `points` - Number of sweep points, `1..=MAX_POINTS`
    /// * `clock` - System clock in Hz
    pub fn new(
        start: f64,
        increment: f64,
        points: u16,
        clock: f64,
    ) -> Result<Self, Error> {
        if !(1..=MAX_POINTS).contains(&points) {
            return Err(Error::Points(points));
        }
        Ok(Self {
            start,
            increment,
            points,
            start_code: frequency_to_code(start, clock)?,
            increment_code: frequency_to_code(increment, clock)?,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn points(&self) -> u16 {
        self.points
    }

    pub fn start_code(&self) -> u24 {
        self.start_code
    }

    pub fn increment_code(&self) -> u24 {
        self.increment_code
    }

    /// Nominal frequency of sweep point `index`.
    pub fn frequency(&self, index: u16) -> f64 {
        self.start + index as f64 * self.increment
    }
}

/// Sweep controller state
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SweepState {
    #[default]
    Standby,
    Reset,
    InitStartFrequency,
    /// Excitation at the given point, awaiting or holding its conversion
    Sweeping(u16),
    Done,
    PowerDown,
}

/// A reading tagged with the nominal frequency it was taken at.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub frequency: f64,
    pub reading: Reading,
}
