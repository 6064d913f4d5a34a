#[cfg(not(test))]
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Raw real/imaginary DFT result of one conversion
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexSample {
    pub real: i16,
    pub imag: i16,
}

impl ComplexSample {
    /// Decode the two's complement register contents.
    pub fn from_raw(real: u16, imag: u16) -> Self {
        Self {
            real: real as i16,
            imag: imag as i16,
        }
    }

    pub fn to_raw(&self) -> (u16, u16) {
        (self.real as u16, self.imag as u16)
    }

    pub fn magnitude(&self) -> f64 {
        let (re, im) = (self.real as f64, self.imag as f64);
        (re * re + im * im).sqrt()
    }
}

/// A calibrated conversion result
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Impedance magnitude in Ohm, infinite for a zero magnitude sample
    pub impedance: f64,
    pub sample: ComplexSample,
}

/// Gain factor from the magnitude measured on a known reference.
pub fn gain_factor(magnitude: f64, reference: f64) -> Result<f64, Error> {
    if !(reference.is_finite() && reference > 0.0) {
        return Err(Error::Reference);
    }
    if magnitude == 0.0 {
        return Err(Error::InvalidMagnitude);
    }
    Ok((magnitude * reference).recip())
}

/// Impedance magnitude in Ohm.
///
/// An open circuit (zero magnitude) maps to positive infinity.
pub fn impedance(magnitude: f64, gain_factor: f64) -> Result<f64, Error> {
    if gain_factor == 0.0 {
        return Err(Error::NotCalibrated);
    }
    Ok(if magnitude > 0.0 {
        (magnitude * gain_factor).recip()
    } else {
        f64::INFINITY
    })
}
