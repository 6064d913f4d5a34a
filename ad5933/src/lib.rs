#![cfg_attr(not(test), no_std)]

//! AD5933 impedance converter driver
//!
//! The device is driven over I2C through single byte register accesses.
//! A sweep walks the excitation from a start frequency in fixed increments
//! and produces one calibrated impedance reading per point. The gain factor
//! has to be determined once against a known reference impedance (see
//! [`Ad5933::calibrate`]) before readings are meaningful.

extern crate alloc;

use alloc::vec::Vec;
use arbitrary_int::u14;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c};
use serde::{Deserialize, Serialize};

mod register;
pub use register::*;
mod sample;
pub use sample::*;
mod sweep;
pub use sweep::*;

#[cfg(test)]
mod testing;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("I2C: {0}")]
    Bus(i2c::ErrorKind),
    #[error("Data not ready")]
    Timeout,
    #[error("Invalid magnitude for calibration")]
    InvalidMagnitude,
    #[error("Gain factor not set")]
    NotCalibrated,
    #[error("Sweep not configured")]
    NotConfigured,
    #[error("Frequency code out of range")]
    Frequency,
    #[error("Invalid number of points {0}")]
    Points(u16),
    #[error("Invalid reference impedance")]
    Reference,
    #[error("Field value exceeds width")]
    Field,
}

impl<E: i2c::Error> From<E> for Error {
    fn from(value: E) -> Self {
        Self::Bus(value.kind())
    }
}

// Empirical settle times in ms. None of these is observable through status.
pub const STANDBY_SETTLE_MS: u32 = 10;
pub const RESET_SETTLE_MS: u32 = 10;
pub const INIT_SETTLE_MS: u32 = 50;
pub const START_SETTLE_MS: u32 = 100;
pub const INCREMENT_SETTLE_MS: u32 = 50;
pub const POLL_INTERVAL_MS: u32 = 10;
pub const READY_TIMEOUT_MS: u32 = 1000;

/// Blocking delays in ms
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// After range/gain programming
    pub standby: u32,
    /// After reset
    pub reset: u32,
    /// After initializing with the start frequency
    pub init: u32,
    /// After starting the sweep, before the first conversion
    pub start: u32,
    /// After each frequency increment
    pub increment: u32,
    /// Between status polls
    pub poll_interval: u32,
    /// Maximum wait for a valid conversion
    pub ready_timeout: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            standby: STANDBY_SETTLE_MS,
            reset: RESET_SETTLE_MS,
            init: INIT_SETTLE_MS,
            start: START_SETTLE_MS,
            increment: INCREMENT_SETTLE_MS,
            poll_interval: POLL_INTERVAL_MS,
            ready_timeout: READY_TIMEOUT_MS,
        }
    }
}

/// Output range, PGA gain and gain factor currently in effect.
///
/// A zero gain factor means uncalibrated.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DeviceState {
    pub range: Range,
    pub gain: Gain,
    pub gain_factor: f64,
}

pub struct Ad5933<I, D> {
    i2c: I,
    delay: D,
    timing: Timing,
    state: DeviceState,
    parameters: Option<SweepParameters>,
    sweep_state: SweepState,
}

impl<I: I2c, D: DelayNs> Ad5933<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            timing: Timing::default(),
            state: DeviceState::default(),
            parameters: None,
            sweep_state: SweepState::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Give back the bus and the delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn sweep_state(&self) -> SweepState {
        self.sweep_state
    }

    pub fn parameters(&self) -> Option<&SweepParameters> {
        self.parameters.as_ref()
    }

    /// Preset the gain factor, e.g. from an earlier calibration.
    pub fn set_gain_factor(&mut self, gain_factor: f64) {
        self.state.gain_factor = gain_factor;
    }

    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Error> {
        Ok(self.i2c.write(ADDRESS, &[addr, value])?)
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u8, Error> {
        let mut data = [0];
        self.i2c.write_read(ADDRESS, &[addr], &mut data)?;
        Ok(data[0])
    }

    /// Write a big endian field of `width` registers starting at `addr`.
    ///
    /// The least significant byte (highest address) goes out first. A width
    /// outside `1..=3` or a value that does not fit is [`Error::Field`].
    pub fn write_field(
        &mut self,
        addr: Addr,
        value: u32,
        width: u8,
    ) -> Result<(), Error> {
        if !(1..=3).contains(&width) || value >> (8 * width) != 0 {
            return Err(Error::Field);
        }
        for i in (0..width).rev() {
            let byte = (value >> (8 * (width - 1 - i))) as u8;
            self.write_register(addr.offset(i), byte)?;
        }
        Ok(())
    }

    /// Read a big endian field of `width` registers starting at `addr`.
    pub fn read_field(&mut self, addr: Addr, width: u8) -> Result<u32, Error> {
        if !(1..=3).contains(&width) {
            return Err(Error::Field);
        }
        let mut value = 0;
        for i in 0..width {
            value = (value << 8) | self.read_register(addr.offset(i))? as u32;
        }
        Ok(value)
    }

    fn control(&mut self, function: Function) -> Result<(), Error> {
        let DeviceState { range, gain, .. } = self.state;
        self.write_register(
            Addr::Control as u8,
            control_byte(function, range, gain),
        )
    }

    pub fn status(&mut self) -> Result<Status, Error> {
        Ok(Status::new_with_raw_value(
            self.read_register(Addr::Status as u8)?,
        ))
    }

    /// Program output range and PGA gain, leaving the device in standby.
    pub fn set_range_and_gain(
        &mut self,
        range: Range,
        gain: Gain,
    ) -> Result<(), Error> {
        self.state.range = range;
        self.state.gain = gain;
        self.control(Function::Standby)?;
        self.write_register(
            Addr::ControlLow as u8,
            ControlLow::default()
                .with_external_clock(false)
                .with_pga_x1(gain.bit())
                .raw_value(),
        )?;
        self.transition(SweepState::Standby);
        self.delay.delay_ms(self.timing.standby);
        log::debug!("Range {range:?}, gain {gain:?}");
        Ok(())
    }

    /// Write start/increment codes, point count and settling cycles.
    pub fn configure(
        &mut self,
        parameters: SweepParameters,
    ) -> Result<(), Error> {
        self.write_field(
            Addr::StartFrequency,
            parameters.start_code().value(),
            3,
        )?;
        self.write_field(
            Addr::FrequencyIncrement,
            parameters.increment_code().value(),
            3,
        )?;
        self.write_field(Addr::Increments, parameters.points() as _, 2)?;
        self.write_field(Addr::SettlingCycles, SETTLING_CYCLES as _, 2)?;
        self.parameters = Some(parameters);
        log::debug!(
            "Sweep {} Hz + n * {} Hz, {} points",
            parameters.start(),
            parameters.increment(),
            parameters.points()
        );
        Ok(())
    }

    fn transition(&mut self, state: SweepState) {
        log::debug!("{:?} -> {:?}", self.sweep_state, state);
        self.sweep_state = state;
    }

    /// Latch the current range and gain.
    pub fn standby(&mut self) -> Result<(), Error> {
        self.control(Function::Standby)?;
        self.transition(SweepState::Standby);
        Ok(())
    }

    /// Reset the device state machine, selecting the internal clock.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.write_register(
            Addr::ControlLow as u8,
            ControlLow::default()
                .with_reset(true)
                .with_external_clock(false)
                .raw_value(),
        )?;
        self.transition(SweepState::Reset);
        self.delay.delay_ms(self.timing.reset);
        Ok(())
    }

    /// Excite at the start frequency.
    pub fn init_start_frequency(&mut self) -> Result<(), Error> {
        self.control(Function::InitStartFrequency)?;
        self.transition(SweepState::InitStartFrequency);
        self.delay.delay_ms(self.timing.init);
        Ok(())
    }

    /// Start converting at the first sweep point.
    pub fn start(&mut self) -> Result<(), Error> {
        self.control(Function::StartSweep)?;
        self.transition(SweepState::Sweeping(0));
        self.delay.delay_ms(self.timing.start);
        Ok(())
    }

    /// Full standby, reset, init and start sequence.
    ///
    /// Required before every sweep: the frequency stepping of a previous
    /// sweep can not be replayed.
    pub fn start_sweep(&mut self) -> Result<(), Error> {
        self.standby()?;
        self.reset()?;
        self.init_start_frequency()?;
        self.start()
    }

    /// Step to the next sweep point.
    pub fn increment(&mut self) -> Result<(), Error> {
        self.control(Function::IncrementFrequency)?;
        let next = match self.sweep_state {
            SweepState::Sweeping(i) => match self.parameters {
                Some(p) if i + 1 >= p.points() => SweepState::Done,
                _ => SweepState::Sweeping(i + 1),
            },
            s => s,
        };
        self.transition(next);
        self.delay.delay_ms(self.timing.increment);
        Ok(())
    }

    pub fn power_down(&mut self) -> Result<(), Error> {
        self.control(Function::PowerDown)?;
        self.transition(SweepState::PowerDown);
        Ok(())
    }

    fn poll(
        &mut self,
        timeout: u32,
        ready: fn(&Status) -> bool,
    ) -> Result<bool, Error> {
        let interval = self.timing.poll_interval.max(1);
        let mut elapsed = 0u32;
        loop {
            if ready(&self.status()?) {
                return Ok(true);
            }
            if elapsed >= timeout {
                return Ok(false);
            }
            self.delay.delay_ms(interval);
            elapsed = elapsed.saturating_add(interval);
        }
    }

    /// Poll the data valid flag for up to `timeout` ms.
    ///
    /// Status is read once more after the last interval.
    pub fn wait_ready(&mut self, timeout: u32) -> Result<bool, Error> {
        self.poll(timeout, |s| s.data_valid())
    }

    /// Read the last conversion.
    ///
    /// Only meaningful after [`Self::wait_ready`] returned `true`.
    pub fn read_complex(&mut self) -> Result<ComplexSample, Error> {
        let real = self.read_field(Addr::Real, 2)?;
        let imag = self.read_field(Addr::Imaginary, 2)?;
        Ok(ComplexSample::from_raw(real as _, imag as _))
    }

    fn sample(&mut self) -> Result<ComplexSample, Error> {
        if !self.wait_ready(self.timing.ready_timeout)? {
            log::warn!("No valid data after {} ms", self.timing.ready_timeout);
            return Err(Error::Timeout);
        }
        self.read_complex()
    }

    /// Convert once more at the current frequency.
    pub fn measure(&mut self) -> Result<Reading, Error> {
        self.control(Function::RepeatFrequency)?;
        let sample = self.sample()?;
        Ok(Reading {
            impedance: impedance(sample.magnitude(), self.state.gain_factor)?,
            sample,
        })
    }

    /// Determine the gain factor with `reference` Ohm connected.
    ///
    /// The gain factor is left untouched on error.
    pub fn calibrate(&mut self, reference: f64) -> Result<f64, Error> {
        self.control(Function::RepeatFrequency)?;
        let sample = self.sample()?;
        let magnitude = sample.magnitude();
        let gain_factor = gain_factor(magnitude, reference)?;
        self.state.gain_factor = gain_factor;
        log::info!(
            "Calibrated: |Z| = {magnitude:.2}, real = {}, imag = {}, gain factor = {gain_factor:.6e}",
            sample.real,
            sample.imag,
        );
        Ok(gain_factor)
    }

    /// Run the configured sweep from reset to the last point.
    ///
    /// On error the device is left mid sweep. The next sweep resets it.
    pub fn sweep(&mut self) -> Result<Vec<Measurement>, Error> {
        let parameters = self.parameters.ok_or(Error::NotConfigured)?;
        if self.state.gain_factor == 0.0 {
            return Err(Error::NotCalibrated);
        }
        self.start_sweep()?;
        let mut measurements = Vec::with_capacity(parameters.points() as _);
        for index in 0..parameters.points() {
            let reading = self.measure()?;
            let frequency = parameters.frequency(index);
            log::trace!(
                "Point {}: Z = {:.2} Ohm @ {frequency} Hz",
                index + 1,
                reading.impedance
            );
            measurements.push(Measurement { frequency, reading });
            self.increment()?;
        }
        log::info!("Sweep done: {} points", measurements.len());
        Ok(measurements)
    }

    /// Die temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32, Error> {
        self.control(Function::MeasureTemperature)?;
        if !self.poll(self.timing.ready_timeout, |s| s.temperature_valid())? {
            return Err(Error::Timeout);
        }
        let code = u14::new(
            (self.read_field(Addr::Temperature, 2)? as u16) & u14::MASK,
        );
        // sign extend from 14 bits
        let code = ((code.value() << 2) as i16) >> 2;
        Ok(code as f32 / 32.0)
    }
}
