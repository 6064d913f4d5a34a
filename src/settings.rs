//! Sweep campaign settings
//!
//! # Design
//! Settings are read once at startup from a JSON document. Every entry is optional: missing
//! entries take the defaults below, which reproduce a 200 point sweep from 30 kHz in 20 Hz steps,
//! repeated five times, at the 2 Vpp range with unity PGA gain.
//!
//! Calibration is performed when `reference` (Ohm) is given. Otherwise `gain_factor` from an
//! earlier calibration is used.
use ad5933::{Gain, Range, SweepParameters, Timing, INTERNAL_CLOCK};
use serde::{Deserialize, Serialize};

use crate::sim::{Load, GAIN_FACTOR};
use crate::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// System clock in Hz
    pub clock: f64,
    pub range: Range,
    pub gain: Gain,
    /// Start frequency in Hz
    pub start: f64,
    /// Frequency increment in Hz
    pub increment: f64,
    pub points: u16,
    /// Number of sweeps in the campaign
    pub sweeps: u32,
    /// Calibration resistance in Ohm
    pub reference: Option<f64>,
    /// Preset gain factor
    pub gain_factor: Option<f64>,
    pub timing: Timing,
    /// Load connected to the simulated device
    pub load: Load,
    /// Real time factor for settle and poll delays
    pub time_scale: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clock: INTERNAL_CLOCK,
            range: Range::Vpp2000,
            gain: Gain::X1,
            start: 30e3,
            increment: 20.0,
            points: 200,
            sweeps: 5,
            reference: None,
            gain_factor: Some(GAIN_FACTOR),
            timing: Timing::default(),
            load: Load::parallel_rc(3.865e3, 1.25e-9),
            time_scale: 1.0,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let (settings, _) =
            serde_json_core::from_str(json).map_err(Error::Settings)?;
        Ok(settings)
    }

    pub fn parameters(&self) -> Result<SweepParameters, ad5933::Error> {
        SweepParameters::new(self.start, self.increment, self.points, self.clock)
    }
}
