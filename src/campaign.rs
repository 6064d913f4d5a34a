//! Sweep campaigns
//!
//! # Design
//! A campaign programs range, gain and the sweep parameters once, optionally calibrates against a
//! reference resistor and then runs a number of independent sweeps. Every sweep goes through the
//! full reset sequence. The impedance of all sweeps is averaged point by point.
use ad5933::{Ad5933, Measurement, SweepParameters};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::settings::Settings;
use crate::Error;

/// Results of a campaign
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Gain factor all sweeps were computed with
    pub gain_factor: f64,
    pub sweeps: Vec<Vec<Measurement>>,
    /// Point by point mean impedance over all sweeps
    pub mean: Vec<f64>,
}

impl Report {
    /// Frequencies of the sweep points in Hz.
    pub fn frequencies(&self) -> Vec<f64> {
        self.sweeps
            .first()
            .map(|s| s.iter().map(|m| m.frequency).collect())
            .unwrap_or_default()
    }
}

pub struct Campaign<I, D> {
    device: Ad5933<I, D>,
    parameters: SweepParameters,
    sweeps: u32,
}

impl<I: I2c, D: DelayNs> Campaign<I, D> {
    /// Program range, gain and sweep parameters.
    ///
    /// A preset gain factor from the settings is applied. Calibration with
    /// [`Self::calibrate`] replaces it.
    pub fn new(
        mut device: Ad5933<I, D>,
        settings: &Settings,
    ) -> Result<Self, Error> {
        let parameters = settings.parameters()?;
        device.set_range_and_gain(settings.range, settings.gain)?;
        device.configure(parameters)?;
        if let Some(gain_factor) = settings.gain_factor {
            device.set_gain_factor(gain_factor);
        }
        Ok(Self {
            device,
            parameters,
            sweeps: settings.sweeps,
        })
    }

    pub fn parameters(&self) -> &SweepParameters {
        &self.parameters
    }

    pub fn device(&mut self) -> &mut Ad5933<I, D> {
        &mut self.device
    }

    pub fn release(self) -> Ad5933<I, D> {
        self.device
    }

    /// Calibrate at the start frequency with `reference` Ohm connected.
    pub fn calibrate(&mut self, reference: f64) -> Result<f64, Error> {
        self.device.start_sweep()?;
        Ok(self.device.calibrate(reference)?)
    }

    /// Run all sweeps and average them.
    ///
    /// The first failing sweep aborts the campaign.
    pub fn run(&mut self) -> Result<Report, Error> {
        let mut sweeps = Vec::with_capacity(self.sweeps as _);
        for i in 0..self.sweeps {
            log::info!("Sweep {}/{}", i + 1, self.sweeps);
            sweeps.push(self.device.sweep()?);
        }
        let mean = if sweeps.is_empty() {
            Vec::new()
        } else {
            let z: Vec<_> = sweeps.iter().map(|s| impedances(s)).collect();
            average(&z)?
        };
        Ok(Report {
            gain_factor: self.device.state().gain_factor,
            sweeps,
            mean,
        })
    }
}

pub fn impedances(sweep: &[Measurement]) -> Vec<f64> {
    sweep.iter().map(|m| m.reading.impedance).collect()
}

/// Element-wise mean of equally long sequences.
pub fn average(sequences: &[Vec<f64>]) -> Result<Vec<f64>, Error> {
    let (first, rest) = sequences.split_first().ok_or(Error::Length)?;
    if rest.iter().any(|s| s.len() != first.len()) {
        return Err(Error::Length);
    }
    let n = sequences.len() as f64;
    Ok((0..first.len())
        .map(|i| sequences.iter().map(|s| s[i]).sum::<f64>() / n)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad5933::{ComplexSample, Reading};

    #[test]
    fn mean() {
        let z = average(&[vec![1.0, 2.0, 3.0], vec![3.0, 4.0, 5.0]]).unwrap();
        assert_eq!(z, vec![2.0, 3.0, 4.0]);
        assert_eq!(average(&[vec![7.5]]).unwrap(), vec![7.5]);
        assert_eq!(average(&[vec![], vec![]]).unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn mean_open_circuit() {
        let z = average(&[vec![1e3, f64::INFINITY], vec![3e3, 1e6]]).unwrap();
        assert_eq!(z, vec![2e3, f64::INFINITY]);
    }

    #[test]
    fn unequal() {
        assert!(matches!(average(&[]), Err(Error::Length)));
        assert!(matches!(
            average(&[vec![1.0, 2.0], vec![1.0]]),
            Err(Error::Length)
        ));
    }

    #[test]
    fn impedance_column() {
        let sweep: Vec<_> = [4e3, 3.9e3]
            .into_iter()
            .enumerate()
            .map(|(i, impedance)| Measurement {
                frequency: 30e3 + 20.0 * i as f64,
                reading: Reading {
                    impedance,
                    sample: ComplexSample::default(),
                },
            })
            .collect();
        assert_eq!(impedances(&sweep), vec![4e3, 3.9e3]);
        let report = Report {
            gain_factor: 1e-8,
            sweeps: vec![sweep],
            mean: vec![4e3, 3.9e3],
        };
        assert_eq!(report.frequencies(), vec![30e3, 30.02e3]);
    }
}
