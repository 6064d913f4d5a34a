//! CSV sweep records
//!
//! One header line, then one row per sweep point. Readers locate the impedance column by its
//! header so that single column records (impedance only) load as well.
use std::io::{BufRead, Write};

use ad5933::Measurement;

use crate::Error;

pub const IMPEDANCE: &str = "Impedance (Ohms)";

pub const HEADER: &str = "Frequency (Hz),Impedance (Ohms),Real,Imag";

pub fn write_sweep<W: Write>(
    mut writer: W,
    sweep: &[Measurement],
) -> Result<(), Error> {
    writeln!(writer, "{HEADER}")?;
    for m in sweep {
        writeln!(
            writer,
            "{},{},{},{}",
            m.frequency,
            m.reading.impedance,
            m.reading.sample.real,
            m.reading.sample.imag
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a single impedance column, e.g. a campaign mean.
pub fn write_impedance<W: Write>(
    mut writer: W,
    impedance: &[f64],
) -> Result<(), Error> {
    writeln!(writer, "{IMPEDANCE}")?;
    for z in impedance {
        writeln!(writer, "{z}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_impedance<R: BufRead>(reader: R) -> Result<Vec<f64>, Error> {
    let mut lines = reader.lines();
    let header = lines.next().ok_or(Error::Record(1, "missing header"))??;
    let column = header
        .split(',')
        .position(|c| c.trim() == IMPEDANCE)
        .ok_or(Error::Record(1, "no impedance column"))?;
    let mut impedance = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let z = line
            .split(',')
            .nth(column)
            .ok_or(Error::Record(i + 2, "missing impedance"))?
            .trim()
            .parse()
            .map_err(|_| Error::Record(i + 2, "invalid impedance"))?;
        impedance.push(z);
    }
    Ok(impedance)
}
