//! Run an impedance sweep campaign against the simulated AD5933
//!
//! Usage: `impedance-sweep [SETTINGS.json] [OUTPUT_DIR]`
//!
//! Writes one `sweep_<n>.csv` per sweep and the mean impedance to
//! `base.csv` in the output directory (default: current directory).
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use ad5933::Ad5933;
use anyhow::Context;
use impedance_sweep::{
    campaign::Campaign,
    delay::SleepDelay,
    record,
    settings::Settings,
    sim::{Load, Simulator, GAIN_FACTOR},
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("reading {path}"))?;
            Settings::from_json(&json)
                .with_context(|| format!("parsing {path}"))?
        }
        None => Settings::default(),
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| ".".into()));
    fs::create_dir_all(&output)?;
    log::debug!("{settings:?}");

    let sim = Simulator::new(settings.clock, settings.load, GAIN_FACTOR);
    let device = Ad5933::new(sim.clone(), SleepDelay::new(settings.time_scale))
        .with_timing(settings.timing);
    let mut campaign = Campaign::new(device, &settings)?;

    log::info!(
        "Die temperature {:.1} C",
        campaign.device().temperature()?
    );

    if let Some(reference) = settings.reference {
        sim.set_load(Load::resistor(reference));
        campaign
            .calibrate(reference)
            .context("calibration failed")?;
        sim.set_load(settings.load);
    }

    let report = campaign.run()?;
    for (i, sweep) in report.sweeps.iter().enumerate() {
        let path = output.join(format!("sweep_{}.csv", i + 1));
        record::write_sweep(BufWriter::new(File::create(&path)?), sweep)?;
        log::info!("Wrote {}", path.display());
    }
    let path = output.join("base.csv");
    let file = BufWriter::new(File::create(&path)?);
    record::write_impedance(file, &report.mean)?;
    log::info!(
        "Wrote {} ({} points, gain factor {:.6e})",
        path.display(),
        report.mean.len(),
        report.gain_factor
    );

    campaign.device().power_down()?;
    Ok(())
}
