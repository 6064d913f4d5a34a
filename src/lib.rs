//! Host side AD5933 impedance sweeps
//!
//! Campaigns of repeated calibrated sweeps on top of the [ad5933] driver,
//! CSV records of their results and a simulated device to run them
//! against.
pub mod campaign;
pub mod delay;
pub mod record;
pub mod settings;
pub mod sim;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Device: {0}")]
    Device(#[from] ad5933::Error),
    #[error("Settings: {0:?}")]
    Settings(serde_json_core::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Record line {0}: {1}")]
    Record(usize, &'static str),
    #[error("Sequences empty or of unequal length")]
    Length,
}
