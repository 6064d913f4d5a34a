//! Basic blocking delay
//!
//! This module provides a blocking delay that sleeps the calling thread.
use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// A thread sleep delay.
///
/// Optionally scaled, e.g. to run simulated sweeps faster than real time.
#[derive(Copy, Clone, Debug)]
pub struct SleepDelay {
    scale: f32,
}

impl Default for SleepDelay {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl SleepDelay {
    /// Create a new delay.
    ///
    /// # Args
    /// * `scale` - Factor applied to every requested delay.
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        let ns = (ns as f32 * self.scale) as u64;
        if ns > 0 {
            std::thread::sleep(Duration::from_nanos(ns));
        }
    }
}
