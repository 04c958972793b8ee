use std::sync::Arc;

use num_complex::Complex32;
use parking_lot::Mutex;

use crate::models::error::SourceError;
use crate::models::range::{FreqRange, GainRange, MetaRange};

/// Shared handle to a constructed device.
///
/// The host keeps its own clones; the aggregate source only routes calls
/// through the ones it was built with.
pub type DeviceHandle = Arc<Mutex<Box<dyn SourceDevice>>>;

/// Capability interface every receive device implements.
///
/// All channel arguments are *local* to the device (`0..num_channels()`).
/// Setters return the value the hardware actually applied, which may differ
/// from the request after quantization. Getters report the device's current
/// value and never fail; drivers are expected to keep what they last applied.
pub trait SourceDevice: Send {
    /// Human readable identification for logs, e.g. `"sim #0 (2 ch)"`.
    fn name(&self) -> String;

    fn num_channels(&self) -> usize;

    fn sample_rates(&self) -> MetaRange;
    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, SourceError>;
    fn sample_rate(&self) -> f64;

    fn freq_range(&self, chan: usize) -> FreqRange;
    fn set_center_freq(&mut self, freq: f64, chan: usize) -> Result<f64, SourceError>;
    fn center_freq(&self, chan: usize) -> f64;

    fn set_freq_corr(&mut self, ppm: f64, chan: usize) -> Result<f64, SourceError>;
    fn freq_corr(&self, chan: usize) -> f64;

    fn gain_names(&self, chan: usize) -> Vec<String>;
    fn gain_range(&self, chan: usize) -> GainRange;
    fn named_gain_range(&self, name: &str, chan: usize) -> GainRange;

    fn set_gain_mode(&mut self, automatic: bool, chan: usize) -> Result<bool, SourceError>;
    fn gain_mode(&self, chan: usize) -> bool;

    fn set_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError>;
    fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<f64, SourceError>;
    fn gain(&self, chan: usize) -> f64;
    fn named_gain(&self, name: &str, chan: usize) -> f64;

    /// Intermediate frequency gain. Devices without a separate IF stage keep
    /// the default no-op.
    fn set_if_gain(&mut self, _gain: f64, _chan: usize) -> Result<f64, SourceError> {
        Ok(0.0)
    }
    fn if_gain(&self, _chan: usize) -> f64 {
        0.0
    }

    /// Baseband gain. Same convention as the IF gain.
    fn set_bb_gain(&mut self, _gain: f64, _chan: usize) -> Result<f64, SourceError> {
        Ok(0.0)
    }
    fn bb_gain(&self, _chan: usize) -> f64 {
        0.0
    }

    fn antennas(&self, chan: usize) -> Vec<String>;
    fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<String, SourceError>;
    fn antenna(&self, chan: usize) -> String;

    /// Fill `buf` with the next samples of local channel `chan`.
    ///
    /// Returns the number of samples written; 0 means no data right now
    /// (e.g. end of a non-repeating recording).
    fn read_samples(&mut self, chan: usize, buf: &mut [Complex32]) -> Result<usize, SourceError>;
}
