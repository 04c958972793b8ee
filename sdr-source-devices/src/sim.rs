//! Simulated multi-channel receiver.
//!
//! Behaves like a small USB tuner: frequencies snap to a 1 kHz grid,
//! gains snap to a discrete tuner table, rates to a fixed list, and leaving
//! automatic gain control drops the manual gain back to 0 dB. Each channel
//! produces a tone at `tone` Hz from the center with an injected I/Q
//! imbalance and a little gaussian noise:
//!
//! ```text
//! sim=0,nchan=2,rate=2.4e6,tone=10e3,iq_mag=0.1,iq_phase=0.05
//! ```

use std::f64::consts::PI;

use log::info;
use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use sdr_source_core::models::descriptor::DeviceDescriptor;
use sdr_source_core::models::error::SourceError;
use sdr_source_core::models::range::{FreqRange, GainRange, MetaRange, Range};
use sdr_source_core::traits::device_backend::DeviceBackend;
use sdr_source_core::traits::source_device::SourceDevice;

const DEVICE_TYPE: &str = "sim";

/// Tuner gain steps in dB.
pub const TUNER_GAINS: [f64; 29] = [
    0.0, 0.9, 1.4, 2.7, 3.7, 7.7, 8.7, 12.5, 14.4, 15.7, 16.6, 19.7, 20.7, 22.9, 25.4, 28.0, 29.7, 32.8, 33.8, 36.4,
    37.2, 38.6, 40.2, 42.1, 43.4, 43.9, 44.5, 48.0, 49.6,
];

pub const SAMPLE_RATES: [f64; 10] = [
    250e3, 1.024e6, 1.4e6, 1.8e6, 1.92e6, 2.048e6, 2.4e6, 2.56e6, 2.88e6, 3.2e6,
];

const FREQ_MIN: f64 = 24e6;
const FREQ_MAX: f64 = 1.766e9;
const FREQ_STEP: f64 = 1e3;
const IF_GAIN_MAX: f64 = 30.0;
const NOISE_RMS: f32 = 0.01;

/// Backend for the `sim=` key. Discovers `units` virtual receivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimBackend {
    units: usize,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(units: usize) -> Self {
        Self { units }
    }
}

impl DeviceBackend for SimBackend {
    fn device_type(&self) -> &str {
        DEVICE_TYPE
    }

    fn discover(&self) -> Vec<String> {
        (0..self.units).map(|i| format!("{}={}", DEVICE_TYPE, i)).collect()
    }

    fn create(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn SourceDevice>, SourceError> {
        Ok(Box::new(SimulatedReceiver::from_descriptor(descriptor)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    pub index: usize,
    pub channels: usize,
    pub rate: f64,
    pub tone: f64,
    pub iq_mag: f32,
    pub iq_phase: f32,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            index: 0,
            channels: 1,
            rate: 2.4e6,
            tone: 10e3,
            iq_mag: 0.0,
            iq_phase: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct SimChannel {
    freq: f64,
    ppm: f64,
    automatic: bool,
    gain: f64,
    if_gain: f64,
    antenna: String,
    phase: f64,
}

impl Default for SimChannel {
    fn default() -> Self {
        Self {
            freq: 100e6,
            ppm: 0.0,
            automatic: false,
            gain: 0.0,
            if_gain: 0.0,
            antenna: "RX".into(),
            phase: 0.0,
        }
    }
}

pub struct SimulatedReceiver {
    options: SimOptions,
    rate: f64,
    channels: Vec<SimChannel>,
    noise: Normal<f32>,
    rng: StdRng,
}

impl SimulatedReceiver {
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Result<Self, SourceError> {
        let defaults = SimOptions::default();
        let index = match descriptor.get(DEVICE_TYPE) {
            None | Some("") => defaults.index,
            Some(_) => descriptor.parse_param(DEVICE_TYPE)?.unwrap_or(defaults.index),
        };
        let options = SimOptions {
            index,
            channels: descriptor.parse_param("nchan")?.unwrap_or(defaults.channels),
            rate: descriptor.parse_param("rate")?.unwrap_or(defaults.rate),
            tone: descriptor.parse_param("tone")?.unwrap_or(defaults.tone),
            iq_mag: descriptor.parse_param("iq_mag")?.unwrap_or(defaults.iq_mag),
            iq_phase: descriptor.parse_param("iq_phase")?.unwrap_or(defaults.iq_phase),
        };
        Self::new(options)
    }

    pub fn new(options: SimOptions) -> Result<Self, SourceError> {
        if options.channels == 0 {
            return Err(SourceError::construction(DEVICE_TYPE, "nchan must be at least 1"));
        }
        let rate = MetaRange::from_values(&SAMPLE_RATES).clip(options.rate, true);
        let noise = Normal::new(0.0, NOISE_RMS)
            .map_err(|e| SourceError::construction(DEVICE_TYPE, e.to_string()))?;

        info!(
            "sim #{}: {} channel(s) at {} S/s, tone {} Hz",
            options.index, options.channels, rate, options.tone
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(options.index as u64),
            channels: vec![SimChannel::default(); options.channels],
            rate,
            noise,
            options,
        })
    }

    fn channel(&self, chan: usize) -> Result<&SimChannel, SourceError> {
        self.channels.get(chan).ok_or(SourceError::ChannelOutOfRange {
            channel: chan,
            available: self.channels.len(),
        })
    }

    fn channel_mut(&mut self, chan: usize) -> Result<&mut SimChannel, SourceError> {
        let available = self.channels.len();
        self.channels.get_mut(chan).ok_or(SourceError::ChannelOutOfRange {
            channel: chan,
            available,
        })
    }
}

impl SourceDevice for SimulatedReceiver {
    fn name(&self) -> String {
        format!("sim #{} ({} ch)", self.options.index, self.channels.len())
    }

    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn sample_rates(&self) -> MetaRange {
        MetaRange::from_values(&SAMPLE_RATES)
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, SourceError> {
        self.rate = self.sample_rates().clip(rate, true);
        Ok(self.rate)
    }

    fn sample_rate(&self) -> f64 {
        self.rate
    }

    fn freq_range(&self, _chan: usize) -> FreqRange {
        MetaRange::from(Range::new(FREQ_MIN, FREQ_MAX, FREQ_STEP))
    }

    fn set_center_freq(&mut self, freq: f64, chan: usize) -> Result<f64, SourceError> {
        let actual = self.freq_range(chan).clip(freq, true);
        self.channel_mut(chan)?.freq = actual;
        Ok(actual)
    }

    fn center_freq(&self, chan: usize) -> f64 {
        self.channel(chan).map(|c| c.freq).unwrap_or_default()
    }

    fn set_freq_corr(&mut self, ppm: f64, chan: usize) -> Result<f64, SourceError> {
        let ppm = ppm.round();
        self.channel_mut(chan)?.ppm = ppm;
        Ok(ppm)
    }

    fn freq_corr(&self, chan: usize) -> f64 {
        self.channel(chan).map(|c| c.ppm).unwrap_or_default()
    }

    fn gain_names(&self, _chan: usize) -> Vec<String> {
        vec!["LNA".into()]
    }

    fn gain_range(&self, _chan: usize) -> GainRange {
        MetaRange::from_values(&TUNER_GAINS)
    }

    fn named_gain_range(&self, name: &str, chan: usize) -> GainRange {
        match name {
            "LNA" => self.gain_range(chan),
            _ => MetaRange::new(),
        }
    }

    fn set_gain_mode(&mut self, automatic: bool, chan: usize) -> Result<bool, SourceError> {
        let channel = self.channel_mut(chan)?;
        if channel.automatic && !automatic {
            channel.gain = 0.0;
        }
        channel.automatic = automatic;
        Ok(automatic)
    }

    fn gain_mode(&self, chan: usize) -> bool {
        self.channel(chan).map(|c| c.automatic).unwrap_or_default()
    }

    fn set_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError> {
        let actual = self.gain_range(chan).clip(gain, true);
        self.channel_mut(chan)?.gain = actual;
        Ok(actual)
    }

    fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<f64, SourceError> {
        match name {
            "LNA" => self.set_gain(gain, chan),
            _ => Err(SourceError::Device(format!("sim has no gain stage '{}'", name))),
        }
    }

    fn gain(&self, chan: usize) -> f64 {
        self.channel(chan).map(|c| c.gain).unwrap_or_default()
    }

    fn named_gain(&self, name: &str, chan: usize) -> f64 {
        match name {
            "LNA" => self.gain(chan),
            _ => 0.0,
        }
    }

    fn set_if_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError> {
        let actual = gain.round().clamp(0.0, IF_GAIN_MAX);
        self.channel_mut(chan)?.if_gain = actual;
        Ok(actual)
    }

    fn if_gain(&self, chan: usize) -> f64 {
        self.channel(chan).map(|c| c.if_gain).unwrap_or_default()
    }

    fn antennas(&self, _chan: usize) -> Vec<String> {
        vec!["RX".into(), "TX/RX".into()]
    }

    fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<String, SourceError> {
        if !self.antennas(chan).iter().any(|a| a == antenna) {
            return Err(SourceError::Device(format!("sim has no antenna '{}'", antenna)));
        }
        self.channel_mut(chan)?.antenna = antenna.to_string();
        Ok(antenna.to_string())
    }

    fn antenna(&self, chan: usize) -> String {
        self.channel(chan).map(|c| c.antenna.clone()).unwrap_or_default()
    }

    fn read_samples(&mut self, chan: usize, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        let step = 2.0 * PI * self.options.tone / self.rate;
        let (iq_mag, iq_phase) = (self.options.iq_mag, self.options.iq_phase);
        let available = self.channels.len();
        let channel = self.channels.get_mut(chan).ok_or(SourceError::ChannelOutOfRange {
            channel: chan,
            available,
        })?;

        for sample in buf.iter_mut() {
            let phase = channel.phase as f32;
            let i = phase.cos() + self.noise.sample(&mut self.rng);
            let q = (1.0 + iq_mag) * (phase + iq_phase).sin() + self.noise.sample(&mut self.rng);
            *sample = Complex32::new(i, q);
            channel.phase = (channel.phase + step).rem_euclid(2.0 * PI);
        }
        Ok(buf.len())
    }
}
