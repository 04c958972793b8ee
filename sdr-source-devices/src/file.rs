//! IQ recording playback.
//!
//! Reads interleaved little-endian `f32` I/Q pairs (`.cfile`) as a single
//! channel device:
//!
//! ```text
//! file=/data/pass.cfile,rate=2.4e6,freq=137.1e6,repeat=false,throttle=false
//! ```
//!
//! Tuning calls are stored and echoed back; the recording is not altered.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::info;
use num_complex::Complex32;
use sdr_source_core::models::descriptor::DeviceDescriptor;
use sdr_source_core::models::error::SourceError;
use sdr_source_core::models::range::{FreqRange, GainRange, MetaRange, Range};
use sdr_source_core::processing::throttle::Throttle;
use sdr_source_core::traits::device_backend::DeviceBackend;
use sdr_source_core::traits::source_device::SourceDevice;

const DEVICE_TYPE: &str = "file";
const BYTES_PER_SAMPLE: u64 = 8;

/// Backend for the `file=` key. Files are never discovered.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBackend;

impl DeviceBackend for FileBackend {
    fn device_type(&self) -> &str {
        DEVICE_TYPE
    }

    fn discover(&self) -> Vec<String> {
        Vec::new()
    }

    fn create(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn SourceDevice>, SourceError> {
        Ok(Box::new(FileSource::from_descriptor(descriptor)?))
    }
}

/// Options of a file source, as given in its argument group.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOptions {
    pub rate: f64,
    pub freq: f64,
    pub repeat: bool,
    pub throttle: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            rate: 1e6,
            freq: 100e6,
            repeat: true,
            throttle: true,
        }
    }
}

pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
    scratch: Vec<u8>,
    total: u64,
    position: u64,
    repeat: bool,
    throttle: Option<Throttle>,
    rate: f64,
    freq: f64,
    ppm: f64,
}

impl FileSource {
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Result<Self, SourceError> {
        let path = descriptor.get(DEVICE_TYPE).unwrap_or_default();
        if path.is_empty() {
            return Err(SourceError::construction(DEVICE_TYPE, "no file name given"));
        }

        let defaults = FileOptions::default();
        let options = FileOptions {
            rate: descriptor.parse_param("rate")?.unwrap_or(defaults.rate),
            freq: descriptor.parse_param("freq")?.unwrap_or(defaults.freq),
            repeat: descriptor.flag("repeat")?.unwrap_or(defaults.repeat),
            throttle: descriptor.flag("throttle")?.unwrap_or(defaults.throttle),
        };
        Self::open(path, options)
    }

    pub fn open(path: impl AsRef<Path>, options: FileOptions) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        if !(options.rate.is_finite() && options.rate > 0.0) {
            return Err(SourceError::construction(
                DEVICE_TYPE,
                format!("invalid sample rate {}", options.rate),
            ));
        }

        let file = File::open(&path)
            .map_err(|e| SourceError::construction(DEVICE_TYPE, format!("{}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .map_err(|e| SourceError::construction(DEVICE_TYPE, format!("{}: {}", path.display(), e)))?
            .len();
        let total = len / BYTES_PER_SAMPLE;
        if total == 0 {
            return Err(SourceError::construction(
                DEVICE_TYPE,
                format!("{} holds no samples", path.display()),
            ));
        }

        info!(
            "file source {}: {} samples at {} S/s{}",
            path.display(),
            total,
            options.rate,
            if options.repeat { ", repeating" } else { "" }
        );

        Ok(Self {
            path,
            reader: BufReader::new(file),
            scratch: Vec::new(),
            total,
            position: 0,
            repeat: options.repeat,
            throttle: options.throttle.then(|| Throttle::new(options.rate)),
            rate: options.rate,
            freq: options.freq,
            ppm: 0.0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples in the recording.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn check_channel(&self, chan: usize) -> Result<(), SourceError> {
        if chan != 0 {
            return Err(SourceError::ChannelOutOfRange {
                channel: chan,
                available: 1,
            });
        }
        Ok(())
    }
}

impl SourceDevice for FileSource {
    fn name(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn sample_rates(&self) -> MetaRange {
        MetaRange::from(Range::value(self.rate))
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<f64, SourceError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SourceError::Device(format!("invalid sample rate {}", rate)));
        }
        self.rate = rate;
        if let Some(throttle) = &mut self.throttle {
            throttle.set_sample_rate(rate);
        }
        Ok(rate)
    }

    fn sample_rate(&self) -> f64 {
        self.rate
    }

    fn freq_range(&self, _chan: usize) -> FreqRange {
        MetaRange::from(Range::value(self.freq))
    }

    fn set_center_freq(&mut self, freq: f64, _chan: usize) -> Result<f64, SourceError> {
        self.freq = freq;
        Ok(freq)
    }

    fn center_freq(&self, _chan: usize) -> f64 {
        self.freq
    }

    fn set_freq_corr(&mut self, ppm: f64, _chan: usize) -> Result<f64, SourceError> {
        self.ppm = ppm;
        Ok(ppm)
    }

    fn freq_corr(&self, _chan: usize) -> f64 {
        self.ppm
    }

    fn gain_names(&self, _chan: usize) -> Vec<String> {
        Vec::new()
    }

    fn gain_range(&self, _chan: usize) -> GainRange {
        MetaRange::new()
    }

    fn named_gain_range(&self, _name: &str, _chan: usize) -> GainRange {
        MetaRange::new()
    }

    fn set_gain_mode(&mut self, _automatic: bool, _chan: usize) -> Result<bool, SourceError> {
        Ok(false)
    }

    fn gain_mode(&self, _chan: usize) -> bool {
        false
    }

    fn set_gain(&mut self, _gain: f64, _chan: usize) -> Result<f64, SourceError> {
        Ok(0.0)
    }

    fn set_named_gain(&mut self, _gain: f64, _name: &str, _chan: usize) -> Result<f64, SourceError> {
        Ok(0.0)
    }

    fn gain(&self, _chan: usize) -> f64 {
        0.0
    }

    fn named_gain(&self, _name: &str, _chan: usize) -> f64 {
        0.0
    }

    fn antennas(&self, _chan: usize) -> Vec<String> {
        Vec::new()
    }

    fn set_antenna(&mut self, _antenna: &str, _chan: usize) -> Result<String, SourceError> {
        Ok(String::new())
    }

    fn antenna(&self, _chan: usize) -> String {
        String::new()
    }

    fn read_samples(&mut self, chan: usize, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        self.check_channel(chan)?;

        let mut written = 0;
        while written < buf.len() {
            if self.position == self.total {
                if !self.repeat {
                    break;
                }
                self.reader.seek(SeekFrom::Start(0))?;
                self.position = 0;
            }

            let remaining = (self.total - self.position).min((buf.len() - written) as u64) as usize;
            self.scratch.resize(remaining * BYTES_PER_SAMPLE as usize, 0);
            self.reader.read_exact(&mut self.scratch)?;

            for (sample, bytes) in buf[written..written + remaining]
                .iter_mut()
                .zip(self.scratch.chunks_exact(BYTES_PER_SAMPLE as usize))
            {
                let re = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let im = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                *sample = Complex32::new(re, im);
            }
            written += remaining;
            self.position += remaining as u64;
        }

        if let Some(throttle) = &mut self.throttle {
            throttle.pace(written);
        }
        Ok(written)
    }
}
