use serde::{Deserialize, Serialize};

use super::descriptor::declared_output_channels;

/// Configuration for an aggregate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfiguration {
    /// Device argument string, e.g. `"rtl=0 file=/tmp/x.cfile,rate=2e6"`.
    pub args: String,

    /// Declared output width. `None` derives it from `args`.
    pub output_channels: Option<usize>,

    /// Sample rate of the rate limiter used in degraded mode (default: 1 MS/s).
    pub fallback_sample_rate: f64,

    /// Amplitude of the gaussian noise used in degraded mode (default: 10).
    pub noise_amplitude: f32,

    /// Samples generated per noise block in degraded mode (default: 8192).
    pub fallback_block_size: usize,

    /// Insert an I/Q balance stage behind every device channel (default: true).
    pub enable_iq_balance: bool,
}

impl SourceConfiguration {
    pub fn with_args(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            ..Self::default()
        }
    }

    /// Output width fixed by the node signature.
    pub fn declared_channels(&self) -> usize {
        self.output_channels
            .unwrap_or_else(|| declared_output_channels(&self.args))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.fallback_sample_rate.is_finite() && self.fallback_sample_rate > 0.0) {
            return Err("fallback sample rate must be positive".into());
        }
        if !(self.noise_amplitude.is_finite() && self.noise_amplitude >= 0.0) {
            return Err(format!("invalid noise amplitude: {}", self.noise_amplitude));
        }
        if self.fallback_block_size == 0 {
            return Err("fallback block size must be non-zero".into());
        }
        if self.output_channels == Some(0) {
            return Err("output channel count must be non-zero".into());
        }
        Ok(())
    }
}

impl Default for SourceConfiguration {
    fn default() -> Self {
        Self {
            args: String::new(),
            output_channels: None,
            fallback_sample_rate: 1e6,
            noise_amplitude: 10.0,
            fallback_block_size: 8192,
            enable_iq_balance: true,
        }
    }
}
