use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::models::error::SourceError;

/// Complex gaussian noise generator.
///
/// `amplitude` is the RMS magnitude of the complex output; each of I and Q
/// carries `amplitude / sqrt(2)`.
pub struct GaussianNoiseSource {
    amplitude: f32,
    dist: Normal<f32>,
    rng: StdRng,
}

impl GaussianNoiseSource {
    pub fn new(amplitude: f32) -> Result<Self, SourceError> {
        Self::with_rng(amplitude, StdRng::from_entropy())
    }

    /// Reproducible sequence, for tests and recordings.
    pub fn with_seed(amplitude: f32, seed: u64) -> Result<Self, SourceError> {
        Self::with_rng(amplitude, StdRng::seed_from_u64(seed))
    }

    fn with_rng(amplitude: f32, rng: StdRng) -> Result<Self, SourceError> {
        if !(amplitude.is_finite() && amplitude >= 0.0) {
            return Err(SourceError::ConfigurationFailed(format!(
                "invalid noise amplitude {}",
                amplitude
            )));
        }
        let dist = Normal::new(0.0, amplitude / std::f32::consts::SQRT_2).map_err(|e| {
            SourceError::ConfigurationFailed(format!("invalid noise amplitude {}: {}", amplitude, e))
        })?;
        Ok(Self {
            amplitude,
            dist,
            rng,
        })
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn fill(&mut self, out: &mut [Complex32]) {
        for sample in out.iter_mut() {
            *sample = Complex32::new(self.dist.sample(&mut self.rng), self.dist.sample(&mut self.rng));
        }
    }
}
