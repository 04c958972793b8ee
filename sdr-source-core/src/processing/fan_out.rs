use num_complex::Complex32;

use crate::models::error::SourceError;
use crate::processing::noise::GaussianNoiseSource;
use crate::processing::ring_buffer::RingBuffer;
use crate::processing::throttle::Throttle;

/// One rate-limited noise stream copied to any number of output taps.
///
/// Every tap sees the same sample sequence. A tap that runs dry triggers the
/// next block, which is paced by the throttle and then written to all taps.
/// Taps that are not read keep only their newest `4 * block_size` samples.
pub struct NoiseFanOut {
    noise: GaussianNoiseSource,
    throttle: Throttle,
    block: Vec<Complex32>,
    taps: Vec<RingBuffer<Complex32>>,
}

impl NoiseFanOut {
    pub fn new(noise: GaussianNoiseSource, throttle: Throttle, block_size: usize, taps: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            noise,
            throttle,
            block: vec![Complex32::default(); block_size],
            taps: (0..taps).map(|_| RingBuffer::new(block_size * 4)).collect(),
        }
    }

    pub fn taps(&self) -> usize {
        self.taps.len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.throttle.sample_rate()
    }

    /// Fill `out` from `tap`. Reads larger than a tap's capacity are short.
    pub fn read(&mut self, tap: usize, out: &mut [Complex32]) -> Result<usize, SourceError> {
        let available = self.taps.len();
        let capacity = match self.taps.get(tap) {
            Some(buffer) => buffer.capacity(),
            None => {
                return Err(SourceError::ChannelOutOfRange {
                    channel: tap,
                    available,
                })
            }
        };

        let want = out.len().min(capacity);
        while self.taps[tap].count() < want {
            self.generate_block();
        }
        Ok(self.taps[tap].read_into(&mut out[..want]))
    }

    fn generate_block(&mut self) {
        self.noise.fill(&mut self.block);
        self.throttle.pace(self.block.len());
        for tap in &mut self.taps {
            tap.write(&self.block);
        }
    }
}
