use std::thread;
use std::time::{Duration, Instant};

/// Paces a sample stream to a nominal rate by sleeping the producing thread.
///
/// The first call starts the clock; each later call blocks until the total
/// number of samples produced so far is due at `sample_rate`.
#[derive(Debug, Clone)]
pub struct Throttle {
    sample_rate: f64,
    start: Option<Instant>,
    produced: u64,
}

impl Throttle {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            start: None,
            produced: 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Change the rate; the clock restarts so the new pace applies from now.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.produced = 0;
    }

    /// Account for `samples` about to be handed downstream, sleeping until
    /// they are due.
    pub fn pace(&mut self, samples: usize) {
        let start = *self.start.get_or_insert_with(Instant::now);
        self.produced += samples as u64;

        if self.sample_rate <= 0.0 {
            return;
        }
        // unrepresentable deadlines (denormal rates) are not paced
        let Ok(due) = Duration::try_from_secs_f64(self.produced as f64 / self.sample_rate) else {
            return;
        };
        let elapsed = start.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }

    /// Samples accounted for since the last reset.
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_rate() {
        let mut throttle = Throttle::new(10_000.0);
        let start = Instant::now();
        for _ in 0..5 {
            throttle.pace(100);
        }
        // 500 samples at 10 kS/s
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert_eq!(throttle.produced(), 500);
    }

    #[test]
    fn fast_rate_does_not_block() {
        let mut throttle = Throttle::new(1e12);
        let start = Instant::now();
        throttle.pace(1_000_000);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn tiny_rate_does_not_panic() {
        let mut throttle = Throttle::new(1e-320);
        let start = Instant::now();
        throttle.pace(1_000);
        assert_eq!(throttle.produced(), 1_000);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn rate_change_restarts_clock() {
        let mut throttle = Throttle::new(1e12);
        throttle.pace(10);
        throttle.set_sample_rate(2e12);
        assert_eq!(throttle.produced(), 0);
        assert_eq!(throttle.sample_rate(), 2e12);
    }
}
