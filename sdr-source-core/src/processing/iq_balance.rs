//! I/Q imbalance estimation and correction.
//!
//! Imbalance model (`m` = magnitude error, `p` = phase error in radians):
//!
//! ```text
//! I' = I
//! Q' = (1 + m) * (Q cos p + I sin p)
//! ```
//!
//! The corrector inverts this for a given `(m, p)`. The estimator recovers
//! `(m, p)` blindly from second order moments of the raw signal, assuming the
//! true I and Q are uncorrelated with equal power, and publishes one estimate
//! per adaptation period on a channel the corrector side drains.

use crossbeam_channel::{Receiver, Sender};
use num_complex::Complex32;

use crate::models::channel_state::{IqBalanceMode, IqCorrection};

/// Samples per estimate in automatic mode, relative to the sample rate.
const PERIODS_PER_SECOND: f64 = 5.0;

/// Blind imbalance estimator. A period of 0 disables it.
pub struct IqBalanceEstimator {
    period: usize,
    count: usize,
    sum_ii: f64,
    sum_qq: f64,
    sum_iq: f64,
    tx: Sender<IqCorrection>,
}

impl IqBalanceEstimator {
    pub fn new(tx: Sender<IqCorrection>) -> Self {
        Self {
            period: 0,
            count: 0,
            sum_ii: 0.0,
            sum_qq: 0.0,
            sum_iq: 0.0,
            tx,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn set_period(&mut self, period: usize) {
        self.period = period;
    }

    /// Drop the partially accumulated period.
    pub fn reset(&mut self) {
        self.count = 0;
        self.sum_ii = 0.0;
        self.sum_qq = 0.0;
        self.sum_iq = 0.0;
    }

    pub fn process(&mut self, samples: &[Complex32]) {
        if self.period == 0 {
            return;
        }
        for s in samples {
            let (i, q) = (s.re as f64, s.im as f64);
            self.sum_ii += i * i;
            self.sum_qq += q * q;
            self.sum_iq += i * q;
            self.count += 1;

            if self.count >= self.period {
                if let Some(estimate) = self.estimate() {
                    // receiver gone means the stage is being torn down
                    let _ = self.tx.send(estimate);
                }
                self.reset();
            }
        }
    }

    fn estimate(&self) -> Option<IqCorrection> {
        if self.sum_ii <= 0.0 || self.sum_qq <= 0.0 {
            return None;
        }
        let gain = (self.sum_qq / self.sum_ii).sqrt();
        let sin_phase = (self.sum_iq / (self.sum_ii * self.sum_qq).sqrt()).clamp(-1.0, 1.0);
        Some(IqCorrection::new((gain - 1.0) as f32, sin_phase.asin() as f32))
    }
}

/// Applies a magnitude/phase correction in place.
#[derive(Debug, Clone, Default)]
pub struct IqBalanceCorrector {
    correction: IqCorrection,
}

impl IqBalanceCorrector {
    pub fn correction(&self) -> IqCorrection {
        self.correction
    }

    pub fn set_correction(&mut self, correction: IqCorrection) {
        self.correction = correction;
    }

    pub fn apply(&self, samples: &mut [Complex32]) {
        if self.correction.is_neutral() {
            return;
        }
        let gain = 1.0 + self.correction.magnitude;
        let (sin_p, cos_p) = self.correction.phase.sin_cos();
        if gain.abs() < f32::EPSILON || cos_p.abs() < f32::EPSILON {
            return;
        }
        for s in samples.iter_mut() {
            s.im = (s.im / gain - s.re * sin_p) / cos_p;
        }
    }
}

/// Per-channel estimator + corrector pair and the Off/Manual/Automatic
/// state machine that decides which of the two owns the correction.
///
/// - Off: estimator stopped, corrector neutral, previous correction saved.
/// - Manual: estimator stopped; leaving Off restores the saved correction.
/// - Automatic: estimator running with a period of `sample_rate / 5`.
pub struct IqBalanceStage {
    mode: IqBalanceMode,
    estimator: IqBalanceEstimator,
    corrector: IqBalanceCorrector,
    corrections: Receiver<IqCorrection>,
    saved: IqCorrection,
}

impl IqBalanceStage {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            mode: IqBalanceMode::Off,
            estimator: IqBalanceEstimator::new(tx),
            corrector: IqBalanceCorrector::default(),
            corrections: rx,
            saved: IqCorrection::NEUTRAL,
        }
    }

    pub fn mode(&self) -> IqBalanceMode {
        self.mode
    }

    /// Correction currently applied to the signal.
    pub fn correction(&self) -> IqCorrection {
        self.corrector.correction()
    }

    /// Correction that Manual mode restores after Off.
    pub fn saved_correction(&self) -> IqCorrection {
        self.saved
    }

    pub fn estimator_period(&self) -> usize {
        self.estimator.period()
    }

    pub fn set_mode(&mut self, mode: IqBalanceMode, sample_rate: f64) {
        match mode {
            IqBalanceMode::Off => {
                self.estimator.set_period(0);
                if self.mode != IqBalanceMode::Off {
                    self.saved = self.corrector.correction();
                }
                self.corrector.set_correction(IqCorrection::NEUTRAL);
                self.discard_pending();
            }
            IqBalanceMode::Manual => {
                self.estimator.set_period(0);
                self.discard_pending();
                if self.mode == IqBalanceMode::Off {
                    self.corrector.set_correction(self.saved);
                }
            }
            IqBalanceMode::Automatic => {
                self.estimator.set_period(adaptation_period(sample_rate));
                self.estimator.reset();
            }
        }
        self.mode = mode;
    }

    /// Manual correction. Applied only in Manual mode; Off keeps the signal
    /// untouched and the pre-Off snapshot intact, Automatic owns the corrector.
    /// Returns whether the value was applied.
    pub fn set_correction(&mut self, correction: IqCorrection) -> bool {
        if self.mode != IqBalanceMode::Manual {
            return false;
        }
        self.corrector.set_correction(correction);
        true
    }

    /// Keep the automatic adaptation time constant when the rate changes.
    pub fn on_sample_rate_changed(&mut self, sample_rate: f64) {
        if self.mode == IqBalanceMode::Automatic {
            self.estimator.set_period(adaptation_period(sample_rate));
            self.estimator.reset();
        }
    }

    /// Run one block of raw device samples through the stage in place.
    pub fn process(&mut self, samples: &mut [Complex32]) {
        self.estimator.process(samples);

        if let Some(latest) = self.corrections.try_iter().last() {
            if self.mode == IqBalanceMode::Automatic {
                self.corrector.set_correction(latest);
            }
        }

        self.corrector.apply(samples);
    }

    fn discard_pending(&self) {
        while self.corrections.try_recv().is_ok() {}
    }
}

impl Default for IqBalanceStage {
    fn default() -> Self {
        Self::new()
    }
}

fn adaptation_period(sample_rate: f64) -> usize {
    ((sample_rate / PERIODS_PER_SECOND) as usize).max(1)
}
