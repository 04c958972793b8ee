use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// I/Q balance correction mode of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IqBalanceMode {
    #[default]
    Off,
    Manual,
    Automatic,
}

/// Magnitude/phase correction pair. `(0, 0)` is the neutral correction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IqCorrection {
    pub magnitude: f32,
    /// Radians.
    pub phase: f32,
}

impl IqCorrection {
    pub const NEUTRAL: Self = Self {
        magnitude: 0.0,
        phase: 0.0,
    };

    pub fn new(magnitude: f32, phase: f32) -> Self {
        Self { magnitude, phase }
    }

    pub fn is_neutral(&self) -> bool {
        self.magnitude == 0.0 && self.phase == 0.0
    }
}

/// A value last handed to a device, and what the device reported back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applied<T> {
    pub requested: T,
    pub actual: T,
}

impl<T: Clone> Applied<T> {
    pub fn pending(value: T) -> Self {
        Self {
            requested: value.clone(),
            actual: value,
        }
    }
}

/// Cached settings of one virtual channel.
///
/// Every slot starts as `None` ("never applied"), so the first setter call
/// always reaches the hardware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub center_freq: Option<Applied<f64>>,
    pub freq_corr: Option<Applied<f64>>,
    pub gain: Option<Applied<f64>>,
    pub named_gains: HashMap<String, Option<Applied<f64>>>,
    pub if_gain: Option<Applied<f64>>,
    pub bb_gain: Option<Applied<f64>>,
    pub gain_mode: Option<Applied<bool>>,
    pub antenna: Option<Applied<String>>,
    pub iq_mode: IqBalanceMode,
    /// Last manual correction applied through `set_iq_balance`.
    pub iq_correction: Option<IqCorrection>,
}

impl ChannelState {
    /// The manual gain to restore after leaving automatic gain mode.
    pub fn manual_gain(&self) -> Option<f64> {
        self.gain.as_ref().map(|g| g.requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_nothing_applied() {
        let state = ChannelState::default();
        assert!(state.center_freq.is_none());
        assert!(state.manual_gain().is_none());
        assert_eq!(state.iq_mode, IqBalanceMode::Off);
    }

    #[test]
    fn mode_serializes_lowercase() {
        let json = serde_json::to_string(&IqBalanceMode::Automatic).unwrap();
        assert_eq!(json, "\"automatic\"");
    }
}
