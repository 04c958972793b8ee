use thiserror::Error;

/// Errors raised while assembling or driving an aggregate source.
///
/// Construction errors (`NoDevicesFound`, `NoDevicesSpecified`,
/// `DeviceConstruction`, `ConfigurationFailed`) abort `AggregateSource::try_new`
/// and are what `AggregateSource::new` converts into degraded mode.
/// `Device` errors come from a backend at runtime and are passed through as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("no supported devices found to pick from")]
    NoDevicesFound,

    #[error("no devices specified via device arguments")]
    NoDevicesSpecified,

    #[error("failed to create {device_type} device: {reason}")]
    DeviceConstruction { device_type: String, reason: String },

    #[error("channel {channel} out of range (0..{available})")]
    ChannelOutOfRange { channel: usize, available: usize },

    #[error("device error: {0}")]
    Device(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl SourceError {
    /// True for the two "nothing to work with" failures.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::NoDevicesFound | Self::NoDevicesSpecified)
    }

    pub fn construction(device_type: &str, reason: impl Into<String>) -> Self {
        Self::DeviceConstruction {
            device_type: device_type.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(SourceError::NoDevicesFound.is_configuration_error());
        assert!(SourceError::NoDevicesSpecified.is_configuration_error());
        assert!(!SourceError::construction("rtl", "usb claim failed").is_configuration_error());
    }

    #[test]
    fn construction_error_message_names_the_type() {
        let err = SourceError::construction("hackrf", "no hackrf boards found");
        assert_eq!(err.to_string(), "failed to create hackrf device: no hackrf boards found");
    }
}
