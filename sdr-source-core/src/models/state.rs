use super::error::SourceError;

/// Operating state of an aggregate source.
///
/// ```text
/// construction ─ok─→ hardware
///      │
///      └─err─→ degraded (missing outputs fed from gaussian noise)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    /// Every output channel is backed by a device channel.
    Hardware,
    /// Construction failed; `synthetic_channels` outputs carry noise.
    Degraded {
        reason: SourceError,
        synthetic_channels: usize,
    },
}

impl SourceState {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The construction error that caused degraded mode, if any.
    pub fn failure(&self) -> Option<&SourceError> {
        match self {
            Self::Degraded { reason, .. } => Some(reason),
            Self::Hardware => None,
        }
    }

    pub fn synthetic_channels(&self) -> usize {
        match self {
            Self::Degraded {
                synthetic_channels, ..
            } => *synthetic_channels,
            Self::Hardware => 0,
        }
    }
}
