use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Where a virtual channel lives: index into the device list and the
/// device-local channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRoute {
    pub device: usize,
    pub local: usize,
}

/// Flattens per-device channel counts into one zero-based channel space.
///
/// Devices occupy consecutive index ranges in the order they were added;
/// indices are never renumbered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    counts: Vec<usize>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: &[usize]) -> Self {
        Self {
            counts: counts.to_vec(),
        }
    }

    /// Append a device with `channels` channels; returns the virtual indices
    /// it occupies.
    pub fn push_device(&mut self, channels: usize) -> Range<usize> {
        let first = self.total_channels();
        self.counts.push(channels);
        first..first + channels
    }

    pub fn total_channels(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Resolve a virtual channel by walking the devices in order.
    /// `None` for indices outside `0..total_channels()`.
    pub fn resolve(&self, channel: usize) -> Option<ChannelRoute> {
        let mut first = 0;
        for (device, &count) in self.counts.iter().enumerate() {
            if channel < first + count {
                return Some(ChannelRoute {
                    device,
                    local: channel - first,
                });
            }
            first += count;
        }
        None
    }

    /// Every route in virtual channel order.
    pub fn routes(&self) -> impl Iterator<Item = ChannelRoute> + '_ {
        self.counts
            .iter()
            .enumerate()
            .flat_map(|(device, &count)| (0..count).map(move |local| ChannelRoute { device, local }))
    }
}
