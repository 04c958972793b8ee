use std::sync::Arc;

use num_complex::Complex32;
use parking_lot::Mutex;

use crate::models::error::SourceError;
use crate::processing::fan_out::NoiseFanOut;
use crate::processing::iq_balance::IqBalanceStage;
use crate::traits::source_device::DeviceHandle;

#[derive(Clone)]
enum Port {
    Device {
        device: DeviceHandle,
        local: usize,
        iq: Option<Arc<Mutex<IqBalanceStage>>>,
    },
    Synthetic {
        fan_out: Arc<Mutex<NoiseFanOut>>,
        tap: usize,
    },
}

/// Sample path of one output channel.
///
/// Cloneable and `Send`, so a streaming thread can pull a channel without
/// borrowing the aggregate source. Device channels pass through their I/Q
/// stage when one is present; synthetic channels read a noise fan-out tap.
#[derive(Clone)]
pub struct ChannelStream {
    channel: usize,
    port: Port,
}

impl ChannelStream {
    pub(crate) fn device(
        channel: usize,
        device: DeviceHandle,
        local: usize,
        iq: Option<Arc<Mutex<IqBalanceStage>>>,
    ) -> Self {
        Self {
            channel,
            port: Port::Device { device, local, iq },
        }
    }

    pub(crate) fn synthetic(channel: usize, fan_out: Arc<Mutex<NoiseFanOut>>, tap: usize) -> Self {
        Self {
            channel,
            port: Port::Synthetic { fan_out, tap },
        }
    }

    /// Output channel index this stream feeds.
    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.port, Port::Synthetic { .. })
    }

    /// Fill `buf` with the next samples; returns how many were written.
    pub fn read(&self, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        match &self.port {
            Port::Device { device, local, iq } => {
                let n = device.lock().read_samples(*local, buf)?;
                if let Some(stage) = iq {
                    stage.lock().process(&mut buf[..n]);
                }
                Ok(n)
            }
            Port::Synthetic { fan_out, tap } => fan_out.lock().read(*tap, buf),
        }
    }
}
