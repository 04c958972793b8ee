//! # sdr-source-core
//!
//! Multi-device receive source aggregation.
//!
//! Presents any number of receive devices as one source with a flat,
//! zero-based channel index. Per-channel configuration calls are routed to
//! the owning device and local channel, redundant hardware writes are
//! suppressed by a per-channel cache, and every device channel can pass
//! through an I/Q balance stage. If the devices cannot be brought up, the
//! declared outputs are filled with rate-limited gaussian noise instead of
//! failing the host.
//!
//! Concrete backends (file playback, simulated receivers, hardware drivers)
//! implement the `SourceDevice` and `DeviceBackend` traits and are registered
//! into a `BackendRegistry`.
//!
//! ## Architecture
//!
//! ```text
//! sdr-source-core (this crate)
//! ├── traits/       ← SourceDevice, DeviceBackend
//! ├── models/       ← SourceError, SourceState, SourceConfiguration, DeviceDescriptor, ChannelState, ranges
//! ├── processing/   ← IqBalanceStage, GaussianNoiseSource, Throttle, NoiseFanOut, RingBuffer
//! ├── session/      ← AggregateSource, BackendRegistry, ChannelMap, ChannelStream
//! └── storage/      ← JSON source report sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::channel_state::{Applied, ChannelState, IqBalanceMode, IqCorrection};
pub use models::config::SourceConfiguration;
pub use models::descriptor::{declared_output_channels, parse_device_args, DeviceDescriptor};
pub use models::error::SourceError;
pub use models::range::{FreqRange, GainRange, MetaRange, Range};
pub use models::state::SourceState;
pub use num_complex::Complex32;
pub use processing::iq_balance::IqBalanceStage;
pub use processing::ring_buffer::RingBuffer;
pub use session::aggregate::AggregateSource;
pub use session::channel_map::{ChannelMap, ChannelRoute};
pub use session::registry::BackendRegistry;
pub use session::stream::ChannelStream;
pub use storage::report::{read_report, write_report, ChannelReport, DeviceReport, SourceReport};
pub use traits::device_backend::DeviceBackend;
pub use traits::source_device::{DeviceHandle, SourceDevice};
