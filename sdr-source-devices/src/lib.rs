//! # sdr-source-devices
//!
//! Software device backends for sdr-source.
//!
//! Provides:
//! - `FileBackend` / `FileSource`: playback of interleaved `f32` I/Q recordings (`file=`)
//! - `SimBackend` / `SimulatedReceiver`: simulated multi-channel tuner (`sim=`)
//!
//! Each backend sits behind a cargo feature of the same name; both are on by
//! default.
//!
//! ## Usage
//! ```ignore
//! use sdr_source_core::{AggregateSource, SourceConfiguration};
//!
//! let registry = sdr_source_devices::default_registry();
//! let config = SourceConfiguration::with_args("sim=0,nchan=2 file=/data/pass.cfile");
//! let mut source = AggregateSource::new(config, &registry);
//! source.set_center_freq(433.92e6, 0)?;
//! ```

use sdr_source_core::session::registry::BackendRegistry;

#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "sim")]
pub mod sim;

#[cfg(feature = "file")]
pub use file::{FileBackend, FileOptions, FileSource};
#[cfg(feature = "sim")]
pub use sim::{SimBackend, SimOptions, SimulatedReceiver};

/// Registry with every compiled-in backend, in priority order.
pub fn default_registry() -> BackendRegistry {
    #[allow(unused_mut)]
    let mut registry = BackendRegistry::new();
    #[cfg(feature = "file")]
    registry.register(FileBackend);
    #[cfg(feature = "sim")]
    registry.register(SimBackend::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(all(feature = "file", feature = "sim"))]
    fn default_registry_lists_file_first() {
        assert_eq!(default_registry().device_types(), vec!["file", "sim"]);
    }
}
