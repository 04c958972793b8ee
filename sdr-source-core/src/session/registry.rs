use log::{debug, info};

use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::SourceError;
use crate::traits::device_backend::DeviceBackend;
use crate::traits::source_device::SourceDevice;

/// Priority-ordered table of compiled-in device backends.
///
/// Registration order is the priority order: it decides which backend wins
/// when a descriptor names more than one type, and the order discovered
/// devices are listed in.
pub struct BackendRegistry {
    backends: Vec<Box<dyn DeviceBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn register<B: DeviceBackend + 'static>(&mut self, backend: B) {
        debug!("registered device backend '{}'", backend.device_type());
        self.backends.push(Box::new(backend));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<B: DeviceBackend + 'static>(mut self, backend: B) -> Self {
        self.register(backend);
        self
    }

    pub fn device_types(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.device_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Log the version banner with the compiled-in device types.
    pub fn log_banner(&self) {
        info!(
            "sdr-source {} built-in device types: {}",
            env!("CARGO_PKG_VERSION"),
            self.device_types().join(" ")
        );
    }

    /// The highest priority backend whose key appears in `descriptor`.
    pub fn backend_for(&self, descriptor: &DeviceDescriptor) -> Option<&dyn DeviceBackend> {
        self.backends
            .iter()
            .find(|b| descriptor.contains_key(b.device_type()))
            .map(|b| b.as_ref())
    }

    /// Every device currently attached, concatenated in backend priority order.
    pub fn discover_all(&self) -> Vec<String> {
        self.backends.iter().flat_map(|b| b.discover()).collect()
    }

    /// Complete the descriptor list before construction.
    ///
    /// When no descriptor names a registered type, the first discovered
    /// device is appended. Discovery is not consulted otherwise.
    pub fn select(&self, mut descriptors: Vec<DeviceDescriptor>) -> Result<Vec<DeviceDescriptor>, SourceError> {
        let specified = descriptors.iter().any(|d| self.backend_for(d).is_some());
        if !specified {
            let first = self
                .discover_all()
                .into_iter()
                .next()
                .ok_or(SourceError::NoDevicesFound)?;
            info!("no device specified, picking discovered device '{}'", first);
            descriptors.push(DeviceDescriptor::parse(&first));
        }
        Ok(descriptors)
    }

    /// Construct the device a descriptor names.
    ///
    /// `None` when the descriptor names no registered type; such groups are
    /// skipped. Factory failures are reported as `DeviceConstruction`.
    pub fn create(&self, descriptor: &DeviceDescriptor) -> Option<Result<Box<dyn SourceDevice>, SourceError>> {
        let backend = self.backend_for(descriptor)?;
        let device_type = backend.device_type();
        Some(backend.create(descriptor).map_err(|e| match e {
            SourceError::DeviceConstruction { .. } => e,
            other => SourceError::construction(device_type, other.to_string()),
        }))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::range::MetaRange;
    use num_complex::Complex32;

    struct NullDevice;

    impl SourceDevice for NullDevice {
        fn name(&self) -> String {
            "null".into()
        }
        fn num_channels(&self) -> usize {
            1
        }
        fn sample_rates(&self) -> MetaRange {
            MetaRange::new()
        }
        fn set_sample_rate(&mut self, rate: f64) -> Result<f64, SourceError> {
            Ok(rate)
        }
        fn sample_rate(&self) -> f64 {
            0.0
        }
        fn freq_range(&self, _chan: usize) -> MetaRange {
            MetaRange::new()
        }
        fn set_center_freq(&mut self, freq: f64, _chan: usize) -> Result<f64, SourceError> {
            Ok(freq)
        }
        fn center_freq(&self, _chan: usize) -> f64 {
            0.0
        }
        fn set_freq_corr(&mut self, ppm: f64, _chan: usize) -> Result<f64, SourceError> {
            Ok(ppm)
        }
        fn freq_corr(&self, _chan: usize) -> f64 {
            0.0
        }
        fn gain_names(&self, _chan: usize) -> Vec<String> {
            Vec::new()
        }
        fn gain_range(&self, _chan: usize) -> MetaRange {
            MetaRange::new()
        }
        fn named_gain_range(&self, _name: &str, _chan: usize) -> MetaRange {
            MetaRange::new()
        }
        fn set_gain_mode(&mut self, automatic: bool, _chan: usize) -> Result<bool, SourceError> {
            Ok(automatic)
        }
        fn gain_mode(&self, _chan: usize) -> bool {
            false
        }
        fn set_gain(&mut self, gain: f64, _chan: usize) -> Result<f64, SourceError> {
            Ok(gain)
        }
        fn set_named_gain(&mut self, gain: f64, _name: &str, _chan: usize) -> Result<f64, SourceError> {
            Ok(gain)
        }
        fn gain(&self, _chan: usize) -> f64 {
            0.0
        }
        fn named_gain(&self, _name: &str, _chan: usize) -> f64 {
            0.0
        }
        fn antennas(&self, _chan: usize) -> Vec<String> {
            Vec::new()
        }
        fn set_antenna(&mut self, antenna: &str, _chan: usize) -> Result<String, SourceError> {
            Ok(antenna.to_string())
        }
        fn antenna(&self, _chan: usize) -> String {
            String::new()
        }
        fn read_samples(&mut self, _chan: usize, buf: &mut [Complex32]) -> Result<usize, SourceError> {
            Ok(buf.len())
        }
    }

    struct StubBackend {
        key: &'static str,
        found: Vec<String>,
        fail: bool,
    }

    impl StubBackend {
        fn new(key: &'static str) -> Self {
            Self {
                key,
                found: Vec::new(),
                fail: false,
            }
        }
    }

    impl DeviceBackend for StubBackend {
        fn device_type(&self) -> &str {
            self.key
        }
        fn discover(&self) -> Vec<String> {
            self.found.clone()
        }
        fn create(&self, _descriptor: &DeviceDescriptor) -> Result<Box<dyn SourceDevice>, SourceError> {
            if self.fail {
                Err(SourceError::Device("usb claim failed".into()))
            } else {
                Ok(Box::new(NullDevice))
            }
        }
    }

    #[test]
    fn device_types_follow_registration_order() {
        let registry = BackendRegistry::new()
            .with(StubBackend::new("file"))
            .with(StubBackend::new("rtl"));
        assert_eq!(registry.device_types(), vec!["file", "rtl"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn first_registered_key_wins() {
        let registry = BackendRegistry::new()
            .with(StubBackend::new("file"))
            .with(StubBackend::new("rtl"));
        let descriptor = DeviceDescriptor::parse("rtl=0,file=/tmp/x");
        assert_eq!(registry.backend_for(&descriptor).map(|b| b.device_type()), Some("file"));
        assert!(registry.backend_for(&DeviceDescriptor::parse("bias=1")).is_none());
    }

    #[test]
    fn discovery_appends_first_device_only_when_nothing_is_named() {
        let mut rtl = StubBackend::new("rtl");
        rtl.found = vec!["rtl=0".into(), "rtl=1".into()];
        let mut sim = StubBackend::new("sim");
        sim.found = vec!["sim=0".into()];
        let registry = BackendRegistry::new().with(rtl).with(sim);

        assert_eq!(registry.discover_all(), vec!["rtl=0", "rtl=1", "sim=0"]);

        let picked = registry.select(vec![DeviceDescriptor::parse("bias=1")]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[1].as_args(), "rtl=0");

        let named = registry.select(vec![DeviceDescriptor::parse("sim=3")]).unwrap();
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn nothing_named_and_nothing_found_is_a_configuration_error() {
        let registry = BackendRegistry::new().with(StubBackend::new("rtl"));
        let err = registry
            .select(vec![
                DeviceDescriptor::parse("a=1"),
                DeviceDescriptor::parse("b=2"),
                DeviceDescriptor::parse("c=3"),
            ])
            .unwrap_err();
        assert_eq!(err, SourceError::NoDevicesFound);
        assert!(err.is_configuration_error());
    }

    #[test]
    fn factory_failure_is_wrapped_as_construction_error() {
        let mut rtl = StubBackend::new("rtl");
        rtl.fail = true;
        let registry = BackendRegistry::new().with(rtl);

        let result = registry.create(&DeviceDescriptor::parse("rtl=0"));
        match result {
            Some(Err(SourceError::DeviceConstruction { device_type, reason })) => {
                assert_eq!(device_type, "rtl");
                assert!(reason.contains("usb claim failed"));
            }
            _ => panic!("expected a construction error"),
        }
        assert!(registry.create(&DeviceDescriptor::parse("x=1")).is_none());
    }
}
