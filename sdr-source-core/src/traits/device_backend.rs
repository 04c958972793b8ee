use crate::models::descriptor::DeviceDescriptor;
use crate::models::error::SourceError;
use crate::traits::source_device::SourceDevice;

/// A compiled-in device family: the reserved argument key that selects it,
/// a hardware discovery function and a factory.
///
/// Implemented by:
/// - `FileBackend` (`file=`), `SimBackend` (`sim=`) in `sdr-source-devices`
/// - hardware drivers living in their own crates
pub trait DeviceBackend: Send + Sync {
    /// Reserved argument key naming this backend, e.g. `"rtl"`.
    fn device_type(&self) -> &str;

    /// Argument strings of the devices currently attached, e.g.
    /// `["rtl=0", "rtl=1"]`. Backends without discovery return nothing.
    fn discover(&self) -> Vec<String>;

    /// Construct a device. `descriptor.as_args()` is the full group text,
    /// so backend specific parameters are available.
    fn create(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn SourceDevice>, SourceError>;
}
