pub mod device_backend;
pub mod source_device;
