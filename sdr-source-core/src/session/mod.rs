pub mod aggregate;
pub mod channel_map;
pub mod registry;
pub mod stream;
