pub mod channel_state;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod range;
pub mod state;
