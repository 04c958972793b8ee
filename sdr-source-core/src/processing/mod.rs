pub mod fan_out;
pub mod iq_balance;
pub mod noise;
pub mod ring_buffer;
pub mod throttle;
