//! Port traits the domain depends on.

pub mod broker_port;
pub mod clock_port;
pub mod config_port;
