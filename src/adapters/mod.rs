//! Concrete adapter implementations for ports.

pub mod clock;
pub mod csv_adapter;
pub mod env_config_adapter;
pub mod file_config_adapter;
pub mod paper_broker;
