//! Core domain types and logic.

pub mod bar;
pub mod bar_buffer;
pub mod tick;
pub mod indicator;
pub mod position;
pub mod order;
pub mod contract;
pub mod instrument;
pub mod session;
pub mod snapshot;
pub mod decision;
pub mod intent;
pub mod settle;
pub mod trader_config;
pub mod config_validation;
pub mod cycle;
pub mod schedule;
pub mod error;
