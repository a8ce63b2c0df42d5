//! sartrader: single-instrument position manager that enters long on a
//! regression/EMA trend signal and trails a parabolic stop.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
