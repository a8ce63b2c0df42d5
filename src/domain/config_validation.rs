//! Configuration validation.
//!
//! Every key is checked before the trading loop starts; a missing key falls
//! back to its default, so only present-but-wrong values fail here (plus the
//! paper data file, which has no default). A present value that does not
//! parse as its type is wrong: the typed getters would otherwise quietly
//! substitute the default.

use crate::domain::contract::{parse_bar_size, parse_lookback};
use crate::domain::error::TraderError;
use crate::domain::instrument::parse_symbols;
use crate::ports::config_port::{ConfigPort, parse_bool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Number,
    Flag,
}

/// Every key the trader reads, with the type its value must parse as.
pub const KNOWN_KEYS: &[(&str, &str, ValueKind)] = &[
    ("instrument", "symbols", ValueKind::Text),
    ("instrument", "sec_type", ValueKind::Text),
    ("instrument", "expiry", ValueKind::Text),
    ("instrument", "exchange", ValueKind::Text),
    ("instrument", "currency", ValueKind::Text),
    ("data", "lookback", ValueKind::Text),
    ("data", "bar_size", ValueKind::Text),
    ("data", "what_to_show", ValueKind::Text),
    ("data", "regular_hours_only", ValueKind::Flag),
    ("indicators", "regression_period", ValueKind::Integer),
    ("indicators", "ema_period", ValueKind::Integer),
    ("indicators", "sar_start_value", ValueKind::Number),
    ("indicators", "sar_offset_on_reverse", ValueKind::Number),
    ("indicators", "sar_accel_init_long", ValueKind::Number),
    ("indicators", "sar_accel_long", ValueKind::Number),
    ("indicators", "sar_accel_max_long", ValueKind::Number),
    ("indicators", "sar_accel_init_short", ValueKind::Number),
    ("indicators", "sar_accel_short", ValueKind::Number),
    ("indicators", "sar_accel_max_short", ValueKind::Number),
    ("trading", "quantity", ValueKind::Integer),
    ("trading", "tick_size", ValueKind::Number),
    ("trading", "entry_premium", ValueKind::Number),
    ("schedule", "interval_minutes", ValueKind::Number),
    ("schedule", "timeout_hours", ValueKind::Number),
    ("session", "positions", ValueKind::Number),
    ("session", "orders", ValueKind::Number),
    ("session", "bars", ValueKind::Number),
    ("session", "order_id", ValueKind::Number),
    ("session", "submit", ValueKind::Number),
    ("session", "cancel", ValueKind::Number),
    ("session", "poll_millis", ValueKind::Integer),
    ("broker", "mode", ValueKind::Text),
    ("broker", "paper_data", ValueKind::Text),
    ("broker", "paper_start_bars", ValueKind::Integer),
    ("broker", "account", ValueKind::Text),
];

/// `(section, key)` pairs of [`KNOWN_KEYS`].
pub fn known_keys() -> Vec<(&'static str, &'static str)> {
    KNOWN_KEYS.iter().map(|(s, k, _)| (*s, *k)).collect()
}

pub fn is_known_section(section: &str) -> bool {
    KNOWN_KEYS.iter().any(|(s, _, _)| s.eq_ignore_ascii_case(section))
}

pub fn validate_trader_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_value_types(config)?;
    validate_instrument(config)?;
    validate_data(config)?;
    validate_indicators(config)?;
    validate_trading(config)?;
    validate_schedule(config)?;
    validate_session(config)?;
    validate_broker(config)?;
    Ok(())
}

fn validate_value_types(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for &(section, key, kind) in KNOWN_KEYS {
        let Some(raw) = config.get_string(section, key) else {
            continue;
        };
        let value = raw.trim();
        let expected = match kind {
            ValueKind::Text => continue,
            ValueKind::Integer if value.parse::<i64>().is_err() => "a whole number",
            ValueKind::Number if value.parse::<f64>().is_err() => "a number",
            ValueKind::Flag if parse_bool(value).is_none() => "true or false",
            _ => continue,
        };
        return Err(TraderError::invalid(
            section,
            key,
            format!("{key} must be {expected}, got '{value}'"),
        ));
    }
    Ok(())
}

fn validate_instrument(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let symbols = config.get_string_or("instrument", "symbols", "MES");
    parse_symbols(&symbols).map_err(|e| TraderError::invalid("instrument", "symbols", e.to_string()))?;

    for key in ["sec_type", "expiry", "exchange", "currency"] {
        if let Some(value) = config.get_string("instrument", key) {
            if value.trim().is_empty() {
                return Err(TraderError::invalid("instrument", key, format!("{key} must not be empty")));
            }
        }
    }
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let lookback = config.get_string_or("data", "lookback", "2 D");
    if parse_lookback(&lookback).is_none() {
        return Err(TraderError::invalid(
            "data",
            "lookback",
            format!("cannot parse duration '{lookback}' (expected e.g. '2 D')"),
        ));
    }
    let bar_size = config.get_string_or("data", "bar_size", "5 mins");
    if parse_bar_size(&bar_size).is_none() {
        return Err(TraderError::invalid(
            "data",
            "bar_size",
            format!("cannot parse bar size '{bar_size}' (expected e.g. '5 mins')"),
        ));
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_int("indicators", "regression_period", 9) < 2 {
        return Err(TraderError::invalid(
            "indicators",
            "regression_period",
            "regression_period must be at least 2",
        ));
    }
    if config.get_int("indicators", "ema_period", 21) < 1 {
        return Err(TraderError::invalid(
            "indicators",
            "ema_period",
            "ema_period must be positive",
        ));
    }
    if config.get_double("indicators", "sar_offset_on_reverse", 0.0) < 0.0 {
        return Err(TraderError::invalid(
            "indicators",
            "sar_offset_on_reverse",
            "sar_offset_on_reverse must be non-negative",
        ));
    }
    validate_acceleration(config, "long")?;
    validate_acceleration(config, "short")?;
    Ok(())
}

fn validate_acceleration(config: &dyn ConfigPort, side: &str) -> Result<(), TraderError> {
    let init_key = format!("sar_accel_init_{side}");
    let step_key = format!("sar_accel_{side}");
    let max_key = format!("sar_accel_max_{side}");
    let init = config.get_double("indicators", &init_key, 0.02);
    let step = config.get_double("indicators", &step_key, 0.02);
    let max = config.get_double("indicators", &max_key, 0.20);

    if !(init > 0.0) {
        return Err(TraderError::invalid("indicators", &init_key, format!("{init_key} must be positive")));
    }
    if !(step > 0.0) {
        return Err(TraderError::invalid("indicators", &step_key, format!("{step_key} must be positive")));
    }
    if init > max {
        return Err(TraderError::invalid(
            "indicators",
            &max_key,
            format!("{max_key} must be at least {init_key}"),
        ));
    }
    Ok(())
}

fn validate_trading(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_int("trading", "quantity", 1) < 0 {
        return Err(TraderError::invalid("trading", "quantity", "quantity must be non-negative"));
    }
    let tick = config.get_double("trading", "tick_size", 0.25);
    if !(tick > 0.0) || !tick.is_finite() {
        return Err(TraderError::invalid("trading", "tick_size", "tick_size must be positive"));
    }
    // Quantizing is exact, and so idempotent, only for binary fractions.
    if tick.log2().fract() != 0.0 {
        return Err(TraderError::invalid(
            "trading",
            "tick_size",
            format!("tick_size must be a power of two (0.25, 0.5, 1, ...), got {tick}"),
        ));
    }
    let premium = config.get_double("trading", "entry_premium", 0.5);
    if !premium.is_finite() || premium < 0.0 {
        return Err(TraderError::invalid(
            "trading",
            "entry_premium",
            "entry_premium must be non-negative",
        ));
    }
    Ok(())
}

fn validate_schedule(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if !(config.get_double("schedule", "interval_minutes", 5.0) > 0.0) {
        return Err(TraderError::invalid(
            "schedule",
            "interval_minutes",
            "interval_minutes must be positive",
        ));
    }
    if !(config.get_double("schedule", "timeout_hours", 23.0) > 0.0) {
        return Err(TraderError::invalid(
            "schedule",
            "timeout_hours",
            "timeout_hours must be positive",
        ));
    }
    Ok(())
}

fn validate_session(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in ["positions", "orders", "bars", "order_id", "submit", "cancel"] {
        let value = config.get_double("session", key, 0.0);
        if !value.is_finite() || value < 0.0 {
            return Err(TraderError::invalid("session", key, format!("{key} must be non-negative seconds")));
        }
    }
    if config.get_int("session", "poll_millis", 50) < 1 {
        return Err(TraderError::invalid("session", "poll_millis", "poll_millis must be positive"));
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let mode = config.get_string_or("broker", "mode", "paper");
    if !mode.eq_ignore_ascii_case("paper") {
        return Err(TraderError::invalid(
            "broker",
            "mode",
            format!("unsupported broker mode '{mode}' (expected 'paper')"),
        ));
    }
    match config.get_string("broker", "paper_data") {
        Some(path) if !path.trim().is_empty() => Ok(()),
        _ => Err(TraderError::ConfigMissing {
            section: "broker".to_string(),
            key: "paper_data".to_string(),
        }),
    }
}
