//! Technical indicators and the per-cycle indicator snapshot.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values aligned to the input bars
//! - `compute`: derives an `IndicatorSnapshot` from the newest fully warmed-up bar

pub mod ema;
pub mod linreg;
pub mod sar;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::bar::Bar;
use crate::domain::tick::round_to;
use ema::calculate_ema;
use linreg::calculate_linreg;
pub use sar::SarParams;
use sar::calculate_sar;

/// Indicator outputs are carried at this many decimals before any tick rounding.
pub const OUTPUT_DECIMALS: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn warming_up(timestamp: NaiveDateTime) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value: 0.0,
        }
    }

    pub fn ready(timestamp: NaiveDateTime, value: f64) -> Self {
        IndicatorPoint {
            timestamp,
            valid: true,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    LinearRegression(usize),
    LinearRegressionSlope(usize),
    Sar,
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::LinearRegression(period) => write!(f, "LINREG({})", period),
            IndicatorType::LinearRegressionSlope(period) => write!(f, "LINREG_SLOPE({})", period),
            IndicatorType::Sar => write!(f, "SAREXT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    pub fn last_valid(&self) -> Option<f64> {
        self.values.last().filter(|p| p.valid).map(|p| p.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDirection {
    Up,
    Down,
}

impl StopDirection {
    fn of_signed(value: f64) -> Self {
        if value > 0.0 {
            StopDirection::Up
        } else {
            StopDirection::Down
        }
    }
}

impl fmt::Display for StopDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopDirection::Up => write!(f, "up"),
            StopDirection::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub regression_period: usize,
    pub ema_period: usize,
    pub sar: SarParams,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            regression_period: 9,
            ema_period: 21,
            sar: SarParams::default(),
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every series is valid at the newest bar and the
    /// stop series also has a prior value.
    pub fn warmup_bars(&self) -> usize {
        self.regression_period.max(self.ema_period).max(2)
    }
}

/// Indicator state at the newest bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub trend_value: f64,
    pub trend_slope: f64,
    pub smoothed_average: f64,
    /// Always positive; the regime lives in `stop_direction`.
    pub stop_level: f64,
    pub stop_direction: StopDirection,
    /// Stop level one bar earlier, used when no earlier cycle was observed.
    pub prior_stop_level: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("insufficient history: have {bars} bars, need {required}")]
pub struct InsufficientHistory {
    pub bars: usize,
    pub required: usize,
}

/// Compute the snapshot for the newest bar. Returns `InsufficientHistory`
/// rather than a partial snapshot while any series is still warming up.
pub fn compute(
    bars: &[Bar],
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, InsufficientHistory> {
    let required = params.warmup_bars();
    let insufficient = InsufficientHistory {
        bars: bars.len(),
        required,
    };
    if bars.len() < required {
        return Err(insufficient);
    }

    let reg = calculate_linreg(bars, params.regression_period);
    let ema = calculate_ema(bars, params.ema_period);
    let sar = calculate_sar(bars, &params.sar);

    let last = bars.len() - 1;
    let (Some(trend_value), Some(trend_slope), Some(smoothed_average), Some(stop), Some(prior)) = (
        reg.value.last_valid(),
        reg.slope.last_valid(),
        ema.last_valid(),
        sar.last_valid(),
        sar.value_at(last - 1),
    ) else {
        return Err(insufficient);
    };

    let snapshot = IndicatorSnapshot {
        timestamp: bars[last].timestamp,
        trend_value: round_to(trend_value, OUTPUT_DECIMALS),
        trend_slope,
        smoothed_average: round_to(smoothed_average, OUTPUT_DECIMALS),
        stop_level: round_to(stop.abs(), OUTPUT_DECIMALS),
        stop_direction: StopDirection::of_signed(stop),
        prior_stop_level: round_to(prior.abs(), OUTPUT_DECIMALS),
    };

    let fields = [
        snapshot.trend_value,
        snapshot.trend_slope,
        snapshot.smoothed_average,
        snapshot.stop_level,
        snapshot.prior_stop_level,
    ];
    if fields.iter().any(|v| !v.is_finite()) {
        return Err(insufficient);
    }

    log::debug!(
        "stop levels (last {}): {:?}",
        sar.values.len().min(10),
        sar.values
            .iter()
            .rev()
            .take(10)
            .filter(|p| p.valid)
            .map(|p| p.value)
            .collect::<Vec<_>>()
    );

    Ok(snapshot)
}
