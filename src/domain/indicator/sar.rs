//! Extended parabolic stop-and-reverse.
//!
//! Output is signed: positive while the stop trails under a rising market,
//! negative while it sits above a falling one. The first bar is invalid; it
//! only seeds the initial direction and extreme point.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

/// Acceleration settings for the long and short regimes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarParams {
    /// 0 detects the initial direction from the first two bars, >0 starts long
    /// at that level, <0 starts short at its absolute value.
    pub start_value: f64,
    /// Fraction added (short) or removed (long) from the stop on reversal.
    pub offset_on_reverse: f64,
    pub accel_init_long: f64,
    pub accel_long: f64,
    pub accel_max_long: f64,
    pub accel_init_short: f64,
    pub accel_short: f64,
    pub accel_max_short: f64,
}

impl Default for SarParams {
    fn default() -> Self {
        SarParams {
            start_value: 0.0,
            offset_on_reverse: 0.0,
            accel_init_long: 0.02,
            accel_long: 0.02,
            accel_max_long: 0.20,
            accel_init_short: 0.02,
            accel_short: 0.02,
            accel_max_short: 0.20,
        }
    }
}

pub fn calculate_sar(bars: &[Bar], params: &SarParams) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    if bars.len() < 2 {
        values.extend(bars.iter().map(|b| IndicatorPoint::warming_up(b.timestamp)));
        return IndicatorSeries {
            indicator_type: IndicatorType::Sar,
            values,
        };
    }

    let init_long = params.accel_init_long.min(params.accel_max_long);
    let step_long = params.accel_long.min(params.accel_max_long);
    let init_short = params.accel_init_short.min(params.accel_max_short);
    let step_short = params.accel_short.min(params.accel_max_short);

    let mut is_long = if params.start_value == 0.0 {
        !first_move_is_down(&bars[0], &bars[1])
    } else {
        params.start_value > 0.0
    };

    let mut ep;
    let mut sar;
    if params.start_value == 0.0 {
        if is_long {
            ep = bars[1].high;
            sar = bars[0].low;
        } else {
            ep = bars[1].low;
            sar = bars[0].high;
        }
    } else if params.start_value > 0.0 {
        ep = bars[1].high;
        sar = params.start_value;
    } else {
        ep = bars[1].low;
        sar = params.start_value.abs();
    }

    let mut af_long = init_long;
    let mut af_short = init_short;
    let mut new_low = bars[1].low;
    let mut new_high = bars[1].high;

    values.push(IndicatorPoint::warming_up(bars[0].timestamp));

    for bar in &bars[1..] {
        let prev_low = new_low;
        let prev_high = new_high;
        new_low = bar.low;
        new_high = bar.high;

        let output;
        if is_long {
            if new_low <= sar {
                // Reverse to short.
                is_long = false;
                sar = ep.max(prev_high).max(new_high);
                if params.offset_on_reverse != 0.0 {
                    sar += sar * params.offset_on_reverse;
                }
                output = -sar;

                af_short = init_short;
                ep = new_low;
                sar += af_short * (ep - sar);
                sar = sar.max(prev_high).max(new_high);
            } else {
                output = sar;

                if new_high > ep {
                    ep = new_high;
                    af_long = (af_long + step_long).min(params.accel_max_long);
                }
                sar += af_long * (ep - sar);
                sar = sar.min(prev_low).min(new_low);
            }
        } else if new_high >= sar {
            // Reverse to long.
            is_long = true;
            sar = ep.min(prev_low).min(new_low);
            if params.offset_on_reverse != 0.0 {
                sar -= sar * params.offset_on_reverse;
            }
            output = sar;

            af_long = init_long;
            ep = new_high;
            sar += af_long * (ep - sar);
            sar = sar.min(prev_low).min(new_low);
        } else {
            output = -sar;

            if new_low < ep {
                ep = new_low;
                af_short = (af_short + step_short).min(params.accel_max_short);
            }
            sar += af_short * (ep - sar);
            sar = sar.max(prev_high).max(new_high);
        }

        values.push(IndicatorPoint::ready(bar.timestamp, output));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sar,
        values,
    }
}

/// Directional-movement test on the first bar pair: a dominant down move starts short.
fn first_move_is_down(first: &Bar, second: &Bar) -> bool {
    let up_move = second.high - first.high;
    let down_move = first.low - second.low;
    down_move > 0.0 && up_move < down_move
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::ohlc;
    use approx::assert_relative_eq;

    fn rising() -> Vec<Bar> {
        ohlc(&[
            (10.0, 9.0),
            (11.0, 10.0),
            (12.0, 11.0),
            (13.0, 12.0),
            (14.0, 13.0),
        ])
    }

    #[test]
    fn first_bar_is_warmup() {
        let series = calculate_sar(&rising(), &SarParams::default());
        assert!(!series.values[0].valid);
        assert_eq!(series.values.iter().position(|p| p.valid), Some(1));
    }

    #[test]
    fn rising_market_trails_below_lows() {
        let bars = rising();
        let series = calculate_sar(&bars, &SarParams::default());

        // Seeded at the first low, then accelerates toward the new highs.
        assert_relative_eq!(series.value_at(1).unwrap(), 9.0, epsilon = 1e-9);
        // ep 12, af 0.04: 9 + 0.02*(11-9) = 9.04, next 9.04 + 0.04*(12-9.04)
        assert_relative_eq!(series.value_at(2).unwrap(), 9.04, epsilon = 1e-9);
        assert_relative_eq!(series.value_at(3).unwrap(), 9.1584, epsilon = 1e-9);
        for (i, bar) in bars.iter().enumerate().skip(1) {
            let v = series.value_at(i).unwrap();
            assert!(v > 0.0);
            assert!(v < bar.low);
        }
    }

    #[test]
    fn falling_market_starts_short() {
        let bars = ohlc(&[(20.0, 19.0), (19.0, 17.0), (18.0, 16.0), (17.0, 15.0)]);
        let series = calculate_sar(&bars, &SarParams::default());

        assert_relative_eq!(series.value_at(1).unwrap(), -20.0, epsilon = 1e-9);
        for i in 1..bars.len() {
            let v = series.value_at(i).unwrap();
            assert!(v < 0.0);
            assert!(v.abs() > bars[i].high);
        }
    }

    #[test]
    fn breach_reverses_direction() {
        let bars = ohlc(&[
            (10.0, 9.0),
            (11.0, 10.0),
            (12.0, 11.0),
            (12.5, 8.0), // low pierces the trailing stop
            (9.0, 7.0),
        ]);
        let series = calculate_sar(&bars, &SarParams::default());

        assert!(series.value_at(2).unwrap() > 0.0);
        let reversed = series.value_at(3).unwrap();
        assert!(reversed < 0.0);
        // The reversal stop sits at the prior extreme point or above.
        assert!(reversed.abs() >= 12.5);
    }

    #[test]
    fn positive_start_value_forces_long() {
        let bars = ohlc(&[(20.0, 19.0), (19.5, 18.0), (19.8, 18.5)]);
        let params = SarParams {
            start_value: 17.0,
            ..SarParams::default()
        };
        let series = calculate_sar(&bars, &params);
        assert_relative_eq!(series.value_at(1).unwrap(), 17.0, epsilon = 1e-9);
    }

    #[test]
    fn acceleration_is_capped() {
        let bars: Vec<Bar> = ohlc(
            &(0..40)
                .map(|i| (100.0 + i as f64 * 2.0, 99.0 + i as f64 * 2.0))
                .collect::<Vec<_>>(),
        );
        let params = SarParams {
            accel_max_long: 0.06,
            ..SarParams::default()
        };
        let series = calculate_sar(&bars, &params);
        let last = bars.len() - 1;
        // Every step of a capped SAR closes at most 6% of the gap to the extreme point.
        let gap_before = bars[last - 1].high - series.value_at(last - 1).unwrap();
        let moved = series.value_at(last).unwrap() - series.value_at(last - 1).unwrap();
        assert!(moved <= 0.06 * gap_before + 1e-9);
    }

    #[test]
    fn single_bar_has_no_valid_point() {
        let series = calculate_sar(&ohlc(&[(10.0, 9.0)]), &SarParams::default());
        assert_eq!(series.values.len(), 1);
        assert_eq!(series.last_valid(), None);
    }
}
