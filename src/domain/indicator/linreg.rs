//! Least-squares linear regression of close over a trailing window.
//!
//! x runs 0..n-1 oldest to newest. The regression value is the fitted line at
//! the newest bar (a + m*(n-1)), the slope is m. Warmup: first (n-1) bars invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub struct LinearRegression {
    pub value: IndicatorSeries,
    pub slope: IndicatorSeries,
}

pub fn calculate_linreg(bars: &[Bar], period: usize) -> LinearRegression {
    let mut value = Vec::with_capacity(bars.len());
    let mut slope = Vec::with_capacity(bars.len());

    if period > 0 {
        let n = period as f64;
        let sum_x = n * (n - 1.0) / 2.0;
        let sum_x_sqr = n * (n - 1.0) * (2.0 * n - 1.0) / 6.0;
        let divisor = n * sum_x_sqr - sum_x * sum_x;

        for (i, bar) in bars.iter().enumerate() {
            if i + 1 < period {
                value.push(IndicatorPoint::warming_up(bar.timestamp));
                slope.push(IndicatorPoint::warming_up(bar.timestamp));
                continue;
            }

            let window = &bars[i + 1 - period..=i];
            let (sum_y, sum_xy) = window
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(sy, sxy), (x, b)| {
                    (sy + b.close, sxy + x as f64 * b.close)
                });

            // A single-bar window has no slope.
            let m = if divisor == 0.0 {
                0.0
            } else {
                (n * sum_xy - sum_x * sum_y) / divisor
            };
            let a = (sum_y - m * sum_x) / n;

            value.push(IndicatorPoint::ready(bar.timestamp, a + m * (n - 1.0)));
            slope.push(IndicatorPoint::ready(bar.timestamp, m));
        }
    }

    LinearRegression {
        value: IndicatorSeries {
            indicator_type: IndicatorType::LinearRegression(period),
            values: value,
        },
        slope: IndicatorSeries {
            indicator_type: IndicatorType::LinearRegressionSlope(period),
            values: slope,
        },
    }
}
