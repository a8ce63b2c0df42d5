//! Price rounding.
//!
//! Ties round to even so 4505.125 on a quarter-point grid lands on 4505.0.

/// Futures tick: a quarter point.
pub const QUARTER_POINT: f64 = 0.25;

/// Snap `price` to the nearest multiple of `tick` (e.g. quarter points).
pub fn quantize(price: f64, tick: f64) -> f64 {
    if tick <= 0.0 || !price.is_finite() {
        return price;
    }
    (price / tick).round_ties_even() * tick
}

/// Round to a fixed number of decimals; indicator outputs are carried at 3.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}
