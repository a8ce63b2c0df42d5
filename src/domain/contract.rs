//! Instrument definition and historical-data request vocabulary.

use chrono::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub symbol: String,
    pub sec_type: String,
    /// Contract month, e.g. `202209`.
    pub expiry: String,
    pub exchange: String,
    pub currency: String,
}

impl Contract {
    pub fn future(symbol: &str, expiry: &str, exchange: &str, currency: &str) -> Self {
        Contract {
            symbol: symbol.to_string(),
            sec_type: "FUT".to_string(),
            expiry: expiry.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
        }
    }
}

/// One historical-bar request. `req_id` keys the bars in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRequest {
    pub req_id: u32,
    pub contract: Contract,
    /// Broker duration string, e.g. `2 D`.
    pub lookback: String,
    /// Broker bar-size string, e.g. `5 mins`.
    pub bar_size: String,
    pub what_to_show: String,
    pub regular_hours_only: bool,
}

/// Parse a broker duration such as `2 D`, `3600 S`, `1 W`.
pub fn parse_lookback(value: &str) -> Option<Duration> {
    let mut parts = value.split_whitespace();
    let count: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() || count <= 0 {
        return None;
    }
    match unit.to_uppercase().as_str() {
        "S" => Some(Duration::seconds(count)),
        "D" => Some(Duration::days(count)),
        "W" => Some(Duration::weeks(count)),
        "M" => Some(Duration::days(30 * count)),
        "Y" => Some(Duration::days(365 * count)),
        _ => None,
    }
}

/// Parse a broker bar size such as `5 mins`, `1 hour`, `30 secs`, `1 day`.
pub fn parse_bar_size(value: &str) -> Option<Duration> {
    let mut parts = value.split_whitespace();
    let count: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() || count <= 0 {
        return None;
    }
    match unit.to_lowercase().as_str() {
        "sec" | "secs" => Some(Duration::seconds(count)),
        "min" | "mins" => Some(Duration::minutes(count)),
        "hour" | "hours" => Some(Duration::hours(count)),
        "day" => Some(Duration::days(count)),
        "week" => Some(Duration::weeks(count)),
        _ => None,
    }
}

/// Number of bars a request of `lookback` at `bar_size` replays, if both parse.
pub fn bars_in_lookback(lookback: &str, bar_size: &str) -> Option<usize> {
    let lookback = parse_lookback(lookback)?;
    let bar = parse_bar_size(bar_size)?;
    let count = lookback.num_seconds() / bar.num_seconds();
    usize::try_from(count).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_contract_fields() {
        let c = Contract::future("MES", "202209", "GLOBEX", "USD");
        assert_eq!(c.sec_type, "FUT");
        assert_eq!(c.expiry, "202209");
    }

    #[test]
    fn parse_lookback_units() {
        assert_eq!(parse_lookback("2 D"), Some(Duration::days(2)));
        assert_eq!(parse_lookback("3600 S"), Some(Duration::seconds(3600)));
        assert_eq!(parse_lookback("1 W"), Some(Duration::weeks(1)));
        assert_eq!(parse_lookback("2 d"), Some(Duration::days(2)));
    }

    #[test]
    fn parse_lookback_rejects_garbage() {
        assert_eq!(parse_lookback("D 2"), None);
        assert_eq!(parse_lookback("2"), None);
        assert_eq!(parse_lookback("0 D"), None);
        assert_eq!(parse_lookback("2 D extra"), None);
        assert_eq!(parse_lookback("2 Q"), None);
    }

    #[test]
    fn parse_bar_size_units() {
        assert_eq!(parse_bar_size("5 mins"), Some(Duration::minutes(5)));
        assert_eq!(parse_bar_size("1 min"), Some(Duration::minutes(1)));
        assert_eq!(parse_bar_size("1 hour"), Some(Duration::hours(1)));
        assert_eq!(parse_bar_size("30 secs"), Some(Duration::seconds(30)));
        assert_eq!(parse_bar_size("5 minutes"), None);
    }

    #[test]
    fn two_days_of_five_minute_bars() {
        assert_eq!(bars_in_lookback("2 D", "5 mins"), Some(576));
        assert_eq!(bars_in_lookback("2 D", "nonsense"), None);
    }
}
