//! Resolved runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::contract::{BarRequest, Contract, bars_in_lookback};
use crate::domain::decision::DecisionParams;
use crate::domain::indicator::IndicatorParams;
use crate::domain::settle::SettleTimeouts;

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub lookback: String,
    pub bar_size: String,
    pub what_to_show: String,
    pub regular_hours_only: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        DataSettings {
            lookback: "2 D".to_string(),
            bar_size: "5 mins".to_string(),
            what_to_show: "ADJUSTED_LAST".to_string(),
            regular_hours_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub interval: Duration,
    /// The loop stops starting new cycles once this much time has passed.
    pub timeout: Duration,
    pub once: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            interval: Duration::from_secs(5 * 60),
            timeout: Duration::from_secs(23 * 60 * 60),
            once: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerMode {
    Paper,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub mode: BrokerMode,
    pub paper_data: Option<PathBuf>,
    /// Bars the paper replay reveals on its first request; defaults to the
    /// bar buffer capacity.
    pub paper_start_bars: Option<usize>,
    pub account: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        BrokerSettings {
            mode: BrokerMode::Paper,
            paper_data: None,
            paper_start_bars: None,
            account: "PAPER".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub contracts: Vec<Contract>,
    pub data: DataSettings,
    pub indicators: IndicatorParams,
    pub decision: DecisionParams,
    pub schedule: ScheduleSettings,
    pub settle: SettleTimeouts,
    pub broker: BrokerSettings,
}

impl Default for TraderConfig {
    fn default() -> Self {
        TraderConfig {
            contracts: vec![Contract::future("MES", "202209", "GLOBEX", "USD")],
            data: DataSettings::default(),
            indicators: IndicatorParams::default(),
            decision: DecisionParams::default(),
            schedule: ScheduleSettings::default(),
            settle: SettleTimeouts::default(),
            broker: BrokerSettings::default(),
        }
    }
}

impl TraderConfig {
    /// Bars kept per request: a full lookback replay, and never fewer than the
    /// indicator warm-up.
    pub fn bar_capacity(&self) -> usize {
        let warmup = self.indicators.warmup_bars();
        bars_in_lookback(&self.data.lookback, &self.data.bar_size)
            .unwrap_or(warmup)
            .max(warmup)
    }

    /// Request ids are the contract's position in the configured list.
    pub fn bar_request(&self, req_id: u32, contract: &Contract) -> BarRequest {
        BarRequest {
            req_id,
            contract: contract.clone(),
            lookback: self.data.lookback.clone(),
            bar_size: self.data.bar_size.clone(),
            what_to_show: self.data.what_to_show.clone(),
            regular_hours_only: self.data.regular_hours_only,
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.contracts.iter().map(|c| c.symbol.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_mes_strategy() {
        let c = TraderConfig::default();
        assert_eq!(c.symbols(), vec!["MES"]);
        assert_eq!(c.contracts[0].exchange, "GLOBEX");
        assert_eq!(c.decision.quantity, 1);
        assert_eq!(c.schedule.interval, Duration::from_secs(300));
        assert_eq!(c.schedule.timeout, Duration::from_secs(23 * 3600));
        assert_eq!(c.indicators.regression_period, 9);
        assert_eq!(c.indicators.ema_period, 21);
    }

    #[test]
    fn capacity_covers_full_lookback() {
        assert_eq!(TraderConfig::default().bar_capacity(), 576);
    }

    #[test]
    fn capacity_never_below_warmup() {
        let mut c = TraderConfig::default();
        c.data.lookback = "3600 S".into();
        c.data.bar_size = "5 mins".into();
        assert_eq!(c.bar_capacity(), 21);
    }

    #[test]
    fn bar_request_carries_data_settings() {
        let c = TraderConfig::default();
        let req = c.bar_request(0, &c.contracts[0]);
        assert_eq!(req.req_id, 0);
        assert_eq!(req.lookback, "2 D");
        assert_eq!(req.bar_size, "5 mins");
        assert_eq!(req.what_to_show, "ADJUSTED_LAST");
        assert!(!req.regular_hours_only);
    }
}
