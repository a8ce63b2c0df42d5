//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::clock::SystemClock;
use crate::adapters::csv_adapter::{CsvAdapter, read_bars};
use crate::adapters::env_config_adapter::EnvConfigAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::{PaperGateway, PaperOptions};
use crate::domain::config_validation::{is_known_section, known_keys, validate_trader_config};
use crate::domain::cycle::{CycleReport, SymbolOutcome, Trader};
use crate::domain::decision::DecisionParams;
use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorParams, IndicatorSnapshot, SarParams, compute};
use crate::domain::instrument::{ContractTemplate, parse_symbols};
use crate::domain::schedule::run_schedule;
use crate::domain::settle::SettleTimeouts;
use crate::domain::trader_config::{
    BrokerMode, BrokerSettings, DataSettings, ScheduleSettings, TraderConfig,
};
use crate::ports::broker_port::BrokerGateway;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(
    name = "sartrader",
    about = "Trend-following position manager with a trailing parabolic stop"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Trade only these symbols (comma list)
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        quantity: Option<i64>,
        #[arg(long)]
        interval_minutes: Option<f64>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the latest indicator values for a CSV bar file
    Indicators {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        bars: PathBuf,
    },
}

/// Command-line values that take precedence over the file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub quantity: Option<i64>,
    pub interval_minutes: Option<f64>,
    pub once: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            symbol,
            quantity,
            interval_minutes,
            once,
        } => {
            let overrides = Overrides {
                symbol,
                quantity,
                interval_minutes,
                once,
            };
            run_trader(&config, &overrides)
        }
        Command::Validate { config } => run_validate(&config),
        Command::Indicators { config, bars } => run_indicators(config.as_deref(), &bars),
    }
}

/// INI file with the `SARTRADER_*` environment overlaid.
pub fn load_config(path: &Path) -> Result<EnvConfigAdapter<FileConfigAdapter>, TraderError> {
    let file = FileConfigAdapter::from_file(path)?;
    for section in file.sections() {
        if !is_known_section(&section) {
            log::warn!("ignoring unknown config section [{}]", section);
        }
    }
    let adapter = EnvConfigAdapter::from_env(file);
    let known = known_keys();
    for (section, key) in adapter.overridden_keys(&known) {
        log::info!("config override from environment: [{}] {}", section, key);
    }
    for name in adapter.unrecognized_variables(&known) {
        log::warn!("ignoring {}: it names no config key", name);
    }
    Ok(adapter)
}

/// Load, validate, build and apply overrides in one step.
pub fn resolve_config(path: &Path, overrides: &Overrides) -> Result<TraderConfig, TraderError> {
    log::info!("loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_trader_config(&adapter)?;
    let mut config = build_trader_config(&adapter)?;
    apply_overrides(&mut config, overrides)?;
    Ok(config)
}

fn run_trader(config_path: &Path, overrides: &Overrides) -> ExitCode {
    let config = match resolve_config(config_path, overrides) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    let gateway = match open_gateway(&config) {
        Ok(g) => g,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    log::info!(
        "trading {} every {:?} for up to {:?} via {} gateway",
        config.symbols().join(", "),
        config.schedule.interval,
        config.schedule.timeout,
        gateway.name()
    );

    let clock = SystemClock::new();
    let schedule = config.schedule.clone();
    let mut trader = Trader::new(config);
    let mut last_report: Option<CycleReport> = None;
    let cycles = run_schedule(&clock, &schedule, &mut |_| {
        last_report = Some(trader.run_cycle(&gateway, &clock));
    });
    log::info!("trading loop finished after {} cycle(s)", cycles);

    if schedule.once {
        if let Some(err) = last_report.as_ref().and_then(first_failure) {
            return err.into();
        }
    }
    ExitCode::SUCCESS
}

fn first_failure(report: &CycleReport) -> Option<&TraderError> {
    report.symbols.iter().find_map(|r| match &r.outcome {
        SymbolOutcome::Failed(e) => Some(e),
        _ => None,
    })
}

pub fn open_gateway(config: &TraderConfig) -> Result<PaperGateway, TraderError> {
    match config.broker.mode {
        BrokerMode::Paper => {
            let path = config
                .broker
                .paper_data
                .clone()
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "broker".to_string(),
                    key: "paper_data".to_string(),
                })?;
            if !path.exists() {
                return Err(TraderError::Data {
                    reason: format!("paper data {} does not exist", path.display()),
                });
            }
            let capacity = config.bar_capacity();
            let options = PaperOptions {
                account: config.broker.account.clone(),
                initial_bars: config.broker.paper_start_bars.unwrap_or(capacity),
            };
            Ok(PaperGateway::new(CsvAdapter::new(path), options, capacity))
        }
    }
}

pub fn build_trader_config(adapter: &dyn ConfigPort) -> Result<TraderConfig, TraderError> {
    let symbols = parse_symbols(&adapter.get_string_or("instrument", "symbols", "MES"))
        .map_err(|e| TraderError::invalid("instrument", "symbols", e.to_string()))?;
    let template = ContractTemplate {
        sec_type: adapter.get_string_or("instrument", "sec_type", "FUT"),
        expiry: adapter.get_string_or("instrument", "expiry", "202209"),
        exchange: adapter.get_string_or("instrument", "exchange", "GLOBEX"),
        currency: adapter.get_string_or("instrument", "currency", "USD"),
    };

    let data = DataSettings {
        lookback: adapter.get_string_or("data", "lookback", "2 D"),
        bar_size: adapter.get_string_or("data", "bar_size", "5 mins"),
        what_to_show: adapter.get_string_or("data", "what_to_show", "ADJUSTED_LAST"),
        regular_hours_only: adapter.get_bool("data", "regular_hours_only", false),
    };

    let sar_defaults = SarParams::default();
    let indicators = IndicatorParams {
        regression_period: get_usize(adapter, "indicators", "regression_period", 9)?,
        ema_period: get_usize(adapter, "indicators", "ema_period", 21)?,
        sar: SarParams {
            start_value: adapter.get_double("indicators", "sar_start_value", sar_defaults.start_value),
            offset_on_reverse: adapter.get_double(
                "indicators",
                "sar_offset_on_reverse",
                sar_defaults.offset_on_reverse,
            ),
            accel_init_long: adapter.get_double(
                "indicators",
                "sar_accel_init_long",
                sar_defaults.accel_init_long,
            ),
            accel_long: adapter.get_double("indicators", "sar_accel_long", sar_defaults.accel_long),
            accel_max_long: adapter.get_double(
                "indicators",
                "sar_accel_max_long",
                sar_defaults.accel_max_long,
            ),
            accel_init_short: adapter.get_double(
                "indicators",
                "sar_accel_init_short",
                sar_defaults.accel_init_short,
            ),
            accel_short: adapter.get_double("indicators", "sar_accel_short", sar_defaults.accel_short),
            accel_max_short: adapter.get_double(
                "indicators",
                "sar_accel_max_short",
                sar_defaults.accel_max_short,
            ),
        },
    };

    let decision_defaults = DecisionParams::default();
    let decision = DecisionParams {
        quantity: adapter.get_int("trading", "quantity", decision_defaults.quantity),
        tick_size: adapter.get_double("trading", "tick_size", decision_defaults.tick_size),
        entry_premium: adapter.get_double("trading", "entry_premium", decision_defaults.entry_premium),
    };

    let schedule = ScheduleSettings {
        interval: get_seconds(adapter, "schedule", "interval_minutes", 5.0, 60.0)?,
        timeout: get_seconds(adapter, "schedule", "timeout_hours", 23.0, 3600.0)?,
        once: false,
    };

    let settle_defaults = SettleTimeouts::default();
    let settle = SettleTimeouts {
        positions: get_seconds(adapter, "session", "positions", settle_defaults.positions.as_secs_f64(), 1.0)?,
        orders: get_seconds(adapter, "session", "orders", settle_defaults.orders.as_secs_f64(), 1.0)?,
        bars: get_seconds(adapter, "session", "bars", settle_defaults.bars.as_secs_f64(), 1.0)?,
        order_id: get_seconds(adapter, "session", "order_id", settle_defaults.order_id.as_secs_f64(), 1.0)?,
        submit: get_seconds(adapter, "session", "submit", settle_defaults.submit.as_secs_f64(), 1.0)?,
        cancel: get_seconds(adapter, "session", "cancel", settle_defaults.cancel.as_secs_f64(), 1.0)?,
        poll: Duration::from_millis(
            u64::try_from(adapter.get_int("session", "poll_millis", 50))
                .map_err(|_| TraderError::invalid("session", "poll_millis", "must be positive"))?,
        ),
    };

    let mode = adapter.get_string_or("broker", "mode", "paper");
    let broker = BrokerSettings {
        mode: if mode.eq_ignore_ascii_case("paper") {
            BrokerMode::Paper
        } else {
            return Err(TraderError::invalid(
                "broker",
                "mode",
                format!("unsupported broker mode '{mode}'"),
            ));
        },
        paper_data: adapter
            .get_string("broker", "paper_data")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from),
        paper_start_bars: match adapter.get_string("broker", "paper_start_bars") {
            Some(_) => Some(get_usize(adapter, "broker", "paper_start_bars", 0)?),
            None => None,
        },
        account: adapter.get_string_or("broker", "account", "PAPER"),
    };

    Ok(TraderConfig {
        contracts: template.contracts(&symbols),
        data,
        indicators,
        decision,
        schedule,
        settle,
        broker,
    })
}

fn get_usize(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TraderError> {
    let fallback = i64::try_from(default).unwrap_or(i64::MAX);
    usize::try_from(adapter.get_int(section, key, fallback))
        .map_err(|_| TraderError::invalid(section, key, format!("{key} must be non-negative")))
}

/// A non-negative count of `scale`-second units as a duration.
fn get_seconds(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
    scale: f64,
) -> Result<Duration, TraderError> {
    let value = adapter.get_double(section, key, default);
    Duration::try_from_secs_f64(value * scale)
        .map_err(|_| TraderError::invalid(section, key, format!("{key} must be a non-negative number")))
}

pub fn apply_overrides(config: &mut TraderConfig, overrides: &Overrides) -> Result<(), TraderError> {
    if let Some(symbols) = &overrides.symbol {
        let symbols = parse_symbols(symbols)
            .map_err(|e| TraderError::invalid("instrument", "symbols", e.to_string()))?;
        let template = config
            .contracts
            .first()
            .map(|c| ContractTemplate {
                sec_type: c.sec_type.clone(),
                expiry: c.expiry.clone(),
                exchange: c.exchange.clone(),
                currency: c.currency.clone(),
            })
            .ok_or_else(|| TraderError::invalid("instrument", "symbols", "no contract configured"))?;
        config.contracts = template.contracts(&symbols);
    }
    if let Some(quantity) = overrides.quantity {
        if quantity < 0 {
            return Err(TraderError::invalid("trading", "quantity", "quantity must be non-negative"));
        }
        config.decision.quantity = quantity;
    }
    if let Some(minutes) = overrides.interval_minutes {
        config.schedule.interval = Duration::try_from_secs_f64(minutes * 60.0)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                TraderError::invalid("schedule", "interval_minutes", "interval_minutes must be positive")
            })?;
    }
    if overrides.once {
        config.schedule.once = true;
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> ExitCode {
    match resolve_config(config_path, &Overrides::default()) {
        Ok(config) => {
            println!("symbols:    {}", config.symbols().join(", "));
            for contract in &config.contracts {
                println!(
                    "contract:   {} {} {} {} {}",
                    contract.symbol, contract.sec_type, contract.expiry, contract.exchange, contract.currency
                );
            }
            println!(
                "data:       {} of {} ({}, rth only: {})",
                config.data.lookback, config.data.bar_size, config.data.what_to_show, config.data.regular_hours_only
            );
            println!(
                "indicators: LINREG({}) EMA({}) SAREXT, warm-up {} bars, buffer {} bars",
                config.indicators.regression_period,
                config.indicators.ema_period,
                config.indicators.warmup_bars(),
                config.bar_capacity()
            );
            println!(
                "trading:    quantity {}, tick {}, entry premium {}",
                config.decision.quantity, config.decision.tick_size, config.decision.entry_premium
            );
            println!(
                "schedule:   every {:?}, timeout {:?}",
                config.schedule.interval, config.schedule.timeout
            );
            log::info!("configuration is valid");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            (&e).into()
        }
    }
}

/// Latest indicator snapshot for a bar file.
pub fn indicators_for_file(
    params: &IndicatorParams,
    bars_path: &Path,
) -> Result<IndicatorSnapshot, TraderError> {
    let bars = read_bars(bars_path)?;
    compute(&bars, params).map_err(|e| TraderError::InsufficientHistory {
        symbol: bars_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        bars: e.bars,
        required: e.required,
    })
}

fn run_indicators(config_path: Option<&Path>, bars_path: &Path) -> ExitCode {
    let params = match config_path {
        Some(path) => match load_config(path).and_then(|a| build_trader_config(&a)) {
            Ok(c) => c.indicators,
            Err(e) => {
                log::error!("{e}");
                return (&e).into();
            }
        },
        None => IndicatorParams::default(),
    };

    match indicators_for_file(&params, bars_path) {
        Ok(snapshot) => {
            println!("bar:        {}", snapshot.timestamp);
            println!("LINREG({}):  {}", params.regression_period, snapshot.trend_value);
            println!("slope:      {}", snapshot.trend_slope);
            println!("EMA({}):    {}", params.ema_period, snapshot.smoothed_average);
            println!("SAREXT:     {} ({})", snapshot.stop_level, snapshot.stop_direction);
            println!("prior stop: {}", snapshot.prior_stop_level);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            (&e).into()
        }
    }
}
