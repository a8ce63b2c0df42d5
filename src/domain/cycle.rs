//! One polling cycle: acquire snapshots, compute, decide, execute.
//!
//! Order within a cycle is fixed: positions, then open orders, then per symbol
//! bars -> indicators -> decision -> orders. Failures are confined to the
//! symbol they occur in and reported, never propagated.

use std::collections::HashMap;
use std::fmt;

use crate::domain::contract::Contract;
use crate::domain::decision::{Decision, DecisionInput, decide};
use crate::domain::error::TraderError;
use crate::domain::indicator::compute;
use crate::domain::intent::{ExecutedCommand, OrderExecutor};
use crate::domain::order::OpenOrder;
use crate::domain::settle::wait_until;
use crate::domain::snapshot::BrokerSnapshot;
use crate::domain::trader_config::TraderConfig;
use crate::ports::broker_port::BrokerGateway;
use crate::ports::clock_port::Clock;

#[derive(Debug)]
pub enum SymbolOutcome {
    Executed {
        decision: Decision,
        orders: Vec<ExecutedCommand>,
    },
    /// Non-fatal; retried next cycle.
    Skipped(TraderError),
    Failed(TraderError),
}

#[derive(Debug)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub positions_settled: bool,
    pub orders_settled: bool,
    pub symbols: Vec<SymbolReport>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }

    pub fn orders_sent(&self) -> usize {
        self.symbols
            .iter()
            .map(|r| match &r.outcome {
                SymbolOutcome::Executed { orders, .. } => orders.len(),
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {}:", self.cycle)?;
        for report in &self.symbols {
            let status = match &report.outcome {
                SymbolOutcome::Executed { decision, orders } => {
                    format!("{}, {} order command(s)", decision.state, orders.len())
                }
                SymbolOutcome::Skipped(_) => "skipped".to_string(),
                SymbolOutcome::Failed(_) => "failed".to_string(),
            };
            write!(f, " {} [{}]", report.symbol, status)?;
        }
        write!(f, "; {} order command(s) sent", self.orders_sent())
    }
}

pub struct Trader {
    config: TraderConfig,
    previous_stops: HashMap<String, f64>,
    cycles: u64,
}

impl Trader {
    pub fn new(config: TraderConfig) -> Self {
        Self {
            config,
            previous_stops: HashMap::new(),
            cycles: 0,
        }
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    /// Quantized stop level recorded by the last cycle that acted on `symbol`.
    pub fn previous_stop(&self, symbol: &str) -> Option<f64> {
        self.previous_stops.get(symbol).copied()
    }

    pub fn run_cycle(&mut self, gateway: &dyn BrokerGateway, clock: &dyn Clock) -> CycleReport {
        self.cycles += 1;
        log::info!("cycle {} starting against {}", self.cycles, gateway.name());

        let (positions_settled, orders_settled) = self.acquire_account_state(gateway, clock);

        let contracts = self.config.contracts.clone();
        let mut symbols = Vec::with_capacity(contracts.len());
        for (index, contract) in contracts.iter().enumerate() {
            log::info!("starting pass for {}", contract.symbol);
            let req_id = u32::try_from(index).unwrap_or(u32::MAX);
            let outcome = match self.run_symbol(req_id, contract, gateway, clock) {
                Ok((decision, orders)) => SymbolOutcome::Executed { decision, orders },
                Err(err @ TraderError::InsufficientHistory { .. }) => {
                    log::info!("{}: skipped this cycle, {}", contract.symbol, err);
                    SymbolOutcome::Skipped(err)
                }
                Err(err @ TraderError::InputContractViolation { .. }) => {
                    log::error!("{}", err);
                    SymbolOutcome::Failed(err)
                }
                Err(err) => {
                    log::warn!("{}: {}", contract.symbol, err);
                    SymbolOutcome::Failed(err)
                }
            };
            symbols.push(SymbolReport {
                symbol: contract.symbol.clone(),
                outcome,
            });
        }

        for notice in gateway.session().take_notices() {
            log::debug!("notice {} for request {}: {}", notice.code, notice.req_id, notice.message);
        }

        let report = CycleReport {
            cycle: self.cycles,
            positions_settled,
            orders_settled,
            symbols,
        };
        log::info!("{}", report);
        report
    }

    fn acquire_account_state(&self, gateway: &dyn BrokerGateway, clock: &dyn Clock) -> (bool, bool) {
        let session = gateway.session();
        let settle = &self.config.settle;

        session.begin_position_request();
        let positions_settled = match gateway.request_positions() {
            Ok(()) => wait_until(clock, settle.positions, settle.poll, &|| {
                session.positions_complete()
            }),
            Err(e) => {
                log::warn!("position request failed: {}", e);
                false
            }
        };
        if !positions_settled {
            log::warn!("position snapshot not settled; using best available data");
        }

        session.begin_open_order_request();
        let orders_settled = match gateway.request_open_orders() {
            Ok(()) => wait_until(clock, settle.orders, settle.poll, &|| session.orders_complete()),
            Err(e) => {
                log::warn!("open order request failed: {}", e);
                false
            }
        };
        if !orders_settled {
            log::warn!("open order snapshot not settled; using best available data");
        }

        (positions_settled, orders_settled)
    }

    fn run_symbol(
        &mut self,
        req_id: u32,
        contract: &Contract,
        gateway: &dyn BrokerGateway,
        clock: &dyn Clock,
    ) -> Result<(Decision, Vec<ExecutedCommand>), TraderError> {
        let symbol = contract.symbol.as_str();
        let session = gateway.session();
        let settle = &self.config.settle;

        session.begin_bar_request(req_id);
        let request = self.config.bar_request(req_id, contract);
        match gateway.request_bars(&request) {
            Ok(()) => {
                if !wait_until(clock, settle.bars, settle.poll, &|| session.bars_complete(req_id)) {
                    log::warn!("{}: historical data not settled; using best available bars", symbol);
                }
            }
            Err(e) => log::warn!("{}: bar request failed: {}", symbol, e),
        }

        let raw = session.snapshot();
        let broker = BrokerSnapshot::from_session(&raw);
        let bars = raw.bars_for(req_id);
        log::info!(
            "{}: snapshot of {} position row(s), {} order(s), {} bar(s)",
            symbol,
            broker.position_count(),
            broker.order_count(),
            bars.len()
        );

        let indicators =
            compute(bars, &self.config.indicators).map_err(|e| TraderError::InsufficientHistory {
                symbol: symbol.to_string(),
                bars: e.bars,
                required: e.required,
            })?;
        log::info!(
            "{}: dataset {} REG {} (slope {:.4}) EMA {} PSAR {} {}",
            symbol,
            indicators.timestamp,
            indicators.trend_value,
            indicators.trend_slope,
            indicators.smoothed_average,
            indicators.stop_level,
            indicators.stop_direction
        );

        let position = broker.position_for(symbol)?;
        let orders: Vec<OpenOrder> = broker.orders_for(symbol).cloned().collect();
        let working_stop = broker.latest_protective_stop(symbol).map(|o| o.order_id);
        let previous_stop = self.previous_stop(symbol);

        let decision = decide(
            &DecisionInput {
                indicators: &indicators,
                position: &position,
                orders: &orders,
                working_stop,
                previous_stop,
            },
            &self.config.decision,
        )?;
        log::info!(
            "{}: position {} ({}), stop {} (previous {:?})",
            symbol,
            position.quantity,
            decision.state,
            decision.stop_level,
            previous_stop
        );
        if decision.is_no_action() {
            let reasons: Vec<String> = decision.intents.iter().map(ToString::to_string).collect();
            log::info!("{}: holding ({})", symbol, reasons.join("; "));
        } else {
            for intent in &decision.intents {
                log::info!("{}: {}", symbol, intent);
            }
        }

        let executed =
            OrderExecutor::new(gateway, clock, settle).execute(contract, &decision.intents)?;

        // Recorded only once the orders went out, so a failed replacement is retried.
        self.previous_stops
            .insert(symbol.to_string(), decision.stop_level);

        Ok((decision, executed))
    }
}
