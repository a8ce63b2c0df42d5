#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use sartrader::domain::bar::Bar;
use sartrader::domain::contract::{BarRequest, Contract};
use sartrader::domain::error::TraderError;
use sartrader::domain::order::{OpenOrder, OrderAction, OrderId, OrderSpec, OrderStatus};
use sartrader::domain::position::PositionState;
use sartrader::domain::session::BrokerSession;
use sartrader::domain::trader_config::TraderConfig;
use sartrader::ports::broker_port::BrokerGateway;
use std::cell::RefCell;
use std::collections::HashMap;

pub use sartrader::adapters::clock::ManualClock;

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 6, 14)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

/// Five-minute bars with the given closes; high/low half a point either side.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start_time() + ChronoDuration::minutes(5 * i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Steady one-point rise: regression above the EMA, stop trailing underneath.
pub fn rising_bars(count: usize, from: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| from + i as f64).collect();
    bars_from_closes(&closes)
}

pub fn falling_bars(count: usize, from: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| from - i as f64).collect();
    bars_from_closes(&closes)
}

pub fn bars_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

pub fn long_position(symbol: &str, quantity: i64) -> PositionState {
    PositionState {
        account: "DU123".to_string(),
        symbol: symbol.to_string(),
        quantity,
        average_cost: 4500.0,
    }
}

pub fn working_stop(order_id: OrderId, symbol: &str, quantity: i64, stop: f64) -> OpenOrder {
    OrderSpec::stop(OrderAction::Sell, quantity, stop).into_open_order(order_id, symbol)
}

pub fn test_config(symbols: &[&str]) -> TraderConfig {
    TraderConfig {
        contracts: symbols
            .iter()
            .map(|s| Contract::future(s, "202209", "GLOBEX", "USD"))
            .collect(),
        ..TraderConfig::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub order_id: OrderId,
    pub symbol: String,
    pub spec: OrderSpec,
}

#[derive(Default)]
struct Script {
    positions: Vec<PositionState>,
    orders: Vec<OpenOrder>,
    bars: HashMap<String, Vec<Bar>>,
    next_id: OrderId,
    silent_positions: bool,
    silent_orders: bool,
    ignore_cancels: bool,
    fail_placements: bool,
    placed: Vec<Placed>,
    cancelled: Vec<OrderId>,
    bar_requests: Vec<BarRequest>,
    calls: Vec<String>,
}

/// Scripted broker: answers every request synchronously through the session.
pub struct FakeGateway {
    session: BrokerSession,
    script: RefCell<Script>,
}

impl FakeGateway {
    pub fn new(config: &TraderConfig) -> Self {
        Self {
            session: BrokerSession::new(config.bar_capacity()),
            script: RefCell::new(Script {
                next_id: 1,
                ..Script::default()
            }),
        }
    }

    pub fn with_position(self, position: PositionState) -> Self {
        self.script.borrow_mut().positions.push(position);
        self
    }

    pub fn with_order(self, order: OpenOrder) -> Self {
        self.script.borrow_mut().orders.push(order);
        self
    }

    pub fn with_bars(self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.set_bars(symbol, bars);
        self
    }

    pub fn with_next_id(self, id: OrderId) -> Self {
        self.script.borrow_mut().next_id = id;
        self
    }

    pub fn silent_positions(self) -> Self {
        self.script.borrow_mut().silent_positions = true;
        self
    }

    pub fn ignoring_cancels(self) -> Self {
        self.script.borrow_mut().ignore_cancels = true;
        self
    }

    pub fn failing_placements(self) -> Self {
        self.script.borrow_mut().fail_placements = true;
        self
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.script.borrow_mut().bars.insert(symbol.to_string(), bars);
    }

    pub fn set_positions(&self, positions: Vec<PositionState>) {
        self.script.borrow_mut().positions = positions;
    }

    pub fn placed(&self) -> Vec<Placed> {
        self.script.borrow().placed.clone()
    }

    pub fn cancelled(&self) -> Vec<OrderId> {
        self.script.borrow().cancelled.clone()
    }

    pub fn bar_requests(&self) -> Vec<BarRequest> {
        self.script.borrow().bar_requests.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.borrow().calls.clone()
    }

    pub fn clear_activity(&self) {
        let mut s = self.script.borrow_mut();
        s.placed.clear();
        s.cancelled.clear();
        s.calls.clear();
    }
}

impl BrokerGateway for FakeGateway {
    fn session(&self) -> &BrokerSession {
        &self.session
    }

    fn request_bars(&self, request: &BarRequest) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(format!("bars:{}", request.contract.symbol));
        s.bar_requests.push(request.clone());
        if let Some(bars) = s.bars.get(&request.contract.symbol) {
            for bar in bars {
                self.session.on_historical_bar(request.req_id, bar.clone());
            }
        }
        self.session.on_historical_data_end(request.req_id);
        Ok(())
    }

    fn request_positions(&self) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push("positions".to_string());
        for p in &s.positions {
            self.session.on_position(p.clone());
        }
        if !s.silent_positions {
            self.session.on_position_end();
        }
        Ok(())
    }

    fn request_open_orders(&self) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push("orders".to_string());
        for o in &s.orders {
            self.session.on_open_order(o.clone());
        }
        if !s.silent_orders {
            self.session.on_open_order_end();
        }
        Ok(())
    }

    fn request_next_order_id(&self) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push("next_id".to_string());
        self.session.on_next_valid_id(s.next_id);
        Ok(())
    }

    fn place_order(
        &self,
        order_id: OrderId,
        contract: &Contract,
        spec: &OrderSpec,
    ) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(format!("place:{}", order_id));
        if s.fail_placements {
            return Err(TraderError::gateway("socket closed"));
        }
        s.next_id = s.next_id.max(order_id + 1);
        let order = spec.clone().into_open_order(order_id, &contract.symbol);
        self.session.on_open_order(order.clone());
        s.orders.push(order);
        s.placed.push(Placed {
            order_id,
            symbol: contract.symbol.clone(),
            spec: spec.clone(),
        });
        Ok(())
    }

    fn cancel_order(&self, order_id: OrderId) -> Result<(), TraderError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(format!("cancel:{}", order_id));
        s.cancelled.push(order_id);
        if s.ignore_cancels {
            return Ok(());
        }
        for o in s.orders.iter_mut().filter(|o| o.order_id == order_id) {
            o.status = OrderStatus::Cancelled;
        }
        self.session.on_order_status(order_id, OrderStatus::Cancelled);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}
