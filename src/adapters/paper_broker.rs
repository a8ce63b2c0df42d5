//! Paper broker replaying CSV bars.
//!
//! Requests go over a channel to a listener thread, which answers by writing
//! callbacks into the shared [`BrokerSession`], the same way a live broker
//! connection would. A feed is loaded on its first bar request with the
//! configured number of bars revealed. Every position request after that
//! reveals one more bar per feed and fills working orders against it; bar
//! requests send the lookback window ending at the newest revealed bar.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::domain::bar::Bar;
use crate::domain::contract::{BarRequest, Contract, bars_in_lookback};
use crate::domain::error::TraderError;
use crate::domain::order::{OpenOrder, OrderAction, OrderId, OrderSpec, OrderStatus, OrderType};
use crate::domain::position::PositionState;
use crate::domain::session::BrokerSession;
use crate::ports::broker_port::BrokerGateway;

/// Broker error code for a cancel naming an unknown order.
pub const ORDER_NOT_FOUND: i32 = 10147;
/// Broker error code for a failed historical-data request.
pub const HISTORICAL_DATA_ERROR: i32 = 162;

enum Request {
    Bars(BarRequest),
    Positions,
    OpenOrders,
    NextOrderId,
    Place {
        order_id: OrderId,
        contract: Contract,
        spec: OrderSpec,
    },
    Cancel(OrderId),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct PaperOptions {
    pub account: String,
    /// Bars revealed by the first request for a symbol.
    pub initial_bars: usize,
}

impl Default for PaperOptions {
    fn default() -> Self {
        PaperOptions {
            account: "PAPER".to_string(),
            initial_bars: 30,
        }
    }
}

pub struct PaperGateway {
    session: Arc<BrokerSession>,
    requests: Sender<Request>,
    listener: Option<JoinHandle<()>>,
}

impl PaperGateway {
    pub fn new(source: CsvAdapter, options: PaperOptions, bar_capacity: usize) -> Self {
        let session = Arc::new(BrokerSession::new(bar_capacity));
        let (requests, inbox) = mpsc::channel();
        let market = PaperMarket::new(source, options, Arc::clone(&session));
        let listener = thread::spawn(move || market.listen(inbox));
        Self {
            session,
            requests,
            listener: Some(listener),
        }
    }

    fn send(&self, request: Request) -> Result<(), TraderError> {
        self.requests
            .send(request)
            .map_err(|_| TraderError::gateway("paper broker listener has stopped"))
    }
}

impl Drop for PaperGateway {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                log::error!("paper broker listener panicked");
            }
        }
    }
}

impl BrokerGateway for PaperGateway {
    fn session(&self) -> &BrokerSession {
        &self.session
    }

    fn request_bars(&self, request: &BarRequest) -> Result<(), TraderError> {
        self.send(Request::Bars(request.clone()))
    }

    fn request_positions(&self) -> Result<(), TraderError> {
        self.send(Request::Positions)
    }

    fn request_open_orders(&self) -> Result<(), TraderError> {
        self.send(Request::OpenOrders)
    }

    fn request_next_order_id(&self) -> Result<(), TraderError> {
        self.send(Request::NextOrderId)
    }

    fn place_order(
        &self,
        order_id: OrderId,
        contract: &Contract,
        spec: &OrderSpec,
    ) -> Result<(), TraderError> {
        self.send(Request::Place {
            order_id,
            contract: contract.clone(),
            spec: spec.clone(),
        })
    }

    fn cancel_order(&self, order_id: OrderId) -> Result<(), TraderError> {
        self.send(Request::Cancel(order_id))
    }

    fn name(&self) -> &str {
        "paper"
    }
}

struct Feed {
    bars: Vec<Bar>,
    /// Number of bars revealed so far.
    cursor: usize,
}

/// Listener-side state. Lives on the listener thread only.
struct PaperMarket {
    source: CsvAdapter,
    options: PaperOptions,
    session: Arc<BrokerSession>,
    feeds: HashMap<String, Feed>,
    positions: BTreeMap<String, PositionState>,
    orders: BTreeMap<OrderId, OpenOrder>,
    next_id: OrderId,
}

impl PaperMarket {
    fn new(source: CsvAdapter, options: PaperOptions, session: Arc<BrokerSession>) -> Self {
        Self {
            source,
            options,
            session,
            feeds: HashMap::new(),
            positions: BTreeMap::new(),
            orders: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn listen(mut self, inbox: Receiver<Request>) {
        log::debug!("paper broker listener started");
        while let Ok(request) = inbox.recv() {
            match request {
                Request::Bars(req) => self.replay_bars(&req),
                Request::Positions => self.replay_positions(),
                Request::OpenOrders => self.replay_orders(),
                Request::NextOrderId => self.session.on_next_valid_id(self.next_id),
                Request::Place {
                    order_id,
                    contract,
                    spec,
                } => self.place(order_id, &contract, spec),
                Request::Cancel(order_id) => self.cancel(order_id),
                Request::Shutdown => break,
            }
        }
        log::debug!("paper broker listener stopped");
    }

    /// One replay step for every loaded feed, filling working orders against
    /// the newly revealed bar.
    fn advance(&mut self) {
        let mut revealed = Vec::new();
        for (symbol, feed) in self.feeds.iter_mut() {
            if feed.cursor < feed.bars.len() {
                feed.cursor += 1;
                revealed.push((symbol.clone(), feed.bars[feed.cursor - 1].clone()));
            } else {
                log::info!("paper replay for {} exhausted at bar {}", symbol, feed.cursor);
            }
        }
        for (symbol, bar) in revealed {
            self.fill_against(&symbol, &bar);
        }
    }

    fn replay_bars(&mut self, req: &BarRequest) {
        let symbol = req.contract.symbol.as_str();
        if !self.feeds.contains_key(symbol) {
            match self.source.fetch_bars(symbol) {
                Ok(bars) => {
                    let cursor = self.options.initial_bars.min(bars.len());
                    self.feeds
                        .insert(symbol.to_string(), Feed { bars, cursor });
                }
                Err(e) => {
                    self.session.on_error(
                        i64::from(req.req_id),
                        HISTORICAL_DATA_ERROR,
                        &format!("historical data request for {} failed: {}", symbol, e),
                    );
                    return;
                }
            }
        }

        if let Some(feed) = self.feeds.get(symbol) {
            let span = bars_in_lookback(&req.lookback, &req.bar_size).unwrap_or(feed.cursor);
            let start = feed.cursor.saturating_sub(span);
            for bar in &feed.bars[start..feed.cursor] {
                self.session.on_historical_bar(req.req_id, bar.clone());
            }
        }
        self.session.on_historical_data_end(req.req_id);
    }

    fn fill_against(&mut self, symbol: &str, bar: &Bar) {
        let fills: Vec<(OrderId, f64)> = self
            .orders
            .values()
            .filter(|o| o.symbol == symbol && o.status.is_working())
            .filter_map(|o| fill_price(o, bar).map(|price| (o.order_id, price)))
            .collect();

        for (order_id, price) in fills {
            let Some(order) = self.orders.get_mut(&order_id) else {
                continue;
            };
            order.status = OrderStatus::Filled;
            let signed = match order.action {
                OrderAction::Buy => order.quantity,
                OrderAction::Sell => -order.quantity,
            };
            log::info!(
                "paper fill: order {} {} {} {} @ {}",
                order_id,
                order.action,
                order.quantity,
                symbol,
                price
            );

            let account = self.options.account.clone();
            let position = self
                .positions
                .entry(symbol.to_string())
                .or_insert_with(|| PositionState {
                    account,
                    ..PositionState::flat(symbol)
                });
            apply_fill(position, signed, price);
            self.session.on_order_status(order_id, OrderStatus::Filled);
        }
    }

    fn replay_positions(&mut self) {
        self.advance();
        for position in self.positions.values() {
            self.session.on_position(position.clone());
        }
        self.session.on_position_end();
    }

    fn replay_orders(&self) {
        for order in self.orders.values() {
            self.session.on_open_order(order.clone());
        }
        self.session.on_open_order_end();
    }

    fn place(&mut self, order_id: OrderId, contract: &Contract, spec: OrderSpec) {
        if self.orders.contains_key(&order_id) {
            self.session.on_error(
                order_id,
                103,
                &format!("duplicate order id {}", order_id),
            );
            return;
        }
        self.next_id = self.next_id.max(order_id + 1);
        let order = spec.into_open_order(order_id, &contract.symbol);
        self.session.on_open_order(order.clone());
        self.session.on_order_status(order_id, order.status);
        self.orders.insert(order_id, order);
    }

    fn cancel(&mut self, order_id: OrderId) {
        match self.orders.get_mut(&order_id) {
            Some(order) if order.status.is_working() => {
                order.status = OrderStatus::Cancelled;
                self.session.on_order_status(order_id, OrderStatus::Cancelled);
            }
            _ => self.session.on_error(
                order_id,
                ORDER_NOT_FOUND,
                &format!("order {} that needs to be cancelled is not found", order_id),
            ),
        }
    }
}

/// Price at which `order` executes within `bar`, if it does.
fn fill_price(order: &OpenOrder, bar: &Bar) -> Option<f64> {
    match (order.action, order.order_type) {
        (OrderAction::Buy, OrderType::Limit) => {
            let limit = order.limit_price?;
            (bar.low <= limit).then(|| limit.min(bar.open))
        }
        (OrderAction::Sell, OrderType::Stop) => {
            let stop = order.stop_price?;
            (bar.low <= stop).then(|| stop.min(bar.open))
        }
        (_, OrderType::Market) => Some(bar.open),
        _ => None,
    }
}

fn apply_fill(position: &mut PositionState, signed_quantity: i64, price: f64) {
    let new_quantity = position.quantity + signed_quantity;
    let adds = position.quantity == 0 || position.quantity.signum() == signed_quantity.signum();
    if new_quantity == 0 {
        position.average_cost = 0.0;
    } else if adds {
        let held = position.quantity.abs() as f64;
        let added = signed_quantity.abs() as f64;
        position.average_cost = (position.average_cost * held + price * added) / (held + added);
    } else if new_quantity.signum() != position.quantity.signum() {
        position.average_cost = price;
    }
    position.quantity = new_quantity;
}
