//! Shared broker session state.
//!
//! The gateway's listener thread writes callbacks in; the cycle reads an
//! immutable [`SessionSnapshot`]. One lock guards every table so a snapshot
//! never observes a half-applied callback.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::domain::bar::Bar;
use crate::domain::bar_buffer::{BarBuffer, PushOutcome};
use crate::domain::order::{OpenOrder, OrderId, OrderStatus};
use crate::domain::position::PositionState;

/// A broker error callback.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayNotice {
    pub req_id: i64,
    pub code: i32,
    pub message: String,
}

/// Copy of the session tables as of one read.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub positions: Vec<PositionState>,
    pub orders: Vec<OpenOrder>,
    pub bars: HashMap<u32, Vec<Bar>>,
    pub positions_complete: bool,
    pub orders_complete: bool,
}

impl SessionSnapshot {
    pub fn bars_for(&self, req_id: u32) -> &[Bar] {
        self.bars.get(&req_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Default)]
struct Tables {
    bars: HashMap<u32, BarBuffer>,
    bars_complete: HashSet<u32>,
    positions: Vec<PositionState>,
    positions_complete: bool,
    orders: Vec<OpenOrder>,
    orders_complete: bool,
    order_status: HashMap<OrderId, OrderStatus>,
    next_valid_id: Option<OrderId>,
    notices: Vec<GatewayNotice>,
}

#[derive(Debug)]
pub struct BrokerSession {
    bar_capacity: usize,
    tables: Mutex<Tables>,
}

impl BrokerSession {
    pub fn new(bar_capacity: usize) -> Self {
        Self {
            bar_capacity,
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn bar_capacity(&self) -> usize {
        self.bar_capacity
    }

    // Request bookkeeping, called before the request goes out.

    pub fn begin_bar_request(&self, req_id: u32) {
        let mut t = self.tables.lock();
        t.bars
            .entry(req_id)
            .or_insert_with(|| BarBuffer::new(self.bar_capacity))
            .clear();
        t.bars_complete.remove(&req_id);
    }

    pub fn begin_position_request(&self) {
        let mut t = self.tables.lock();
        t.positions.clear();
        t.positions_complete = false;
    }

    pub fn begin_open_order_request(&self) {
        let mut t = self.tables.lock();
        t.orders.clear();
        t.orders_complete = false;
    }

    pub fn begin_order_id_request(&self) {
        self.tables.lock().next_valid_id = None;
    }

    // Listener callbacks.

    pub fn on_historical_bar(&self, req_id: u32, bar: Bar) {
        let mut t = self.tables.lock();
        let outcome = t
            .bars
            .entry(req_id)
            .or_insert_with(|| BarBuffer::new(self.bar_capacity))
            .push(bar);
        if outcome == PushOutcome::Rejected {
            log::warn!("request {}: dropped out-of-order or malformed bar", req_id);
        }
    }

    pub fn on_historical_data_end(&self, req_id: u32) {
        self.tables.lock().bars_complete.insert(req_id);
    }

    pub fn on_position(&self, position: PositionState) {
        self.tables.lock().positions.push(position);
    }

    pub fn on_position_end(&self) {
        self.tables.lock().positions_complete = true;
        log::info!("latest position data received");
    }

    pub fn on_open_order(&self, order: OpenOrder) {
        let mut t = self.tables.lock();
        t.order_status.insert(order.order_id, order.status);
        t.orders.push(order);
    }

    pub fn on_open_order_end(&self) {
        self.tables.lock().orders_complete = true;
    }

    pub fn on_order_status(&self, order_id: OrderId, status: OrderStatus) {
        let mut t = self.tables.lock();
        t.order_status.insert(order_id, status);
        for order in t.orders.iter_mut().filter(|o| o.order_id == order_id) {
            order.status = status;
        }
    }

    pub fn on_next_valid_id(&self, order_id: OrderId) {
        self.tables.lock().next_valid_id = Some(order_id);
        log::info!("next valid order id: {}", order_id);
    }

    pub fn on_error(&self, req_id: i64, code: i32, message: &str) {
        log::warn!("gateway notice {} (request {}): {}", code, req_id, message);
        self.tables.lock().notices.push(GatewayNotice {
            req_id,
            code,
            message: message.to_string(),
        });
    }

    // Reads.

    pub fn positions_complete(&self) -> bool {
        self.tables.lock().positions_complete
    }

    pub fn orders_complete(&self) -> bool {
        self.tables.lock().orders_complete
    }

    pub fn bars_complete(&self, req_id: u32) -> bool {
        self.tables.lock().bars_complete.contains(&req_id)
    }

    pub fn has_next_valid_id(&self) -> bool {
        self.tables.lock().next_valid_id.is_some()
    }

    pub fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.tables.lock().order_status.get(&order_id).copied()
    }

    /// Hand out the broker's next valid id and advance it locally so ids
    /// reserved in the same pass never collide.
    pub fn reserve_order_id(&self) -> Option<OrderId> {
        let mut t = self.tables.lock();
        let id = t.next_valid_id?;
        t.next_valid_id = Some(id + 1);
        Some(id)
    }

    pub fn take_notices(&self) -> Vec<GatewayNotice> {
        std::mem::take(&mut self.tables.lock().notices)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let t = self.tables.lock();
        SessionSnapshot {
            positions: t.positions.clone(),
            orders: t.orders.clone(),
            bars: t.bars.iter().map(|(id, buf)| (*id, buf.to_vec())).collect(),
            positions_complete: t.positions_complete,
            orders_complete: t.orders_complete,
        }
    }
}
