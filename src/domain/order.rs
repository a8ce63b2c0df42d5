//! Orders: broker-reported open orders and the specs we submit.

use std::fmt;

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MKT"),
            OrderType::Limit => write!(f, "LMT"),
            OrderType::Stop => write!(f, "STP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    GoodTillCanceled,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => write!(f, "DAY"),
            TimeInForce::GoodTillCanceled => write!(f, "GTC"),
        }
    }
}

/// Broker order status strings, normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    PendingSubmit,
    PreSubmitted,
    Submitted,
    PendingCancel,
    Cancelled,
    Filled,
    Rejected,
    Inactive,
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pendingsubmit" | "apipending" => Some(OrderStatus::PendingSubmit),
            "presubmitted" => Some(OrderStatus::PreSubmitted),
            "submitted" => Some(OrderStatus::Submitted),
            "pendingcancel" => Some(OrderStatus::PendingCancel),
            "cancelled" | "apicancelled" => Some(OrderStatus::Cancelled),
            "filled" => Some(OrderStatus::Filled),
            "rejected" => Some(OrderStatus::Rejected),
            "inactive" => Some(OrderStatus::Inactive),
            _ => None,
        }
    }

    /// Still resting at the broker. Rejected orders count as absent.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingSubmit | OrderStatus::PreSubmitted | OrderStatus::Submitted
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: OrderId,
    pub symbol: String,
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: i64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: OrderStatus,
}

impl OpenOrder {
    pub fn is_protective_stop(&self) -> bool {
        self.action == OrderAction::Sell && self.order_type == OrderType::Stop
    }
}

/// Concrete order parameters handed to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: i64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub time_in_force: TimeInForce,
    pub outside_rth: bool,
}

impl OrderSpec {
    pub fn limit(action: OrderAction, quantity: i64, limit_price: f64) -> Self {
        OrderSpec {
            action,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(limit_price),
            stop_price: None,
            time_in_force: TimeInForce::Day,
            outside_rth: false,
        }
    }

    /// Stop orders rest across sessions and may trigger outside regular hours.
    pub fn stop(action: OrderAction, quantity: i64, stop_price: f64) -> Self {
        OrderSpec {
            action,
            order_type: OrderType::Stop,
            quantity,
            limit_price: None,
            stop_price: Some(stop_price),
            time_in_force: TimeInForce::GoodTillCanceled,
            outside_rth: true,
        }
    }

    pub fn into_open_order(self, order_id: OrderId, symbol: &str) -> OpenOrder {
        OpenOrder {
            order_id,
            symbol: symbol.to_string(),
            action: self.action,
            order_type: self.order_type,
            quantity: self.quantity,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            status: OrderStatus::Submitted,
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.quantity, self.order_type)?;
        if let Some(p) = self.limit_price {
            write!(f, " @ {}", p)?;
        }
        if let Some(p) = self.stop_price {
            write!(f, " stop {}", p)?;
        }
        write!(f, " {}", self.time_in_force)?;
        if self.outside_rth {
            write!(f, " outside-rth")?;
        }
        Ok(())
    }
}
