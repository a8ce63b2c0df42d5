//! Broker gateway port.
//!
//! Requests are fire-and-forget: answers arrive on the gateway's listener and
//! land in the shared [`BrokerSession`]. Callers wait on the session (see
//! `domain::settle`) before reading a snapshot.

use crate::domain::contract::{BarRequest, Contract};
use crate::domain::error::TraderError;
use crate::domain::order::{OrderId, OrderSpec};
use crate::domain::session::BrokerSession;

pub trait BrokerGateway {
    fn session(&self) -> &BrokerSession;

    /// Replays `lookback` of bars into the session under `request.req_id`,
    /// then signals historical-data end.
    fn request_bars(&self, request: &BarRequest) -> Result<(), TraderError>;

    /// Replays the full position table, then signals position end.
    fn request_positions(&self) -> Result<(), TraderError>;

    /// Replays every open order, then signals open-order end.
    fn request_open_orders(&self) -> Result<(), TraderError>;

    /// Asks the broker for its next valid order id.
    fn request_next_order_id(&self) -> Result<(), TraderError>;

    fn place_order(
        &self,
        order_id: OrderId,
        contract: &Contract,
        spec: &OrderSpec,
    ) -> Result<(), TraderError>;

    fn cancel_order(&self, order_id: OrderId) -> Result<(), TraderError>;

    fn name(&self) -> &str;
}
