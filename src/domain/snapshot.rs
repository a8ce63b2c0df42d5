//! Normalized per-cycle view of broker positions and orders.
//!
//! The broker repeats position rows and replays order callbacks; this is where
//! those duplicates are removed before the decision engine sees anything.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::order::{OpenOrder, OrderId};
use crate::domain::position::PositionState;
use crate::domain::session::SessionSnapshot;

#[derive(Debug, Clone, Default)]
pub struct BrokerSnapshot {
    positions: Vec<PositionState>,
    /// Keyed by order id; iteration is in id order.
    orders: BTreeMap<OrderId, OpenOrder>,
}

impl BrokerSnapshot {
    pub fn new(positions: Vec<PositionState>, orders: Vec<OpenOrder>) -> Self {
        let mut unique: Vec<PositionState> = Vec::with_capacity(positions.len());
        for row in positions {
            if !unique.iter().any(|seen| seen.same_row(&row)) {
                unique.push(row);
            }
        }

        // Later callbacks for the same id carry the fresher status.
        let orders = orders.into_iter().map(|o| (o.order_id, o)).collect();

        BrokerSnapshot {
            positions: unique,
            orders,
        }
    }

    pub fn from_session(session: &SessionSnapshot) -> Self {
        Self::new(session.positions.clone(), session.orders.clone())
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// The single position for `symbol`; flat when the broker reports none.
    /// Distinct rows for one symbol are an input-contract violation.
    pub fn position_for(&self, symbol: &str) -> Result<PositionState, TraderError> {
        let mut rows = self.positions.iter().filter(|p| p.symbol == symbol);
        let Some(first) = rows.next() else {
            return Ok(PositionState::flat(symbol));
        };
        let extra = rows.count();
        if extra > 0 {
            return Err(TraderError::contract_violation(
                symbol,
                format!("{} distinct position rows", extra + 1),
            ));
        }
        Ok(first.clone())
    }

    pub fn orders_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a OpenOrder> + 'a {
        self.orders.values().filter(move |o| o.symbol == symbol)
    }

    /// Highest-id Sell Stop still working for `symbol`: the one a stop
    /// replacement cancels.
    pub fn latest_protective_stop<'a>(&'a self, symbol: &'a str) -> Option<&'a OpenOrder> {
        self.orders_for(symbol)
            .filter(|o| o.is_protective_stop() && o.status.is_working())
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderAction, OrderSpec, OrderStatus};

    fn row(account: &str, symbol: &str, qty: i64) -> PositionState {
        PositionState {
            account: account.into(),
            symbol: symbol.into(),
            quantity: qty,
            average_cost: 4500.0,
        }
    }

    fn stop(id: OrderId, status: OrderStatus) -> OpenOrder {
        let mut o = OrderSpec::stop(OrderAction::Sell, 1, 4500.0).into_open_order(id, "MES");
        o.status = status;
        o
    }

    #[test]
    fn exact_duplicate_rows_collapse() {
        let snap = BrokerSnapshot::new(
            vec![row("DU1", "MES", 2), row("DU1", "MES", 2), row("DU1", "ES", 1)],
            vec![],
        );
        assert_eq!(snap.position_count(), 2);
        assert_eq!(snap.position_for("MES").unwrap().quantity, 2);
    }

    #[test]
    fn distinct_rows_for_one_symbol_violate_contract() {
        let snap = BrokerSnapshot::new(vec![row("DU1", "MES", 2), row("DU1", "MES", 0)], vec![]);
        let err = snap.position_for("MES").unwrap_err();
        assert!(matches!(err, TraderError::InputContractViolation { .. }));
        // Other symbols are unaffected.
        assert!(snap.position_for("ES").unwrap().is_flat());
    }

    #[test]
    fn missing_symbol_is_flat() {
        let snap = BrokerSnapshot::default();
        let pos = snap.position_for("MES").unwrap();
        assert!(pos.is_flat());
        assert_eq!(pos.symbol, "MES");
    }

    #[test]
    fn repeated_order_callbacks_keep_latest() {
        let snap = BrokerSnapshot::new(
            vec![],
            vec![stop(5, OrderStatus::Submitted), stop(5, OrderStatus::Cancelled)],
        );
        assert_eq!(snap.order_count(), 1);
        assert!(snap.latest_protective_stop("MES").is_none());
        assert_eq!(snap.orders_for("MES").count(), 1);
    }

    #[test]
    fn latest_protective_stop_is_highest_working_id() {
        let entry = OrderSpec::limit(OrderAction::Buy, 1, 4512.5).into_open_order(12, "MES");
        let snap = BrokerSnapshot::new(
            vec![],
            vec![
                stop(9, OrderStatus::Submitted),
                stop(11, OrderStatus::PreSubmitted),
                stop(10, OrderStatus::Submitted),
                entry,
                stop(13, OrderStatus::Rejected),
            ],
        );
        assert_eq!(snap.latest_protective_stop("MES").unwrap().order_id, 11);
        assert_eq!(snap.latest_protective_stop("ES"), None);
    }
}
