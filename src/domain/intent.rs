//! Turning order intents into gateway calls.
//!
//! [`translate`] maps an intent to concrete order commands. [`OrderExecutor`]
//! runs them in order: a cancel waits for the broker's acknowledgement before
//! the replacement goes out, and every placement first obtains a fresh id.

use std::fmt;

use crate::domain::contract::Contract;
use crate::domain::decision::OrderIntent;
use crate::domain::error::TraderError;
use crate::domain::order::{OrderAction, OrderId, OrderSpec};
use crate::domain::settle::{SettleTimeouts, wait_until};
use crate::ports::broker_port::BrokerGateway;
use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    Cancel(OrderId),
    Place(OrderSpec),
}

pub fn translate(intent: &OrderIntent) -> Vec<OrderCommand> {
    match intent {
        OrderIntent::EnterLong {
            quantity,
            limit_price,
        } => vec![OrderCommand::Place(OrderSpec::limit(
            OrderAction::Buy,
            *quantity,
            *limit_price,
        ))],
        OrderIntent::PlaceProtectiveStop {
            quantity,
            stop_price,
        } => vec![OrderCommand::Place(OrderSpec::stop(
            OrderAction::Sell,
            *quantity,
            *stop_price,
        ))],
        OrderIntent::ReplaceProtectiveStop {
            cancel_order_id,
            quantity,
            stop_price,
        } => {
            let mut commands = Vec::with_capacity(2);
            if let Some(id) = cancel_order_id {
                commands.push(OrderCommand::Cancel(*id));
            }
            commands.push(OrderCommand::Place(OrderSpec::stop(
                OrderAction::Sell,
                *quantity,
                *stop_price,
            )));
            commands
        }
        OrderIntent::NoAction(_) => Vec::new(),
    }
}

/// What the executor did for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutedCommand {
    Cancelled {
        order_id: OrderId,
        acknowledged: bool,
    },
    Placed {
        order_id: OrderId,
        spec: OrderSpec,
    },
}

impl fmt::Display for ExecutedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutedCommand::Cancelled {
                order_id,
                acknowledged,
            } => {
                write!(f, "cancel #{}", order_id)?;
                if !acknowledged {
                    write!(f, " (unacknowledged)")?;
                }
                Ok(())
            }
            ExecutedCommand::Placed { order_id, spec } => write!(f, "#{} {}", order_id, spec),
        }
    }
}

pub struct OrderExecutor<'a> {
    gateway: &'a dyn BrokerGateway,
    clock: &'a dyn Clock,
    settle: &'a SettleTimeouts,
}

impl<'a> OrderExecutor<'a> {
    pub fn new(
        gateway: &'a dyn BrokerGateway,
        clock: &'a dyn Clock,
        settle: &'a SettleTimeouts,
    ) -> Self {
        Self {
            gateway,
            clock,
            settle,
        }
    }

    /// Execute intents strictly in order; stops at the first gateway error.
    pub fn execute(
        &self,
        contract: &Contract,
        intents: &[OrderIntent],
    ) -> Result<Vec<ExecutedCommand>, TraderError> {
        let mut done = Vec::new();
        for intent in intents {
            for command in translate(intent) {
                let executed = match command {
                    OrderCommand::Cancel(order_id) => self.cancel(order_id)?,
                    OrderCommand::Place(spec) => self.place(contract, spec)?,
                };
                log::info!("{}: {}", contract.symbol, executed);
                done.push(executed);
            }
        }
        Ok(done)
    }

    /// Reserve a fresh order id, asking the broker and waiting for its answer.
    pub fn next_order_id(&self) -> Result<OrderId, TraderError> {
        let session = self.gateway.session();
        session.begin_order_id_request();
        self.gateway.request_next_order_id()?;
        let ready = wait_until(
            self.clock,
            self.settle.order_id,
            self.settle.poll,
            &|| session.has_next_valid_id(),
        );
        if !ready {
            log::warn!("timed out waiting for next valid order id");
        }
        session
            .reserve_order_id()
            .ok_or_else(|| TraderError::gateway("no order id received from broker"))
    }

    fn place(&self, contract: &Contract, spec: OrderSpec) -> Result<ExecutedCommand, TraderError> {
        let order_id = self.next_order_id()?;
        self.gateway.place_order(order_id, contract, &spec)?;
        self.clock.sleep(self.settle.submit);
        Ok(ExecutedCommand::Placed { order_id, spec })
    }

    fn cancel(&self, order_id: OrderId) -> Result<ExecutedCommand, TraderError> {
        let session = self.gateway.session();
        self.gateway.cancel_order(order_id)?;
        let acknowledged = wait_until(self.clock, self.settle.cancel, self.settle.poll, &|| {
            session.order_status(order_id).is_some_and(|s| s.is_cancelled())
        });
        if !acknowledged {
            log::warn!(
                "cancel of order {} not acknowledged within {:?}; placing replacement anyway",
                order_id,
                self.settle.cancel
            );
        }
        Ok(ExecutedCommand::Cancelled {
            order_id,
            acknowledged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::HoldReason;
    use crate::domain::order::{OrderType, TimeInForce};

    #[test]
    fn enter_long_is_buy_limit() {
        let commands = translate(&OrderIntent::EnterLong {
            quantity: 1,
            limit_price: 4512.5,
        });
        assert_eq!(commands.len(), 1);
        let OrderCommand::Place(spec) = &commands[0] else {
            panic!("expected placement");
        };
        assert_eq!(spec.action, OrderAction::Buy);
        assert_eq!(spec.order_type, OrderType::Limit);
        assert_eq!(spec.limit_price, Some(4512.5));
        assert_eq!(spec.quantity, 1);
    }

    #[test]
    fn protective_stop_is_gtc_sell_stop() {
        let commands = translate(&OrderIntent::PlaceProtectiveStop {
            quantity: 1,
            stop_price: 4505.0,
        });
        assert_eq!(
            commands,
            vec![OrderCommand::Place(OrderSpec {
                action: OrderAction::Sell,
                order_type: OrderType::Stop,
                quantity: 1,
                limit_price: None,
                stop_price: Some(4505.0),
                time_in_force: TimeInForce::GoodTillCanceled,
                outside_rth: true,
            })]
        );
    }

    #[test]
    fn replace_cancels_before_placing() {
        let commands = translate(&OrderIntent::ReplaceProtectiveStop {
            cancel_order_id: Some(881),
            quantity: 2,
            stop_price: 4507.25,
        });
        assert_eq!(
            commands,
            vec![
                OrderCommand::Cancel(881),
                OrderCommand::Place(OrderSpec::stop(OrderAction::Sell, 2, 4507.25)),
            ]
        );
    }

    #[test]
    fn replace_with_nothing_to_cancel_only_places() {
        let commands = translate(&OrderIntent::ReplaceProtectiveStop {
            cancel_order_id: None,
            quantity: 2,
            stop_price: 4507.25,
        });
        assert_eq!(
            commands,
            vec![OrderCommand::Place(OrderSpec::stop(OrderAction::Sell, 2, 4507.25))]
        );
    }

    #[test]
    fn no_action_translates_to_nothing() {
        assert!(translate(&OrderIntent::NoAction(HoldReason::StopUnchanged)).is_empty());
    }

    #[test]
    fn executed_command_display() {
        let placed = ExecutedCommand::Placed {
            order_id: 12,
            spec: OrderSpec::stop(OrderAction::Sell, 1, 4505.0),
        };
        assert_eq!(placed.to_string(), "#12 SELL 1 STP stop 4505 GTC outside-rth");
        let cancelled = ExecutedCommand::Cancelled {
            order_id: 881,
            acknowledged: false,
        };
        assert_eq!(cancelled.to_string(), "cancel #881 (unacknowledged)");
    }
}
