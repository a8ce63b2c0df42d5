//! Position-management decision engine.
//!
//! State is re-derived from the broker snapshot every cycle. The only value
//! carried between cycles is the previous quantized stop level, passed in by
//! the caller, so [`decide`] is a pure function of its inputs.

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorSnapshot, StopDirection};
use crate::domain::order::{OpenOrder, OrderId};
use crate::domain::position::PositionState;
use crate::domain::tick::{QUARTER_POINT, quantize, round_to};

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionParams {
    /// Fixed order size; 0 disables trading the symbol.
    pub quantity: i64,
    pub tick_size: f64,
    /// Added to the rounded regression value to form the entry limit.
    pub entry_premium: f64,
}

impl Default for DecisionParams {
    fn default() -> Self {
        DecisionParams {
            quantity: 1,
            tick_size: QUARTER_POINT,
            entry_premium: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolState {
    Flat,
    /// Flat now, but the broker still reports orders for the symbol.
    FlatWithHistory,
    Long,
    /// Reported by the broker but never traded by this strategy.
    Short,
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolState::Flat => write!(f, "flat"),
            SymbolState::FlatWithHistory => write!(f, "flat (prior orders)"),
            SymbolState::Long => write!(f, "long"),
            SymbolState::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    EntryConditionFalse,
    StopUnchanged,
    ZeroQuantity,
    ShortPositionUnmanaged,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::EntryConditionFalse => write!(f, "entry condition not met"),
            HoldReason::StopUnchanged => write!(f, "stop level unchanged"),
            HoldReason::ZeroQuantity => write!(f, "configured quantity is zero"),
            HoldReason::ShortPositionUnmanaged => write!(f, "short positions are not managed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    EnterLong {
        quantity: i64,
        limit_price: f64,
    },
    PlaceProtectiveStop {
        quantity: i64,
        stop_price: f64,
    },
    /// `cancel_order_id` is `None` when no working stop was found; the new
    /// stop is still placed.
    ReplaceProtectiveStop {
        cancel_order_id: Option<OrderId>,
        quantity: i64,
        stop_price: f64,
    },
    NoAction(HoldReason),
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderIntent::EnterLong {
                quantity,
                limit_price,
            } => write!(f, "enter long {} @ {}", quantity, limit_price),
            OrderIntent::PlaceProtectiveStop {
                quantity,
                stop_price,
            } => write!(f, "protective stop {} @ {}", quantity, stop_price),
            OrderIntent::ReplaceProtectiveStop {
                cancel_order_id,
                quantity,
                stop_price,
            } => match cancel_order_id {
                Some(id) => write!(f, "replace stop #{} with {} @ {}", id, quantity, stop_price),
                None => write!(f, "replace stop (none working) with {} @ {}", quantity, stop_price),
            },
            OrderIntent::NoAction(reason) => write!(f, "no action: {}", reason),
        }
    }
}

/// Everything the engine looks at for one symbol in one cycle.
#[derive(Debug, Clone)]
pub struct DecisionInput<'a> {
    pub indicators: &'a IndicatorSnapshot,
    pub position: &'a PositionState,
    /// Every order the broker reported for the symbol, any status.
    pub orders: &'a [OpenOrder],
    /// Working protective stop a replacement cancels, if any.
    pub working_stop: Option<OrderId>,
    /// Quantized stop level seen by the previous cycle, if there was one.
    pub previous_stop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: SymbolState,
    /// This cycle's quantized stop level, to be carried into the next cycle.
    pub stop_level: f64,
    pub intents: Vec<OrderIntent>,
}

impl Decision {
    pub fn is_no_action(&self) -> bool {
        self.intents
            .iter()
            .all(|i| matches!(i, OrderIntent::NoAction(_)))
    }
}

pub fn classify(position: &PositionState, orders: &[OpenOrder]) -> SymbolState {
    if position.is_long() {
        SymbolState::Long
    } else if position.is_short() {
        SymbolState::Short
    } else if orders.is_empty() {
        SymbolState::Flat
    } else {
        SymbolState::FlatWithHistory
    }
}

/// Limit price for a new entry: the regression value rounded to a whole point
/// plus the premium.
pub fn entry_price(trend_value: f64, premium: f64) -> f64 {
    round_to(trend_value, 0) + premium
}

/// Stop anchors to the stop-and-reverse level while it trails under price,
/// otherwise to the regression value.
pub fn protective_stop_price(indicators: &IndicatorSnapshot, tick: f64) -> f64 {
    match indicators.stop_direction {
        StopDirection::Up => quantize(indicators.stop_level, tick),
        StopDirection::Down => quantize(indicators.trend_value, tick),
    }
}

pub fn entry_condition(indicators: &IndicatorSnapshot) -> bool {
    indicators.trend_value > indicators.smoothed_average
        && indicators.stop_direction == StopDirection::Up
}

pub fn decide(input: &DecisionInput<'_>, params: &DecisionParams) -> Result<Decision, TraderError> {
    let symbol = input.position.symbol.as_str();
    if params.quantity < 0 {
        return Err(TraderError::contract_violation(
            symbol,
            format!("configured quantity {} is negative", params.quantity),
        ));
    }

    let indicators = input.indicators;
    let state = classify(input.position, input.orders);
    let stop_level = quantize(indicators.stop_level, params.tick_size);
    let hold = |reason| Decision {
        state,
        stop_level,
        intents: vec![OrderIntent::NoAction(reason)],
    };

    if params.quantity == 0 {
        return Ok(hold(HoldReason::ZeroQuantity));
    }

    match state {
        SymbolState::Flat | SymbolState::FlatWithHistory => {
            if !entry_condition(indicators) {
                return Ok(hold(HoldReason::EntryConditionFalse));
            }
            let quantity = params.quantity;
            Ok(Decision {
                state,
                stop_level,
                intents: vec![
                    OrderIntent::EnterLong {
                        quantity,
                        limit_price: entry_price(indicators.trend_value, params.entry_premium),
                    },
                    OrderIntent::PlaceProtectiveStop {
                        quantity,
                        stop_price: protective_stop_price(indicators, params.tick_size),
                    },
                ],
            })
        }
        SymbolState::Long => {
            let previous = quantize(
                input.previous_stop.unwrap_or(indicators.prior_stop_level),
                params.tick_size,
            );
            if previous == stop_level {
                return Ok(hold(HoldReason::StopUnchanged));
            }
            Ok(Decision {
                state,
                stop_level,
                intents: vec![OrderIntent::ReplaceProtectiveStop {
                    cancel_order_id: input.working_stop,
                    quantity: input.position.quantity,
                    stop_price: protective_stop_price(indicators, params.tick_size),
                }],
            })
        }
        SymbolState::Short => Ok(hold(HoldReason::ShortPositionUnmanaged)),
    }
}
