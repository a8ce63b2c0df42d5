//! Broker-reported position state.

#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub account: String,
    pub symbol: String,
    /// Signed; 0 is flat.
    pub quantity: i64,
    pub average_cost: f64,
}

impl PositionState {
    pub fn flat(symbol: &str) -> Self {
        PositionState {
            account: String::new(),
            symbol: symbol.to_string(),
            quantity: 0,
            average_cost: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Rows the broker repeats verbatim; f64 compared bitwise so NaN rows still match.
    pub fn same_row(&self, other: &PositionState) -> bool {
        self.account == other.account
            && self.symbol == other.symbol
            && self.quantity == other.quantity
            && self.average_cost.to_bits() == other.average_cost.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> PositionState {
        PositionState {
            account: "DU100".into(),
            symbol: "MES".into(),
            quantity: 2,
            average_cost: 4500.0,
        }
    }

    #[test]
    fn flat_has_zero_quantity() {
        let pos = PositionState::flat("MES");
        assert!(pos.is_flat());
        assert!(!pos.is_long());
        assert!(!pos.is_short());
        assert_eq!(pos.symbol, "MES");
    }

    #[test]
    fn long_and_short() {
        let long = long_position();
        assert!(long.is_long());
        let short = PositionState {
            quantity: -1,
            ..long_position()
        };
        assert!(short.is_short());
    }

    #[test]
    fn same_row_detects_repeats() {
        let a = long_position();
        assert!(a.same_row(&a.clone()));
        let b = PositionState {
            quantity: 3,
            ..long_position()
        };
        assert!(!a.same_row(&b));
    }
}
