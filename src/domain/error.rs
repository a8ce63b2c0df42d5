//! Domain error types.

/// Top-level error type for sartrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    /// The broker snapshot or configuration broke an assumption the decision
    /// engine relies on. Fatal for the symbol's cycle only.
    #[error("input contract violated for {symbol}: {reason}")]
    InputContractViolation { symbol: String, reason: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {required}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        required: usize,
    },

    #[error("gateway failure: {reason}")]
    TransientGateway { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn contract_violation(symbol: &str, reason: impl Into<String>) -> Self {
        TraderError::InputContractViolation {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn gateway(reason: impl Into<String>) -> Self {
        TraderError::TransientGateway {
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::TransientGateway { .. } => 3,
            TraderError::InputContractViolation { .. } => 4,
            TraderError::Data { .. } | TraderError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_message_names_symbol() {
        let err = TraderError::contract_violation("MES", "2 position rows");
        assert_eq!(
            err.to_string(),
            "input contract violated for MES: 2 position rows"
        );
    }

    #[test]
    fn insufficient_history_message() {
        let err = TraderError::InsufficientHistory {
            symbol: "MES".into(),
            bars: 12,
            required: 21,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history for MES: have 12 bars, need 21"
        );
    }

    #[test]
    fn config_errors_share_exit_code() {
        let missing = TraderError::ConfigMissing {
            section: "broker".into(),
            key: "paper_data".into(),
        };
        let invalid = TraderError::invalid("trading", "quantity", "must be non-negative");
        let expected = format!("{:?}", std::process::ExitCode::from(2));
        assert_eq!(format!("{:?}", std::process::ExitCode::from(&missing)), expected);
        assert_eq!(format!("{:?}", std::process::ExitCode::from(&invalid)), expected);
    }
}
