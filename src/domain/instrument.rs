//! The traded instrument list.
//!
//! Symbols come from a comma list in configuration; each one becomes a
//! contract sharing the configured security type, expiry, exchange and
//! currency.

use std::collections::HashSet;

use crate::domain::contract::Contract;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstrumentError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, InstrumentError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(InstrumentError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(InstrumentError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Contract template applied to every configured symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTemplate {
    pub sec_type: String,
    pub expiry: String,
    pub exchange: String,
    pub currency: String,
}

impl ContractTemplate {
    pub fn contract(&self, symbol: &str) -> Contract {
        Contract {
            symbol: symbol.to_string(),
            sec_type: self.sec_type.clone(),
            expiry: self.expiry.clone(),
            exchange: self.exchange.clone(),
            currency: self.currency.clone(),
        }
    }

    pub fn contracts(&self, symbols: &[String]) -> Vec<Contract> {
        symbols.iter().map(|s| self.contract(s)).collect()
    }
}
