//! Environment overlay over another configuration source.
//!
//! `SARTRADER_<SECTION>_<KEY>` (upper-case) wins over the wrapped value.

use std::collections::HashMap;

use crate::ports::config_port::{ConfigPort, parse_bool};

pub const ENV_PREFIX: &str = "SARTRADER_";

pub struct EnvConfigAdapter<C> {
    inner: C,
    vars: HashMap<String, String>,
}

impl<C: ConfigPort> EnvConfigAdapter<C> {
    /// Overlay the current process environment.
    pub fn from_env(inner: C) -> Self {
        Self::from_vars(inner, std::env::vars())
    }

    /// Overlay an explicit set of variables; names without the prefix are ignored.
    pub fn from_vars<I, K, V>(inner: C, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Self { inner, vars }
    }

    pub fn variable_name(section: &str, key: &str) -> String {
        format!("{}{}_{}", ENV_PREFIX, section.to_uppercase(), key.to_uppercase())
    }

    fn lookup(&self, section: &str, key: &str) -> Option<&str> {
        self.vars
            .get(&Self::variable_name(section, key))
            .map(|v| v.trim())
    }

    /// The `known` keys that a variable overrides, in `known` order.
    pub fn overridden_keys<'k>(&self, known: &[(&'k str, &'k str)]) -> Vec<(&'k str, &'k str)> {
        known
            .iter()
            .copied()
            .filter(|(section, key)| self.vars.contains_key(&Self::variable_name(section, key)))
            .collect()
    }

    /// Prefixed variables that name none of the `known` keys, sorted.
    pub fn unrecognized_variables(&self, known: &[(&str, &str)]) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .vars
            .keys()
            .map(String::as_str)
            .filter(|name| {
                !known
                    .iter()
                    .any(|(section, key)| *name == Self::variable_name(section, key))
            })
            .collect();
        names.sort_unstable();
        names
    }
}

impl<C: ConfigPort> ConfigPort for EnvConfigAdapter<C> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.lookup(section, key) {
            Some(v) => Some(v.to_string()),
            None => self.inner.get_string(section, key),
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match self.lookup(section, key).and_then(|v| v.parse().ok()) {
            Some(v) => v,
            None => self.inner.get_int(section, key, default),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        match self.lookup(section, key).and_then(|v| v.parse().ok()) {
            Some(v) => v,
            None => self.inner.get_double(section, key, default),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.lookup(section, key).and_then(parse_bool) {
            Some(v) => v,
            None => self.inner.get_bool(section, key, default),
        }
    }
}
