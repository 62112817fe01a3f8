//! Process configuration from environment variables.
//!
//! `PORT`, `STORE_URL` (`memory` or `file:<path>`), `TAX_PERCENTAGE`,
//! `TABLE_COUNT`, `STRICT_TRANSITIONS`. Auth variables are read by
//! [`crate::auth::AuthConfig::from_env`].

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::calculator::validate_tax_percentage;
use crate::error::PosError;
use crate::lifecycle::TransitionPolicy;
use crate::persistence::FilePersistence;
use crate::store::{DocumentStore, MemoryStore};

/// Where documents live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreUrl {
    Memory,
    File(PathBuf),
}

impl StoreUrl {
    pub fn parse(s: &str) -> Result<Self, PosError> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("memory") {
            return Ok(StoreUrl::Memory);
        }
        match s.strip_prefix("file:") {
            Some(path) if !path.trim().is_empty() => {
                Ok(StoreUrl::File(PathBuf::from(path.trim_start_matches("//"))))
            }
            _ => Err(PosError::Configuration(format!(
                "unsupported STORE_URL '{}' (expected 'memory' or 'file:<path>')",
                s
            ))),
        }
    }

    /// Opens the store handle. Called once at startup; the handle is shared by all requests.
    pub fn connect(&self) -> Result<Arc<dyn DocumentStore>, PosError> {
        match self {
            StoreUrl::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreUrl::File(path) => Ok(Arc::new(MemoryStore::with_file(FilePersistence::new(path))?)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub store_url: StoreUrl,
    pub tax_percentage: Decimal,
    pub table_count: u32,
    pub transition_policy: TransitionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            store_url: StoreUrl::Memory,
            tax_percentage: Decimal::ZERO,
            table_count: 0,
            transition_policy: TransitionPolicy::Strict,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, PosError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PosError> {
        let defaults = Config::default();
        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let store_url = match lookup("STORE_URL") {
            Some(s) => StoreUrl::parse(&s)?,
            None => defaults.store_url,
        };
        let tax_percentage = parse_or(&lookup, "TAX_PERCENTAGE", defaults.tax_percentage)?;
        validate_tax_percentage(tax_percentage)
            .map_err(|e| PosError::Configuration(format!("TAX_PERCENTAGE: {}", e)))?;
        let table_count = parse_or(&lookup, "TABLE_COUNT", defaults.table_count)?;
        let strict = match lookup("STRICT_TRANSITIONS") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| PosError::Configuration(format!("STRICT_TRANSITIONS: '{}'", v)))?,
            None => true,
        };
        Ok(Self {
            port,
            store_url,
            tax_percentage,
            table_count,
            transition_policy: if strict {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Lenient
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, PosError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PosError::Configuration(format!("{}: cannot parse '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, PosError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.store_url, StoreUrl::Memory);
        assert_eq!(c.tax_percentage, Decimal::ZERO);
        assert_eq!(c.transition_policy, TransitionPolicy::Strict);
    }

    #[test]
    fn reads_all_keys() {
        let c = config(&[
            ("PORT", "9000"),
            ("STORE_URL", "file:///var/lib/pos.json"),
            ("TAX_PERCENTAGE", "16"),
            ("TABLE_COUNT", "12"),
            ("STRICT_TRANSITIONS", "false"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.store_url, StoreUrl::File(PathBuf::from("/var/lib/pos.json")));
        assert_eq!(c.tax_percentage, Decimal::from(16));
        assert_eq!(c.table_count, 12);
        assert_eq!(c.transition_policy, TransitionPolicy::Lenient);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for pairs in [
            [("PORT", "eighty")],
            [("TAX_PERCENTAGE", "150")],
            [("STORE_URL", "mongodb://localhost")],
            [("STRICT_TRANSITIONS", "maybe")],
        ] {
            let err = config(&pairs).unwrap_err();
            assert!(matches!(err, PosError::Configuration(_)), "{:?}", pairs);
        }
    }
}
