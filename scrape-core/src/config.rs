//! # Configuration
//!
//! A string key/value store with dotted keys (`queue.hockey`,
//! `scraper.timeout_secs`). Applications layer it however they like:
//! defaults in code, then `.env`, then process environment.
//!
//! ```rust
//! use scrape_core::ConfigStore;
//!
//! let mut config = ConfigStore::new();
//! config.set("worker.consumers", "2");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_usize("worker.consumers").unwrap(), Some(2));
//! ```
//!
//! Environment variables are mapped with a prefix and `__` as the
//! separator: `SCRAPER__QUEUE__HOCKEY=my_queue` becomes `queue.hockey`.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: {value:?}")]
    Invalid { key: String, value: String },

    #[error("missing required key `{0}`")]
    Missing(String),
}

#[derive(Debug, Default, Clone)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a key to a string value, replacing any previous value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Load every variable starting with `prefix` from the process environment.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(std::env::vars(), prefix)
    }

    /// Same as [`ConfigStore::load_env`] over an explicit set of variables.
    pub fn load_vars<I>(&mut self, vars: I, prefix: &str) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped
                    .trim_start_matches('_')
                    .to_lowercase()
                    .replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(self.values.clone())
    }
}

/// Immutable view of a [`ConfigStore`] with typed getters.
///
/// Getters return `Ok(None)` for absent keys and an error for values that are
/// present but do not parse.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        self.get_parsed(key)
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.get_parsed(key)
    }

    pub fn get_u16(&self, key: &str) -> Result<Option<u16>, ConfigError> {
        self.get_parsed(key)
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.get_parsed(key)
    }

    /// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_keys_are_normalized() {
        let mut config = ConfigStore::new();
        let loaded = config.load_vars(
            vars(&[
                ("SCRAPER__QUEUE__HOCKEY", "hq"),
                ("SCRAPER__HTTP__PORT", "9000"),
                ("OTHER__HTTP__PORT", "1"),
            ]),
            "SCRAPER",
        );

        assert_eq!(loaded, 2);
        assert_eq!(config.get("queue.hockey"), Some("hq"));
        assert_eq!(config.snapshot().get_u16("http.port").unwrap(), Some(9000));
    }

    #[test]
    fn later_values_override_defaults() {
        let mut config = ConfigStore::new();
        config.set("worker.consumers", "1");
        config.load_vars(vars(&[("SCRAPER__WORKER__CONSUMERS", "4")]), "SCRAPER");
        assert_eq!(config.snapshot().get_usize("worker.consumers").unwrap(), Some(4));
    }

    #[test]
    fn unparsable_values_are_reported() {
        let mut config = ConfigStore::new();
        config.set("scraper.delay_ms", "soon");
        config.set("log.json", "maybe");
        let snapshot = config.snapshot();

        assert_eq!(
            snapshot.get_u64("scraper.delay_ms"),
            Err(ConfigError::Invalid {
                key: "scraper.delay_ms".into(),
                value: "soon".into()
            })
        );
        assert!(snapshot.get_bool("log.json").is_err());
        assert_eq!(snapshot.get_bool("missing").unwrap(), None);
    }

    #[test]
    fn blank_values_count_as_absent() {
        let mut config = ConfigStore::new();
        config.set("scraper.max_pages", "  ");
        let snapshot = config.snapshot();
        assert_eq!(snapshot.get_usize("scraper.max_pages").unwrap(), None);
        assert!(matches!(snapshot.require("scraper.max_pages"), Err(ConfigError::Missing(_))));
    }
}
