//! Process configuration from environment variables.

use alert_graph::StoreConfig;
use std::net::SocketAddr;

const DEFAULT_LISTEN: &str = "0.0.0.0:8002";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Listen address plus store settings.
///
/// | Variable | Meaning | Default |
/// |---|---|---|
/// | `ALERT_LISTEN` | socket address to bind | `0.0.0.0:8002` |
/// | `ALERT_STORE` | `memory` or a SQLite file path | `memory` |
/// | `ALERT_RESET_ON_START` | wipe the graph when first opened | `true` |
/// | `ALERT_OP_TIMEOUT_MS` | deadline per store round trip | `5000` |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen = lookup("ALERT_LISTEN")
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "ALERT_LISTEN",
                message: e.to_string(),
            })?;

        let mut store = StoreConfig::from_store_arg(&lookup("ALERT_STORE").unwrap_or_default());
        if let Some(raw) = lookup("ALERT_RESET_ON_START") {
            store.reset_on_start = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        var: "ALERT_RESET_ON_START",
                        message: format!("expected a boolean, got {:?}", other),
                    })
                }
            };
        }
        if let Some(raw) = lookup("ALERT_OP_TIMEOUT_MS") {
            store.op_timeout_ms = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "ALERT_OP_TIMEOUT_MS",
                    message: e.to_string(),
                }
            })?;
        }

        Ok(Self { listen, store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_graph::StoreBackend;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.listen, DEFAULT_LISTEN.parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.store, StoreConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("ALERT_LISTEN", "127.0.0.1:9000"),
            ("ALERT_STORE", "/data/alerts.db"),
            ("ALERT_RESET_ON_START", "false"),
            ("ALERT_OP_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.listen.port(), 9000);
        assert!(matches!(cfg.store.backend, StoreBackend::Sqlite { .. }));
        assert!(!cfg.store.reset_on_start);
        assert_eq!(cfg.store.op_timeout_ms, 250);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[("ALERT_OP_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("ALERT_OP_TIMEOUT_MS"));
        let err = AppConfig::from_lookup(lookup(&[("ALERT_RESET_ON_START", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("ALERT_RESET_ON_START"));
    }
}
