//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which backend to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite { path: PathBuf },
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Drop all nodes and edges when the store is first opened.
    #[serde(default = "default_reset_on_start")]
    pub reset_on_start: bool,
    /// Deadline for a single store round trip.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

fn default_reset_on_start() -> bool {
    true
}

fn default_op_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            reset_on_start: default_reset_on_start(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Config for a SQLite file at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Sqlite { path: path.into() },
            ..Default::default()
        }
    }

    /// Parse the `memory` keyword or treat anything else as a SQLite path.
    pub fn from_store_arg(arg: &str) -> Self {
        match arg.trim() {
            "" | "memory" => Self::default(),
            path => Self::sqlite(path),
        }
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_arg_selects_backend() {
        assert_eq!(StoreConfig::from_store_arg("memory").backend, StoreBackend::Memory);
        assert_eq!(
            StoreConfig::from_store_arg("/var/lib/alerts.db").backend,
            StoreBackend::Sqlite {
                path: PathBuf::from("/var/lib/alerts.db")
            }
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"backend":{"kind":"memory"}}"#).unwrap();
        assert!(cfg.reset_on_start);
        assert_eq!(cfg.op_timeout(), Duration::from_secs(5));
    }
}
