//! Shared store handle with one-time initialization.

use crate::{InMemoryGraphStore, StoreBackend, StoreConfig};
use alert_types::{GraphStore, GraphStoreError};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Open the configured backend and, if requested, reset it.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn GraphStore>, GraphStoreError> {
    let store: Arc<dyn GraphStore> = match &config.backend {
        StoreBackend::Memory => Arc::new(InMemoryGraphStore::new()),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite { path } => Arc::new(crate::SqliteGraphStore::new(path)?),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite { path } => {
            return Err(GraphStoreError::Connection(format!(
                "sqlite backend not compiled in (requested {})",
                path.display()
            )))
        }
    };
    if config.reset_on_start {
        store.reset().await?;
    }
    tracing::info!(backend = ?config.backend, reset = config.reset_on_start, "graph store opened");
    Ok(store)
}

/// Lazily opened store handle shared by every request task.
///
/// The first `get` connects (and resets, if configured); concurrent first callers wait on the
/// same initialization. A failed initialization leaves the handle empty so a later call retries.
pub struct SharedStore {
    config: StoreConfig,
    cell: OnceCell<Arc<dyn GraphStore>>,
}

impl SharedStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn GraphStore>, GraphStoreError> {
        self.cell
            .get_or_try_init(|| open(&self.config))
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_types::{Label, NodePattern, Params, Pattern, Properties, Value, USER_ID};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_store() {
        let shared = Arc::new(SharedStore::new(StoreConfig::default()));
        assert!(!shared.is_initialized());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let shared = Arc::clone(&shared);
            tasks.push(tokio::spawn(async move { shared.get().await.unwrap() }));
        }
        let mut stores = Vec::new();
        for t in tasks {
            stores.push(t.await.unwrap());
        }
        assert!(shared.is_initialized());
        assert!(stores.iter().all(|s| Arc::ptr_eq(s, &stores[0])));
    }

    #[tokio::test]
    async fn later_calls_do_not_reset() {
        let shared = SharedStore::new(StoreConfig::default());
        let store = shared.get().await.unwrap();
        let mut props = Properties::new();
        props.insert(USER_ID.into(), Value::from("u1"));
        store.add_node(Label::Alerter, props).await.unwrap();
        store.commit().await.unwrap();

        let again = shared.get().await.unwrap();
        let mut params = Params::new();
        params.insert("user_id".into(), Value::from("u1"));
        let rows = again
            .query(
                &Pattern::Nodes(NodePattern::new(Label::Alerter).bind(USER_ID, "user_id")),
                &params,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[cfg(not(feature = "sqlite"))]
    #[tokio::test]
    async fn unavailable_backend_fails_and_stays_uninitialized() {
        let shared = SharedStore::new(StoreConfig::sqlite("/tmp/alerts.db"));
        let err = shared.get().await.err().unwrap();
        assert!(matches!(err, GraphStoreError::Connection(_)));
        assert!(!shared.is_initialized());
    }
}
