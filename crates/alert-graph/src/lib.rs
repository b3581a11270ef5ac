//! Graph store adapters and the once-initialized shared store handle.

mod config;
mod memory;
mod shared;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use alert_types::{
    GraphStore, GraphStoreError, Label, Mutation, Node, NodeHandle, NodePattern, Params, Pattern,
    Relation, ResultSet, Row, Value,
};
pub use config::{StoreBackend, StoreConfig};
pub use memory::InMemoryGraphStore;
pub use shared::{open, SharedStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGraphStore;

use alert_types::{KeySet, Properties};

#[derive(Debug, Clone, Copy)]
pub(crate) enum SetOp {
    Add,
    Take,
}

/// Insert into or remove from the sorted set stored under `property`.
/// Returns whether the set changed; the property is only rewritten when it did.
pub(crate) fn update_set(
    properties: &mut Properties,
    property: &str,
    element: &str,
    op: SetOp,
) -> Result<bool, GraphStoreError> {
    let mut set = KeySet::from_value(properties.get(property).unwrap_or(&Value::Null))?;
    let changed = match op {
        SetOp::Add => set.insert(element),
        SetOp::Take => set.remove(element),
    };
    if changed {
        properties.insert(property.to_string(), set.to_value());
    }
    Ok(changed)
}
