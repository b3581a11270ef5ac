//! Sorted set of single-use keys, stored as a list of strings.

use crate::{GraphStoreError, Value};

/// Alerter key set. Always sorted in byte order and free of duplicates, so membership and
/// removal are binary searches and every reader sees the same canonical ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(Vec<String>);

impl KeySet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a key; returns false if it was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        match self.0.binary_search(&key) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, key);
                true
            }
        }
    }

    /// Remove a key; returns false if it was absent.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.0.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(pos) => {
                self.0.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Encode as a store list value.
    pub fn to_value(&self) -> Value {
        Value::List(self.0.iter().cloned().map(Value::String).collect())
    }

    /// Decode from a store value. A missing property (`Null`) is the empty set; anything other
    /// than a list of strings is malformed.
    pub fn from_value(value: &Value) -> Result<Self, GraphStoreError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        GraphStoreError::Malformed(format!("key set element {:?} is not a string", item))
                    })
                })
                .collect::<Result<KeySet, _>>(),
            other => Err(GraphStoreError::Malformed(format!(
                "key set is not a list: {:?}",
                other
            ))),
        }
    }
}

impl FromIterator<String> for KeySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut keys: Vec<String> = iter.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        Self(keys)
    }
}
