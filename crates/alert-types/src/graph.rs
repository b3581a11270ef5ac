//! Graph vocabulary: labels, relationship types, store-native values, node and edge records.

use crate::GraphStoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property key holding an alerter's external identity.
pub const USER_ID: &str = "userID";
/// Property key holding a community (guild) identity.
pub const GUILD_ID: &str = "guildID";
/// Property key holding a channel identity inside a community.
pub const CHANNEL_ID: &str = "channelID";
/// Property key holding an alerter's sorted single-use key set.
pub const KEYS: &str = "keys";

pub type NodeId = u64;
pub type EdgeId = u64;

/// Property map of a node, ordered for deterministic encoding.
pub type Properties = BTreeMap<String, Value>;

/// Out-of-band parameters bound into a pattern or mutation by name.
pub type Params = BTreeMap<String, Value>;

/// Node label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Alerter,
    Channel,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Alerter => "Alerter",
            Label::Channel => "Channel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Alerter" => Some(Label::Alerter),
            "Channel" => Some(Label::Channel),
            _ => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Delivery target -> alerter: the alerter's notifications are routed to the target.
    Subscribes,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Subscribes => "Subscribes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Subscribes" => Some(Relation::Subscribes),
            _ => None,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-native heterogeneous property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A stored node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub label: Label,
    pub properties: Properties,
}

impl Node {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property, or `Malformed` when absent or of another type.
    pub fn str_property(&self, key: &str) -> Result<&str, GraphStoreError> {
        self.property(key).and_then(Value::as_str).ok_or_else(|| {
            GraphStoreError::Malformed(format!(
                "{} node {} has no string property {}",
                self.label, self.id, key
            ))
        })
    }
}

/// A stored relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
}

/// Handle to a node staged by `GraphStore::add_node`; `slot` indexes the batch returned by
/// the next `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    pub label: Label,
    pub slot: usize,
}
