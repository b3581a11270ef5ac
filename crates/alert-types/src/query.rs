//! Parameterized graph patterns, mutations, and result sets.
//!
//! Patterns never embed caller-supplied values: a `NodePattern` binds property keys to
//! parameter names, and values arrive separately in a `Params` map at execution time.

use crate::{GraphStoreError, Label, Node, Params, Properties, Relation, Value};
use std::collections::VecDeque;

/// Property equality bound to a named parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub property: String,
    pub param: String,
}

/// Node selector: a label plus property equalities bound to parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub label: Label,
    pub bindings: Vec<Binding>,
}

impl NodePattern {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            bindings: Vec::new(),
        }
    }

    /// Require `property` to equal the value of parameter `param`.
    pub fn bind(mut self, property: impl Into<String>, param: impl Into<String>) -> Self {
        self.bindings.push(Binding {
            property: property.into(),
            param: param.into(),
        });
        self
    }

    /// Substitute parameter values; fails if any bound parameter is missing.
    pub fn resolve(&self, params: &Params) -> Result<ResolvedPattern, GraphStoreError> {
        let mut properties = Properties::new();
        for b in &self.bindings {
            let value = param(params, &b.param)?;
            properties.insert(b.property.clone(), value.clone());
        }
        Ok(ResolvedPattern {
            label: self.label,
            properties,
        })
    }
}

/// A node pattern with its parameters substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPattern {
    pub label: Label,
    pub properties: Properties,
}

impl ResolvedPattern {
    pub fn matches(&self, node: &Node) -> bool {
        node.label == self.label
            && self
                .properties
                .iter()
                .all(|(k, v)| node.properties.get(k) == Some(v))
    }
}

/// Look up a named parameter.
pub fn param<'a>(params: &'a Params, name: &str) -> Result<&'a Value, GraphStoreError> {
    params
        .get(name)
        .ok_or_else(|| GraphStoreError::MissingParameter(name.to_string()))
}

/// Look up a named parameter that must be a string.
pub fn str_param<'a>(params: &'a Params, name: &str) -> Result<&'a str, GraphStoreError> {
    param(params, name)?
        .as_str()
        .ok_or_else(|| GraphStoreError::Malformed(format!("parameter ${} is not a string", name)))
}

/// Read pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Every node matching the selector; rows are `[node]`.
    Nodes(NodePattern),
    /// Every `(from)-[relation]->(to)` edge whose endpoints match; rows are `[from, to]`.
    Related {
        from: NodePattern,
        relation: Relation,
        to: NodePattern,
    },
    /// Full-graph scan; rows are `[node]`.
    AllNodes,
}

/// Write pattern. Each mutation is applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Return the first node matching the selector, creating it from the bound properties if
    /// none exists. Rows: `[node]`.
    MergeNode(NodePattern),
    /// Set `property` to the value of `param` on every matching node. Rows: updated nodes.
    SetProperty {
        node: NodePattern,
        property: String,
        param: String,
    },
    /// Insert the string `param` into the sorted set held in `property`. Rows: matched nodes;
    /// `properties_set` counts nodes whose set actually grew.
    AddToSet {
        node: NodePattern,
        property: String,
        param: String,
    },
    /// Remove the string `param` from the sorted set held in `property`, failing with
    /// `ConditionFailed` unless every matched node held it. Rows: updated nodes.
    TakeFromSet {
        node: NodePattern,
        property: String,
        param: String,
    },
    /// Create the edge between every matching pair unless it already exists. Rows: `[from, to]`.
    MergeRelationship {
        from: NodePattern,
        relation: Relation,
        to: NodePattern,
    },
    /// Delete the edge between every matching pair. Rows: `[from, to]` per deleted edge.
    DeleteRelationship {
        from: NodePattern,
        relation: Relation,
        to: NodePattern,
    },
    /// Delete every node without incident edges, except those labelled in `spare`.
    /// Rows: deleted nodes.
    DeleteOrphans { spare: Vec<Label> },
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub nodes: Vec<Node>,
}

impl Row {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn node(&self, idx: usize) -> Result<&Node, GraphStoreError> {
        self.nodes
            .get(idx)
            .ok_or_else(|| GraphStoreError::Malformed(format!("row has no column {}", idx)))
    }
}

/// Counters reported by a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
    pub properties_set: usize,
}

/// Forward-only result of a query or mutation.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: VecDeque<Row>,
    pub stats: MutationStats,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            stats: MutationStats::default(),
        }
    }

    pub fn with_stats(mut self, stats: MutationStats) -> Self {
        self.stats = stats;
        self
    }

    /// True when no rows remain.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows remaining.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::USER_ID;

    #[test]
    fn resolve_reports_missing_parameter() {
        let pattern = NodePattern::new(Label::Alerter).bind(USER_ID, "user_id");
        let err = pattern.resolve(&Params::new()).unwrap_err();
        assert!(matches!(err, GraphStoreError::MissingParameter(p) if p == "user_id"));
    }

    #[test]
    fn resolved_pattern_matches_label_and_properties() {
        let pattern = NodePattern::new(Label::Alerter).bind(USER_ID, "user_id");
        let mut params = Params::new();
        params.insert("user_id".into(), Value::from("u1"));
        let resolved = pattern.resolve(&params).unwrap();

        let mut properties = Properties::new();
        properties.insert(USER_ID.into(), Value::from("u1"));
        let mut node = Node {
            id: 1,
            label: Label::Alerter,
            properties,
        };
        assert!(resolved.matches(&node));
        node.label = Label::Channel;
        assert!(!resolved.matches(&node));
    }

    #[test]
    fn result_set_is_forward_only() {
        let mut rs = ResultSet::new(vec![Row::new(vec![]), Row::new(vec![])]);
        assert_eq!(rs.len(), 2);
        assert!(rs.next().is_some());
        assert!(rs.next().is_some());
        assert!(rs.next().is_none());
        assert!(rs.is_empty());
    }
}
