//! In-memory graph store.

use crate::{update_set, SetOp};
use alert_types::{
    str_param, param, Edge, EdgeId, GraphStore, GraphStoreError, Label, Mutation, MutationStats,
    Node, NodeHandle, NodeId, NodePattern, Params, Pattern, Properties, Relation, ResolvedPattern,
    ResultSet, Row,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex, RwLock};

type EdgeIndex = HashMap<NodeId, Vec<EdgeId>>;

/// Whole graph behind one lock, so every mutation is atomic with respect to the others.
#[derive(Debug, Clone, Default)]
struct GraphState {
    /// node_id -> node; ordered so scans are deterministic.
    nodes: BTreeMap<NodeId, Node>,
    /// edge_id -> edge.
    edges: BTreeMap<EdgeId, Edge>,
    /// from_node_id -> edge_ids.
    out_index: EdgeIndex,
    /// to_node_id -> edge_ids.
    in_index: EdgeIndex,
    next_node_id: NodeId,
    next_edge_id: EdgeId,
}

impl GraphState {
    fn matching(&self, pattern: &ResolvedPattern) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| pattern.matches(n))
            .map(|n| n.id)
            .collect()
    }

    fn resolve_ids(&self, pattern: &NodePattern, params: &Params) -> Result<Vec<NodeId>, GraphStoreError> {
        Ok(self.matching(&pattern.resolve(params)?))
    }

    fn node(&self, id: NodeId) -> Result<&Node, GraphStoreError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| GraphStoreError::Other(format!("node not found: {}", id)))
    }

    fn insert_node(&mut self, label: Label, properties: Properties) -> Node {
        self.next_node_id += 1;
        let node = Node {
            id: self.next_node_id,
            label,
            properties,
        };
        self.nodes.insert(node.id, node.clone());
        node
    }

    fn find_edge(&self, from: NodeId, to: NodeId, relation: Relation) -> Option<EdgeId> {
        self.out_index.get(&from).and_then(|ids| {
            ids.iter().copied().find(|id| {
                self.edges
                    .get(id)
                    .is_some_and(|e| e.to == to && e.relation == relation)
            })
        })
    }

    fn insert_edge(&mut self, from: NodeId, to: NodeId, relation: Relation) {
        self.next_edge_id += 1;
        let edge = Edge {
            id: self.next_edge_id,
            from,
            to,
            relation,
        };
        self.out_index.entry(from).or_default().push(edge.id);
        self.in_index.entry(to).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
    }

    fn remove_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(&id) {
            Self::remove_from_index(&mut self.out_index, edge.from, id);
            Self::remove_from_index(&mut self.in_index, edge.to, id);
        }
    }

    fn remove_from_index(index: &mut EdgeIndex, node_id: NodeId, edge_id: EdgeId) {
        if let Some(list) = index.get_mut(&node_id) {
            list.retain(|x| *x != edge_id);
            if list.is_empty() {
                index.remove(&node_id);
            }
        }
    }

    fn is_orphan(&self, id: NodeId) -> bool {
        !self.out_index.contains_key(&id) && !self.in_index.contains_key(&id)
    }

    fn pair_row(&self, from: NodeId, to: NodeId) -> Result<Row, GraphStoreError> {
        Ok(Row::new(vec![self.node(from)?.clone(), self.node(to)?.clone()]))
    }

    fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
        let rows = match pattern {
            Pattern::Nodes(p) => {
                let resolved = p.resolve(params)?;
                self.nodes
                    .values()
                    .filter(|n| resolved.matches(n))
                    .map(|n| Row::new(vec![n.clone()]))
                    .collect()
            }
            Pattern::Related { from, relation, to } => {
                let from = from.resolve(params)?;
                let to = to.resolve(params)?;
                let mut rows = Vec::new();
                for edge in self.edges.values().filter(|e| e.relation == *relation) {
                    let (f, t) = (self.node(edge.from)?, self.node(edge.to)?);
                    if from.matches(f) && to.matches(t) {
                        rows.push(Row::new(vec![f.clone(), t.clone()]));
                    }
                }
                rows
            }
            Pattern::AllNodes => self
                .nodes
                .values()
                .map(|n| Row::new(vec![n.clone()]))
                .collect(),
        };
        Ok(ResultSet::new(rows))
    }

    fn apply(&mut self, mutation: &Mutation, params: &Params) -> Result<ResultSet, GraphStoreError> {
        let mut stats = MutationStats::default();
        let mut rows = Vec::new();
        match mutation {
            Mutation::MergeNode(p) => {
                let resolved = p.resolve(params)?;
                let node = match self.matching(&resolved).first() {
                    Some(id) => self.node(*id)?.clone(),
                    None => {
                        stats.nodes_created += 1;
                        self.insert_node(resolved.label, resolved.properties)
                    }
                };
                rows.push(Row::new(vec![node]));
            }
            Mutation::SetProperty {
                node,
                property,
                param: name,
            } => {
                let value = param(params, name)?.clone();
                for id in self.resolve_ids(node, params)? {
                    if let Some(n) = self.nodes.get_mut(&id) {
                        n.properties.insert(property.clone(), value.clone());
                        stats.properties_set += 1;
                        rows.push(Row::new(vec![n.clone()]));
                    }
                }
            }
            Mutation::AddToSet {
                node,
                property,
                param: name,
            } => {
                let element = str_param(params, name)?;
                for id in self.resolve_ids(node, params)? {
                    if let Some(n) = self.nodes.get_mut(&id) {
                        if update_set(&mut n.properties, property, element, SetOp::Add)? {
                            stats.properties_set += 1;
                        }
                        rows.push(Row::new(vec![n.clone()]));
                    }
                }
            }
            Mutation::TakeFromSet {
                node,
                property,
                param: name,
            } => {
                let element = str_param(params, name)?;
                let ids = self.resolve_ids(node, params)?;
                if ids.is_empty() {
                    return Err(GraphStoreError::ConditionFailed(format!(
                        "no {} node to take from",
                        node.label
                    )));
                }
                // Validate every node first so a failure leaves the graph untouched.
                let mut updated = Vec::with_capacity(ids.len());
                for id in &ids {
                    let mut props = self.node(*id)?.properties.clone();
                    if !update_set(&mut props, property, element, SetOp::Take)? {
                        return Err(GraphStoreError::ConditionFailed(format!(
                            "{} does not hold the element",
                            property
                        )));
                    }
                    updated.push((*id, props));
                }
                for (id, props) in updated {
                    if let Some(n) = self.nodes.get_mut(&id) {
                        n.properties = props;
                        stats.properties_set += 1;
                        rows.push(Row::new(vec![n.clone()]));
                    }
                }
            }
            Mutation::MergeRelationship { from, relation, to } => {
                let to_ids = self.resolve_ids(to, params)?;
                for f in self.resolve_ids(from, params)? {
                    for t in &to_ids {
                        if self.find_edge(f, *t, *relation).is_none() {
                            self.insert_edge(f, *t, *relation);
                            stats.relationships_created += 1;
                        }
                        rows.push(self.pair_row(f, *t)?);
                    }
                }
            }
            Mutation::DeleteRelationship { from, relation, to } => {
                let to_ids = self.resolve_ids(to, params)?;
                for f in self.resolve_ids(from, params)? {
                    for t in &to_ids {
                        if let Some(edge_id) = self.find_edge(f, *t, *relation) {
                            rows.push(self.pair_row(f, *t)?);
                            self.remove_edge(edge_id);
                            stats.relationships_deleted += 1;
                        }
                    }
                }
            }
            Mutation::DeleteOrphans { spare } => {
                let orphans: Vec<NodeId> = self
                    .nodes
                    .values()
                    .filter(|n| !spare.contains(&n.label) && self.is_orphan(n.id))
                    .map(|n| n.id)
                    .collect();
                for id in orphans {
                    if let Some(n) = self.nodes.remove(&id) {
                        stats.nodes_deleted += 1;
                        rows.push(Row::new(vec![n]));
                    }
                }
            }
        }
        Ok(ResultSet::new(rows).with_stats(stats))
    }
}

/// In-memory implementation of GraphStore.
/// The graph lives behind a single RwLock; staged nodes wait in a separate batch until commit.
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
    staged: Mutex<Vec<(Label, Properties)>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            staged: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn add_node(
        &self,
        label: Label,
        properties: Properties,
    ) -> Result<NodeHandle, GraphStoreError> {
        let mut staged = self.staged.lock().await;
        staged.push((label, properties));
        Ok(NodeHandle {
            label,
            slot: staged.len() - 1,
        })
    }

    async fn commit(&self) -> Result<Vec<Node>, GraphStoreError> {
        // Drain only once the write lock is held; a cancelled commit leaves the batch staged.
        let mut state = self.state.write().await;
        let batch = std::mem::take(&mut *self.staged.lock().await);
        Ok(batch
            .into_iter()
            .map(|(label, properties)| state.insert_node(label, properties))
            .collect())
    }

    async fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
        self.state.read().await.query(pattern, params)
    }

    async fn mutate(
        &self,
        mutation: &Mutation,
        params: &Params,
    ) -> Result<ResultSet, GraphStoreError> {
        self.state.write().await.apply(mutation, params)
    }

    async fn transact(
        &self,
        mutations: &[Mutation],
        params: &Params,
    ) -> Result<Vec<ResultSet>, GraphStoreError> {
        let mut guard = self.state.write().await;
        let mut working = guard.clone();
        let mut results = Vec::with_capacity(mutations.len());
        for m in mutations {
            results.push(working.apply(m, params)?);
        }
        *guard = working;
        Ok(results)
    }

    async fn reset(&self) -> Result<(), GraphStoreError> {
        *self.state.write().await = GraphState::default();
        self.staged.lock().await.clear();
        Ok(())
    }
}
