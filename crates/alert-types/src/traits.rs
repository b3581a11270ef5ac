//! Traits for the graph store adapter and the subscription service.

use crate::{
    ChannelTarget, Label, Mutation, Node, NodeHandle, NodePattern, Params, Pattern, Properties,
    Relation, ResultSet, Unsubscribed,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Graph store abstraction: the single point of access to the backing store.
///
/// Every call is one round trip and is atomic on its own; `transact` is the only way to make
/// several mutations atomic together.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Stage a node for creation; nothing is visible until `commit`.
    async fn add_node(
        &self,
        label: Label,
        properties: Properties,
    ) -> Result<NodeHandle, GraphStoreError>;

    /// Create all staged nodes. Returned nodes are ordered by `NodeHandle::slot`.
    async fn commit(&self) -> Result<Vec<Node>, GraphStoreError>;

    /// Run a read pattern.
    async fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError>;

    /// Run a parameterized mutation.
    async fn mutate(
        &self,
        mutation: &Mutation,
        params: &Params,
    ) -> Result<ResultSet, GraphStoreError>;

    /// Run mutations in order as one transaction: either all apply or none do.
    async fn transact(
        &self,
        mutations: &[Mutation],
        params: &Params,
    ) -> Result<Vec<ResultSet>, GraphStoreError>;

    /// Drop every node and edge.
    async fn reset(&self) -> Result<(), GraphStoreError>;

    /// Create `(from)-[relation]->(to)` unless it already exists.
    async fn create_relationship(
        &self,
        from: &NodePattern,
        relation: Relation,
        to: &NodePattern,
        params: &Params,
    ) -> Result<ResultSet, GraphStoreError> {
        let m = Mutation::MergeRelationship {
            from: from.clone(),
            relation,
            to: to.clone(),
        };
        self.mutate(&m, params).await
    }

    /// Delete `(from)-[relation]->(to)`.
    async fn delete_relationship(
        &self,
        from: &NodePattern,
        relation: Relation,
        to: &NodePattern,
        params: &Params,
    ) -> Result<ResultSet, GraphStoreError> {
        let m = Mutation::DeleteRelationship {
            from: from.clone(),
            relation,
            to: to.clone(),
        };
        self.mutate(&m, params).await
    }
}

/// Alerter registration, key issuance, and subscription management.
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Register an alerter with an empty key set.
    async fn create_alerter(&self, user_id: &str) -> Result<(), SubscriptionError>;

    /// Mint a fresh single-use key, creating the alerter if needed.
    async fn issue_key(&self, user_id: &str) -> Result<String, SubscriptionError>;

    /// Consume `key` and subscribe the channel to the alerter.
    async fn subscribe(
        &self,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
        key: &str,
    ) -> Result<(), SubscriptionError>;

    /// Remove the subscription and prune nodes left without relationships.
    async fn unsubscribe(
        &self,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Unsubscribed, SubscriptionError>;

    /// Alerters subscribed by one channel, or by every channel of a community.
    async fn list_alerters_for_target(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<String>, SubscriptionError>;

    /// Community -> channel map used for fan-out.
    async fn list_targets_for_alerter(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, String>, SubscriptionError>;

    /// Every subscribed channel of an alerter.
    async fn list_channels_for_alerter(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChannelTarget>, SubscriptionError>;

    /// Number of outstanding (unconsumed) keys.
    async fn key_count(&self, user_id: &str) -> Result<usize, SubscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("missing parameter: ${0}")]
    MissingParameter(String),
    #[error("malformed value: {0}")]
    Malformed(String),
    #[error("condition failed: {0}")]
    ConditionFailed(String),
    #[error("graph store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid key")]
    InvalidKey,
    #[error("store unreachable during {step}: {message}")]
    ConnectionFailure { step: &'static str, message: String },
    #[error("malformed state during {step}: {message}")]
    MalformedState { step: &'static str, message: String },
    #[error("{step} timed out after {timeout_ms}ms")]
    Timeout { step: &'static str, timeout_ms: u64 },
    #[error("{step}: {source}")]
    Store {
        step: &'static str,
        #[source]
        source: GraphStoreError,
    },
}

impl SubscriptionError {
    /// Wrap an adapter error with the step that failed.
    pub fn from_store(step: &'static str, err: GraphStoreError) -> Self {
        match err {
            GraphStoreError::Connection(message) => Self::ConnectionFailure { step, message },
            GraphStoreError::Malformed(message) => Self::MalformedState { step, message },
            source => Self::Store { step, source },
        }
    }
}
