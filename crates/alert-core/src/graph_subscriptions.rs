//! Subscription service over a graph store.

use crate::locks::KeyedLocks;
use alert_types::{
    ChannelTarget, GraphStore, GraphStoreError, KeySet, Label, Mutation, Node, NodePattern,
    Params, Pattern, Properties, Relation, SubscriptionError, SubscriptionService, Unsubscribed,
    Value, CHANNEL_ID, GUILD_ID, KEYS, USER_ID,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const P_USER: &str = "user_id";
const P_GUILD: &str = "guild_id";
const P_CHANNEL: &str = "channel_id";
const P_KEY: &str = "key";

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_MINT_ATTEMPTS: usize = 3;

fn alerter() -> NodePattern {
    NodePattern::new(Label::Alerter).bind(USER_ID, P_USER)
}

fn channel() -> NodePattern {
    NodePattern::new(Label::Channel)
        .bind(GUILD_ID, P_GUILD)
        .bind(CHANNEL_ID, P_CHANNEL)
}

fn community() -> NodePattern {
    NodePattern::new(Label::Channel).bind(GUILD_ID, P_GUILD)
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

fn channel_target(node: &Node) -> Result<ChannelTarget, GraphStoreError> {
    Ok(ChannelTarget {
        guild_id: node.str_property(GUILD_ID)?.to_string(),
        channel_id: node.str_property(CHANNEL_ID)?.to_string(),
    })
}

/// Subscription service backed by any `GraphStore`.
///
/// Mutating workflows for one alerter run under that alerter's lock; every store round trip is
/// bounded by `op_timeout`. Key consumption, channel creation and edge creation in `subscribe`
/// commit as a single transaction, as do edge deletion and pruning in `unsubscribe`.
pub struct GraphSubscriptions {
    store: Arc<dyn GraphStore>,
    locks: KeyedLocks,
    op_timeout: Duration,
}

impl GraphSubscriptions {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::default(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    async fn round_trip<T, F>(&self, step: &'static str, fut: F) -> Result<T, SubscriptionError>
    where
        F: Future<Output = Result<T, GraphStoreError>>,
    {
        debug!(step, "store round trip");
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| SubscriptionError::from_store(step, e)),
            Err(_) => Err(SubscriptionError::Timeout {
                step,
                timeout_ms: self.op_timeout.as_millis() as u64,
            }),
        }
    }

    async fn load_alerter(&self, user_id: &str) -> Result<Option<Node>, SubscriptionError> {
        let mut rows = self
            .round_trip(
                "load alerter",
                self.store
                    .query(&Pattern::Nodes(alerter()), &params(&[(P_USER, user_id)])),
            )
            .await?;
        Ok(rows.next().and_then(|row| row.nodes.into_iter().next()))
    }

    async fn require_alerter(&self, user_id: &str) -> Result<Node, SubscriptionError> {
        self.load_alerter(user_id)
            .await?
            .ok_or_else(|| SubscriptionError::NotFound(format!("alerter {}", user_id)))
    }

    fn decode_keys(node: &Node) -> Result<KeySet, SubscriptionError> {
        KeySet::from_value(node.property(KEYS).unwrap_or(&Value::Null))
            .map_err(|e| SubscriptionError::from_store("decode keys", e))
    }
}

#[async_trait]
impl SubscriptionService for GraphSubscriptions {
    async fn create_alerter(&self, user_id: &str) -> Result<(), SubscriptionError> {
        let _guard = self.locks.lock(user_id).await;
        if self.load_alerter(user_id).await?.is_some() {
            return Err(SubscriptionError::AlreadyExists(format!("alerter {}", user_id)));
        }

        let mut properties = Properties::new();
        properties.insert(USER_ID.to_string(), Value::from(user_id));
        properties.insert(KEYS.to_string(), KeySet::new().to_value());
        let handle = self
            .round_trip("stage alerter", self.store.add_node(Label::Alerter, properties))
            .await?;
        let committed = self.round_trip("commit alerter", self.store.commit()).await?;
        let ours = committed.get(handle.slot).is_some_and(|node| {
            node.label == Label::Alerter
                && node.property(USER_ID).and_then(Value::as_str) == Some(user_id)
        });
        // Another commit may have flushed the staged node first; it must exist either way.
        if !ours && self.load_alerter(user_id).await?.is_none() {
            return Err(SubscriptionError::Store {
                step: "commit alerter",
                source: GraphStoreError::Other(format!(
                    "staged alerter {} missing after commit",
                    user_id
                )),
            });
        }
        info!(user_id, "alerter created");
        Ok(())
    }

    async fn issue_key(&self, user_id: &str) -> Result<String, SubscriptionError> {
        let _guard = self.locks.lock(user_id).await;
        let base = params(&[(P_USER, user_id)]);
        let merged = self
            .round_trip(
                "merge alerter",
                self.store.mutate(&Mutation::MergeNode(alerter()), &base),
            )
            .await?;
        if merged.stats.nodes_created > 0 {
            info!(user_id, "alerter created on first key issuance");
        }

        let add_key = Mutation::AddToSet {
            node: alerter(),
            property: KEYS.to_string(),
            param: P_KEY.to_string(),
        };
        for _ in 0..MAX_MINT_ATTEMPTS {
            let key = Uuid::new_v4().to_string();
            let mut p = base.clone();
            p.insert(P_KEY.to_string(), Value::from(key.as_str()));
            let stored = self
                .round_trip("store key", self.store.mutate(&add_key, &p))
                .await?;
            if stored.is_empty() {
                return Err(SubscriptionError::NotFound(format!("alerter {}", user_id)));
            }
            if stored.stats.properties_set > 0 {
                info!(user_id, "key issued");
                return Ok(key);
            }
            warn!(user_id, "minted key collides with an outstanding key, retrying");
        }
        Err(SubscriptionError::Store {
            step: "mint key",
            source: GraphStoreError::Other("could not mint a unique key".to_string()),
        })
    }

    async fn subscribe(
        &self,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
        key: &str,
    ) -> Result<(), SubscriptionError> {
        let _guard = self.locks.lock(user_id).await;
        let node = self.require_alerter(user_id).await?;
        if !Self::decode_keys(&node)?.contains(key) {
            warn!(user_id, guild_id, channel_id, "subscribe rejected: key not outstanding");
            return Err(SubscriptionError::InvalidKey);
        }

        let steps = [
            Mutation::TakeFromSet {
                node: alerter(),
                property: KEYS.to_string(),
                param: P_KEY.to_string(),
            },
            Mutation::MergeNode(channel()),
            Mutation::MergeRelationship {
                from: channel(),
                relation: Relation::Subscribes,
                to: alerter(),
            },
        ];
        let p = params(&[
            (P_USER, user_id),
            (P_GUILD, guild_id),
            (P_CHANNEL, channel_id),
            (P_KEY, key),
        ]);
        let results = self
            .round_trip("consume key and subscribe", self.store.transact(&steps, &p))
            .await
            .map_err(|e| match e {
                SubscriptionError::Store {
                    source: GraphStoreError::ConditionFailed(_),
                    ..
                } => SubscriptionError::InvalidKey,
                other => other,
            })?;

        let channel_created = results.get(1).map_or(0, |r| r.stats.nodes_created);
        let edge_created = results.get(2).map_or(0, |r| r.stats.relationships_created);
        info!(
            user_id,
            guild_id,
            channel_id,
            channel_created,
            edge_created,
            "subscribed"
        );
        Ok(())
    }

    async fn unsubscribe(
        &self,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Unsubscribed, SubscriptionError> {
        let _guard = self.locks.lock(user_id).await;
        self.require_alerter(user_id).await?;

        let p = params(&[(P_USER, user_id), (P_GUILD, guild_id), (P_CHANNEL, channel_id)]);
        let target = self
            .round_trip("load channel", self.store.query(&Pattern::Nodes(channel()), &p))
            .await?;
        if target.is_empty() {
            return Err(SubscriptionError::NotFound(format!(
                "channel {}/{}",
                guild_id, channel_id
            )));
        }
        let edge = Pattern::Related {
            from: channel(),
            relation: Relation::Subscribes,
            to: alerter(),
        };
        if self
            .round_trip("load subscription", self.store.query(&edge, &p))
            .await?
            .is_empty()
        {
            return Err(SubscriptionError::NotFound(format!(
                "subscription {}/{} -> {}",
                guild_id, channel_id, user_id
            )));
        }

        let steps = [
            Mutation::DeleteRelationship {
                from: channel(),
                relation: Relation::Subscribes,
                to: alerter(),
            },
            Mutation::DeleteOrphans {
                spare: vec![Label::Alerter],
            },
        ];
        let results = self
            .round_trip("unsubscribe and prune", self.store.transact(&steps, &p))
            .await?;
        let pruned_nodes = results.get(1).map_or(0, |r| r.stats.nodes_deleted);
        info!(user_id, guild_id, channel_id, pruned_nodes, "unsubscribed");
        Ok(Unsubscribed { pruned_nodes })
    }

    async fn list_alerters_for_target(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<String>, SubscriptionError> {
        let (target, p, name) = match channel_id {
            Some(c) => (
                channel(),
                params(&[(P_GUILD, guild_id), (P_CHANNEL, c)]),
                format!("channel {}/{}", guild_id, c),
            ),
            None => (
                community(),
                params(&[(P_GUILD, guild_id)]),
                format!("community {}", guild_id),
            ),
        };
        let anchors = self
            .round_trip("load target", self.store.query(&Pattern::Nodes(target.clone()), &p))
            .await?;
        if anchors.is_empty() {
            return Err(SubscriptionError::NotFound(name));
        }

        let related = Pattern::Related {
            from: target,
            relation: Relation::Subscribes,
            to: NodePattern::new(Label::Alerter),
        };
        let rows = self
            .round_trip("list alerters", self.store.query(&related, &p))
            .await?;
        let mut ids = rows
            .map(|row| -> Result<String, GraphStoreError> {
                Ok(row.node(1)?.str_property(USER_ID)?.to_string())
            })
            .collect::<Result<Vec<_>, GraphStoreError>>()
            .map_err(|e| SubscriptionError::from_store("decode alerters", e))?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn list_targets_for_alerter(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, String>, SubscriptionError> {
        // Sorted input: the greatest channel of each community wins.
        Ok(self
            .list_channels_for_alerter(user_id)
            .await?
            .into_iter()
            .map(|t| (t.guild_id, t.channel_id))
            .collect())
    }

    async fn list_channels_for_alerter(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChannelTarget>, SubscriptionError> {
        self.require_alerter(user_id).await?;
        let related = Pattern::Related {
            from: NodePattern::new(Label::Channel),
            relation: Relation::Subscribes,
            to: alerter(),
        };
        let rows = self
            .round_trip(
                "list channels",
                self.store.query(&related, &params(&[(P_USER, user_id)])),
            )
            .await?;
        let mut targets = rows
            .map(|row| channel_target(row.node(0)?))
            .collect::<Result<Vec<_>, GraphStoreError>>()
            .map_err(|e| SubscriptionError::from_store("decode channels", e))?;
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    async fn key_count(&self, user_id: &str) -> Result<usize, SubscriptionError> {
        let node = self.require_alerter(user_id).await?;
        Ok(Self::decode_keys(&node)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_graph::InMemoryGraphStore;
    use alert_types::{NodeHandle, ResultSet};
    use std::collections::HashSet;

    fn service() -> GraphSubscriptions {
        GraphSubscriptions::new(Arc::new(InMemoryGraphStore::new()))
    }

    async fn labelled(svc: &GraphSubscriptions, label: Label) -> usize {
        svc.store()
            .query(&Pattern::AllNodes, &Params::new())
            .await
            .unwrap()
            .filter(|row| row.nodes[0].label == label)
            .count()
    }

    #[tokio::test]
    async fn issued_keys_are_distinct() {
        let svc = service();
        let mut seen = HashSet::new();
        for _ in 0..20 {
            assert!(seen.insert(svc.issue_key("u1").await.unwrap()));
        }
        assert_eq!(svc.key_count("u1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn key_is_single_use() {
        let svc = service();
        let key = svc.issue_key("u1").await.unwrap();
        svc.subscribe("u1", "g1", "c1", &key).await.unwrap();

        let err = svc.subscribe("u1", "g1", "c1", &key).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidKey));
        let err = svc.subscribe("u1", "g1", "c2", &key).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidKey));
        assert_eq!(svc.key_count("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn subscribe_requires_known_alerter_and_issued_key() {
        let svc = service();
        let err = svc.subscribe("ghost", "g1", "c1", "k").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(_)));

        svc.create_alerter("u1").await.unwrap();
        let err = svc.subscribe("u1", "g1", "c1", "typo").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidKey));
        assert_eq!(labelled(&svc, Label::Channel).await, 0);
    }

    #[tokio::test]
    async fn create_alerter_rejects_duplicates() {
        let svc = service();
        svc.create_alerter("u1").await.unwrap();
        let err = svc.create_alerter("u1").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadyExists(_)));
        assert_eq!(labelled(&svc, Label::Alerter).await, 1);
        assert_eq!(svc.key_count("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn repeated_subscribe_creates_one_channel() {
        let svc = service();
        for _ in 0..2 {
            let key = svc.issue_key("u1").await.unwrap();
            svc.subscribe("u1", "g1", "c1", &key).await.unwrap();
        }
        let other = svc.issue_key("u2").await.unwrap();
        svc.subscribe("u2", "g1", "c1", &other).await.unwrap();

        assert_eq!(labelled(&svc, Label::Channel).await, 1);
        assert_eq!(
            svc.list_alerters_for_target("g1", Some("c1")).await.unwrap(),
            ["u1", "u2"]
        );
    }

    #[tokio::test]
    async fn end_to_end_subscribe_and_prune() {
        subscribe_and_prune(&service()).await;
    }

    #[tokio::test]
    async fn end_to_end_against_sqlite() {
        let store = alert_graph::SqliteGraphStore::open_in_memory().unwrap();
        let svc = GraphSubscriptions::new(Arc::new(store));
        subscribe_and_prune(&svc).await;

        let key = svc.issue_key("u1").await.unwrap();
        svc.subscribe("u1", "g1", "c2", &key).await.unwrap();
        assert!(matches!(
            svc.subscribe("u1", "g1", "c2", &key).await.unwrap_err(),
            SubscriptionError::InvalidKey
        ));
        assert_eq!(svc.key_count("u1").await.unwrap(), 0);
        assert_eq!(
            svc.list_alerters_for_target("g1", None).await.unwrap(),
            vec!["u1".to_string()]
        );
    }

    async fn subscribe_and_prune(svc: &GraphSubscriptions) {
        svc.create_alerter("u1").await.unwrap();
        let t1 = svc.issue_key("u1").await.unwrap();
        svc.subscribe("u1", "g1", "c1", &t1).await.unwrap();

        let targets = svc.list_targets_for_alerter("u1").await.unwrap();
        assert_eq!(targets, BTreeMap::from([("g1".to_string(), "c1".to_string())]));

        let out = svc.unsubscribe("u1", "g1", "c1").await.unwrap();
        assert_eq!(out.pruned_nodes, 1);
        assert!(svc.list_targets_for_alerter("u1").await.unwrap().is_empty());
        let err = svc.list_alerters_for_target("g1", Some("c1")).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(_)));
        assert_eq!(labelled(svc, Label::Channel).await, 0);
    }

    #[tokio::test]
    async fn shared_channel_survives_one_unsubscribe() {
        let svc = service();
        for user in ["u1", "u2"] {
            let key = svc.issue_key(user).await.unwrap();
            svc.subscribe(user, "g1", "c1", &key).await.unwrap();
        }
        let out = svc.unsubscribe("u1", "g1", "c1").await.unwrap();
        assert_eq!(out.pruned_nodes, 0);
        assert_eq!(
            svc.list_alerters_for_target("g1", Some("c1")).await.unwrap(),
            ["u2"]
        );
    }

    #[tokio::test]
    async fn unsubscribe_reports_missing_pieces() {
        let svc = service();
        let err = svc.unsubscribe("u1", "g1", "c1").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(m) if m.starts_with("alerter")));

        svc.create_alerter("u1").await.unwrap();
        let err = svc.unsubscribe("u1", "g1", "c1").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(m) if m.starts_with("channel")));

        let key = svc.issue_key("u2").await.unwrap();
        svc.subscribe("u2", "g1", "c1", &key).await.unwrap();
        let err = svc.unsubscribe("u1", "g1", "c1").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(m) if m.starts_with("subscription")));
    }

    #[tokio::test]
    async fn listings_cover_communities_and_channels() {
        let svc = service();
        for (user, guild, chan) in [("u1", "g1", "c1"), ("u1", "g1", "c2"), ("u2", "g1", "c2"), ("u1", "g2", "c9")] {
            let key = svc.issue_key(user).await.unwrap();
            svc.subscribe(user, guild, chan, &key).await.unwrap();
        }

        assert_eq!(svc.list_alerters_for_target("g1", None).await.unwrap(), ["u1", "u2"]);
        assert!(matches!(
            svc.list_alerters_for_target("g3", None).await,
            Err(SubscriptionError::NotFound(_))
        ));

        let channels = svc.list_channels_for_alerter("u1").await.unwrap();
        let pairs: Vec<(&str, &str)> = channels
            .iter()
            .map(|t| (t.guild_id.as_str(), t.channel_id.as_str()))
            .collect();
        assert_eq!(pairs, [("g1", "c1"), ("g1", "c2"), ("g2", "c9")]);

        let targets = svc.list_targets_for_alerter("u1").await.unwrap();
        assert_eq!(targets.get("g1").map(String::as_str), Some("c2"));
        assert_eq!(targets.get("g2").map(String::as_str), Some("c9"));

        assert!(matches!(
            svc.list_targets_for_alerter("nobody").await,
            Err(SubscriptionError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issuance_loses_no_keys() {
        const N: usize = 32;
        let svc = Arc::new(service());
        let mut tasks = Vec::new();
        for _ in 0..N {
            let svc = Arc::clone(&svc);
            tasks.push(tokio::spawn(async move { svc.issue_key("u1").await.unwrap() }));
        }
        let mut keys = HashSet::new();
        for t in tasks {
            keys.insert(t.await.unwrap());
        }
        assert_eq!(keys.len(), N);
        assert_eq!(svc.key_count("u1").await.unwrap(), N);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribes_consume_a_key_once() {
        let svc = Arc::new(service());
        let key = svc.issue_key("u1").await.unwrap();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let svc = Arc::clone(&svc);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                svc.subscribe("u1", "g1", &format!("c{}", i), &key).await
            }));
        }
        let mut accepted = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert!(matches!(e, SubscriptionError::InvalidKey)),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(svc.list_channels_for_alerter("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_key_set_is_malformed_state() {
        let svc = service();
        let mut props = Properties::new();
        props.insert(USER_ID.to_string(), Value::from("u1"));
        props.insert(KEYS.to_string(), Value::Int(7));
        svc.store().add_node(Label::Alerter, props).await.unwrap();
        svc.store().commit().await.unwrap();

        let err = svc.subscribe("u1", "g1", "c1", "k").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::MalformedState { step: "decode keys", .. }));
        assert!(matches!(
            svc.key_count("u1").await,
            Err(SubscriptionError::MalformedState { .. })
        ));
    }

    /// Store whose reads stall past any reasonable deadline.
    struct StalledReads(InMemoryGraphStore);

    #[async_trait]
    impl GraphStore for StalledReads {
        async fn add_node(&self, label: Label, properties: Properties) -> Result<NodeHandle, GraphStoreError> {
            self.0.add_node(label, properties).await
        }

        async fn commit(&self) -> Result<Vec<Node>, GraphStoreError> {
            self.0.commit().await
        }

        async fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.0.query(pattern, params).await
        }

        async fn mutate(&self, mutation: &Mutation, params: &Params) -> Result<ResultSet, GraphStoreError> {
            self.0.mutate(mutation, params).await
        }

        async fn transact(&self, mutations: &[Mutation], params: &Params) -> Result<Vec<ResultSet>, GraphStoreError> {
            self.0.transact(mutations, params).await
        }

        async fn reset(&self) -> Result<(), GraphStoreError> {
            self.0.reset().await
        }
    }

    #[tokio::test]
    async fn slow_round_trip_times_out() {
        let svc = GraphSubscriptions::new(Arc::new(StalledReads(InMemoryGraphStore::new())))
            .with_timeout(Duration::from_millis(20));
        svc.issue_key("u1").await.unwrap();
        let err = svc.list_channels_for_alerter("u1").await.unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::Timeout { step: "load alerter", timeout_ms: 20 }
        ));
    }

    /// Store whose `add_node` stages and immediately flushes, as a concurrent commit would.
    /// With `drop_batches`, commits discard the staged nodes instead.
    struct ForeignCommits {
        inner: InMemoryGraphStore,
        drop_batches: bool,
    }

    #[async_trait]
    impl GraphStore for ForeignCommits {
        async fn add_node(&self, label: Label, properties: Properties) -> Result<NodeHandle, GraphStoreError> {
            let handle = self.inner.add_node(label, properties).await?;
            if !self.drop_batches {
                self.inner.commit().await?;
            }
            Ok(handle)
        }

        async fn commit(&self) -> Result<Vec<Node>, GraphStoreError> {
            if self.drop_batches {
                return Ok(Vec::new());
            }
            self.inner.commit().await
        }

        async fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
            self.inner.query(pattern, params).await
        }

        async fn mutate(&self, mutation: &Mutation, params: &Params) -> Result<ResultSet, GraphStoreError> {
            self.inner.mutate(mutation, params).await
        }

        async fn transact(&self, mutations: &[Mutation], params: &Params) -> Result<Vec<ResultSet>, GraphStoreError> {
            self.inner.transact(mutations, params).await
        }

        async fn reset(&self) -> Result<(), GraphStoreError> {
            self.inner.reset().await
        }
    }

    #[tokio::test]
    async fn create_alerter_fails_when_the_staged_node_is_lost() {
        let svc = GraphSubscriptions::new(Arc::new(ForeignCommits {
            inner: InMemoryGraphStore::new(),
            drop_batches: true,
        }));
        let err = svc.create_alerter("u1").await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Store { step: "commit alerter", .. }));
        assert!(matches!(
            svc.key_count("u1").await.unwrap_err(),
            SubscriptionError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn create_alerter_accepts_a_node_flushed_by_another_commit() {
        let svc = GraphSubscriptions::new(Arc::new(ForeignCommits {
            inner: InMemoryGraphStore::new(),
            drop_batches: false,
        }));
        svc.create_alerter("u1").await.unwrap();
        assert_eq!(svc.key_count("u1").await.unwrap(), 0);
        assert_eq!(labelled(&svc, Label::Alerter).await, 1);
    }
}
