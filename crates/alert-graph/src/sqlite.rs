//! SQLite-backed graph store implementation (persistence).

use crate::{update_set, SetOp};
use alert_types::{
    param, str_param, GraphStore, GraphStoreError, Label, Mutation, MutationStats, Node,
    NodeHandle, NodeId, NodePattern, Params, Pattern, Properties, Relation, ResultSet, Row,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL,
        properties TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS edges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_node INTEGER NOT NULL,
        to_node INTEGER NOT NULL,
        relation TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (from_node, to_node, relation),
        FOREIGN KEY (from_node) REFERENCES nodes(id) ON DELETE CASCADE,
        FOREIGN KEY (to_node) REFERENCES nodes(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);
    CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_node);
    CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_node);
    CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation);
"#;

fn sql_err(e: rusqlite::Error) -> GraphStoreError {
    GraphStoreError::Other(e.to_string())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// SQLite-backed graph store. Properties are stored as JSON; each mutation runs in its own
/// transaction.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
    staged: Mutex<Vec<(Label, Properties)>>,
}

impl SqliteGraphStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, GraphStoreError> {
        let conn =
            Connection::open(path).map_err(|e| GraphStoreError::Connection(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, GraphStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| GraphStoreError::Connection(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, GraphStoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| GraphStoreError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            staged: Mutex::new(Vec::new()),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, GraphStoreError>
    where
        F: FnOnce(&Connection) -> Result<T, GraphStoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| GraphStoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn)
    }

    fn staged(&self) -> Result<std::sync::MutexGuard<'_, Vec<(Label, Properties)>>, GraphStoreError> {
        self.staged
            .lock()
            .map_err(|e| GraphStoreError::Other(format!("failed to acquire lock: {}", e)))
    }
}

fn decode_node(id: i64, label: &str, properties: &str) -> Result<Node, GraphStoreError> {
    let label = Label::parse(label)
        .ok_or_else(|| GraphStoreError::Malformed(format!("unknown label {}", label)))?;
    let properties: Properties = serde_json::from_str(properties)
        .map_err(|e| GraphStoreError::Malformed(format!("node {}: {}", id, e)))?;
    Ok(Node {
        id: id as NodeId,
        label,
        properties,
    })
}

fn encode_properties(properties: &Properties) -> Result<String, GraphStoreError> {
    serde_json::to_string(properties).map_err(|e| GraphStoreError::Malformed(e.to_string()))
}

fn load_nodes(conn: &Connection, label: Option<Label>) -> Result<Vec<Node>, GraphStoreError> {
    let mut stmt = conn
        .prepare("SELECT id, label, properties FROM nodes WHERE ?1 IS NULL OR label = ?1 ORDER BY id")
        .map_err(sql_err)?;
    let raw = stmt
        .query_map(params![label.map(Label::as_str)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(sql_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_err)?;
    raw.iter()
        .map(|(id, label, props)| decode_node(*id, label, props))
        .collect()
}

fn matching(
    conn: &Connection,
    pattern: &NodePattern,
    params: &Params,
) -> Result<Vec<Node>, GraphStoreError> {
    let resolved = pattern.resolve(params)?;
    Ok(load_nodes(conn, Some(resolved.label))?
        .into_iter()
        .filter(|n| resolved.matches(n))
        .collect())
}

fn insert_node(conn: &Connection, label: Label, properties: Properties) -> Result<Node, GraphStoreError> {
    let ts = now();
    conn.execute(
        "INSERT INTO nodes (label, properties, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![label.as_str(), encode_properties(&properties)?, ts, ts],
    )
    .map_err(sql_err)?;
    Ok(Node {
        id: conn.last_insert_rowid() as NodeId,
        label,
        properties,
    })
}

fn write_properties(conn: &Connection, node: &Node) -> Result<(), GraphStoreError> {
    conn.execute(
        "UPDATE nodes SET properties = ?1, updated_at = ?2 WHERE id = ?3",
        params![encode_properties(&node.properties)?, now(), node.id as i64],
    )
    .map_err(sql_err)?;
    Ok(())
}

fn edge_exists(conn: &Connection, from: NodeId, to: NodeId, relation: Relation) -> Result<bool, GraphStoreError> {
    conn.query_row(
        "SELECT id FROM edges WHERE from_node = ?1 AND to_node = ?2 AND relation = ?3",
        params![from as i64, to as i64, relation.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|id| id.is_some())
    .map_err(sql_err)
}

fn query(conn: &Connection, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
    let rows = match pattern {
        Pattern::Nodes(p) => matching(conn, p, params)?
            .into_iter()
            .map(|n| Row::new(vec![n]))
            .collect(),
        Pattern::Related { from, relation, to } => {
            let froms: HashMap<NodeId, Node> = matching(conn, from, params)?
                .into_iter()
                .map(|n| (n.id, n))
                .collect();
            let tos: HashMap<NodeId, Node> = matching(conn, to, params)?
                .into_iter()
                .map(|n| (n.id, n))
                .collect();
            let mut stmt = conn
                .prepare("SELECT from_node, to_node FROM edges WHERE relation = ?1 ORDER BY id")
                .map_err(sql_err)?;
            let pairs = stmt
                .query_map(params![relation.as_str()], |row| {
                    Ok((row.get::<_, i64>(0)? as NodeId, row.get::<_, i64>(1)? as NodeId))
                })
                .map_err(sql_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_err)?;
            pairs
                .into_iter()
                .filter_map(|(f, t)| match (froms.get(&f), tos.get(&t)) {
                    (Some(f), Some(t)) => Some(Row::new(vec![f.clone(), t.clone()])),
                    _ => None,
                })
                .collect()
        }
        Pattern::AllNodes => load_nodes(conn, None)?
            .into_iter()
            .map(|n| Row::new(vec![n]))
            .collect(),
    };
    Ok(ResultSet::new(rows))
}

fn apply(conn: &Connection, mutation: &Mutation, params: &Params) -> Result<ResultSet, GraphStoreError> {
    let mut stats = MutationStats::default();
    let mut rows = Vec::new();
    match mutation {
        Mutation::MergeNode(p) => {
            let node = match matching(conn, p, params)?.into_iter().next() {
                Some(n) => n,
                None => {
                    let resolved = p.resolve(params)?;
                    stats.nodes_created += 1;
                    insert_node(conn, resolved.label, resolved.properties)?
                }
            };
            rows.push(Row::new(vec![node]));
        }
        Mutation::SetProperty {
            node,
            property,
            param: name,
        } => {
            let value = param(params, name)?;
            for mut n in matching(conn, node, params)? {
                n.properties.insert(property.clone(), value.clone());
                write_properties(conn, &n)?;
                stats.properties_set += 1;
                rows.push(Row::new(vec![n]));
            }
        }
        Mutation::AddToSet {
            node,
            property,
            param: name,
        } => {
            let element = str_param(params, name)?;
            for mut n in matching(conn, node, params)? {
                if update_set(&mut n.properties, property, element, SetOp::Add)? {
                    write_properties(conn, &n)?;
                    stats.properties_set += 1;
                }
                rows.push(Row::new(vec![n]));
            }
        }
        Mutation::TakeFromSet {
            node,
            property,
            param: name,
        } => {
            let element = str_param(params, name)?;
            let nodes = matching(conn, node, params)?;
            if nodes.is_empty() {
                return Err(GraphStoreError::ConditionFailed(format!(
                    "no {} node to take from",
                    node.label
                )));
            }
            for mut n in nodes {
                if !update_set(&mut n.properties, property, element, SetOp::Take)? {
                    return Err(GraphStoreError::ConditionFailed(format!(
                        "{} does not hold the element",
                        property
                    )));
                }
                write_properties(conn, &n)?;
                stats.properties_set += 1;
                rows.push(Row::new(vec![n]));
            }
        }
        Mutation::MergeRelationship { from, relation, to } => {
            let tos = matching(conn, to, params)?;
            for f in matching(conn, from, params)? {
                for t in &tos {
                    let created = conn
                        .execute(
                            "INSERT OR IGNORE INTO edges (from_node, to_node, relation, created_at) VALUES (?1, ?2, ?3, ?4)",
                            params![f.id as i64, t.id as i64, relation.as_str(), now()],
                        )
                        .map_err(sql_err)?;
                    stats.relationships_created += created;
                    rows.push(Row::new(vec![f.clone(), t.clone()]));
                }
            }
        }
        Mutation::DeleteRelationship { from, relation, to } => {
            let tos = matching(conn, to, params)?;
            for f in matching(conn, from, params)? {
                for t in &tos {
                    if !edge_exists(conn, f.id, t.id, *relation)? {
                        continue;
                    }
                    conn.execute(
                        "DELETE FROM edges WHERE from_node = ?1 AND to_node = ?2 AND relation = ?3",
                        params![f.id as i64, t.id as i64, relation.as_str()],
                    )
                    .map_err(sql_err)?;
                    stats.relationships_deleted += 1;
                    rows.push(Row::new(vec![f.clone(), t.clone()]));
                }
            }
        }
        Mutation::DeleteOrphans { spare } => {
            let mut stmt = conn
                .prepare(
                    "SELECT id, label, properties FROM nodes n
                     WHERE NOT EXISTS (SELECT 1 FROM edges e WHERE e.from_node = n.id OR e.to_node = n.id)
                     ORDER BY id",
                )
                .map_err(sql_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(sql_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_err)?;
            for (id, label, props) in raw {
                let node = decode_node(id, &label, &props)?;
                if spare.contains(&node.label) {
                    continue;
                }
                conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])
                    .map_err(sql_err)?;
                stats.nodes_deleted += 1;
                rows.push(Row::new(vec![node]));
            }
        }
    }
    Ok(ResultSet::new(rows).with_stats(stats))
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn add_node(
        &self,
        label: Label,
        properties: Properties,
    ) -> Result<NodeHandle, GraphStoreError> {
        let mut staged = self.staged()?;
        staged.push((label, properties));
        Ok(NodeHandle {
            label,
            slot: staged.len() - 1,
        })
    }

    async fn commit(&self) -> Result<Vec<Node>, GraphStoreError> {
        let mut staged = self.staged()?;
        let nodes = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            let mut nodes = Vec::with_capacity(staged.len());
            for (label, properties) in staged.iter() {
                nodes.push(insert_node(&tx, *label, properties.clone())?);
            }
            tx.commit().map_err(sql_err)?;
            Ok(nodes)
        })?;
        // The batch stays staged when the transaction fails.
        staged.clear();
        Ok(nodes)
    }

    async fn query(&self, pattern: &Pattern, params: &Params) -> Result<ResultSet, GraphStoreError> {
        self.with_conn(|conn| query(conn, pattern, params))
    }

    async fn mutate(
        &self,
        mutation: &Mutation,
        params: &Params,
    ) -> Result<ResultSet, GraphStoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            let result = apply(&tx, mutation, params)?;
            tx.commit().map_err(sql_err)?;
            Ok(result)
        })
    }

    async fn transact(
        &self,
        mutations: &[Mutation],
        params: &Params,
    ) -> Result<Vec<ResultSet>, GraphStoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            let mut results = Vec::with_capacity(mutations.len());
            for m in mutations {
                results.push(apply(&tx, m, params)?);
            }
            tx.commit().map_err(sql_err)?;
            Ok(results)
        })
    }

    async fn reset(&self) -> Result<(), GraphStoreError> {
        self.staged()?.clear();
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM edges; DELETE FROM nodes;")
                .map_err(sql_err)
        })
    }
}
