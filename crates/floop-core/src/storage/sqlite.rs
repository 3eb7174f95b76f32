//! SQLite Graph Store
//!
//! Persistent typed graph over a pair of SQLite connections. Nodes carry
//! schemaless JSON bags plus extracted metadata columns (scope, priority,
//! confidence) so the query surface stays indexed. Edges are deduplicated
//! on the (source, target, kind) triple and cascade with their endpoints.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::BaseDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::graph::{value, AttrMap, Direction, Edge, EdgeKind, NewEdge, NewNode, Node};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Graph store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// AddNode with a duplicate id
    #[error("Node already exists: {0}")]
    NodeExists(String),
    /// Operation on an unknown node
    #[error("Node not found: {0}")]
    NodeMissing(String),
    /// AddEdge with an absent endpoint
    #[error("Edge endpoint missing: {missing} ({src} -[{kind}]-> {target})")]
    EndpointMissing {
        src: String,
        target: String,
        kind: EdgeKind,
        missing: String,
    },
    /// DeleteEdge with an absent triple
    #[error("Edge not found: {src} -[{kind}]-> {target}")]
    EdgeMissing {
        src: String,
        target: String,
        kind: EdgeKind,
    },
    /// Underlying engine failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Cooperative cancellation fired
    #[error("Operation cancelled")]
    Cancelled,
}

/// Graph store result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// QUERY PREDICATE
// ============================================================================

/// Field → required-value predicate for `query_nodes`
///
/// The keys `kind`, `scope`, `priority`, and `confidence` resolve against
/// indexed columns; any other key is matched against the content and
/// metadata bags after the indexed scan. An empty predicate matches all.
#[derive(Debug, Clone, Default)]
pub struct NodePredicate {
    fields: BTreeMap<String, serde_json::Value>,
}

impl NodePredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Aggregate counts over the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_nodes: i64,
    pub total_edges: i64,
    pub nodes_by_kind: BTreeMap<String, i64>,
    pub edges_by_kind: BTreeMap<String, i64>,
    pub oldest_node: Option<DateTime<Utc>>,
    pub newest_node: Option<DateTime<Utc>>,
}

// ============================================================================
// GRAPH STORE
// ============================================================================

/// Persistent behavior graph backed by SQLite
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, making the store `Send + Sync` so callers
/// can share it behind `Arc` without an outer mutex. Writes serialize on
/// the writer lock; WAL mode keeps concurrent readers unblocked.
pub struct GraphStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    closed: AtomicBool,
}

impl GraphStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Default on-disk location: `~/.floop/graph.db`.
    pub fn default_db_path() -> Result<PathBuf> {
        let base = BaseDirs::new()
            .ok_or_else(|| StoreError::Init("Could not determine home directory".to_string()))?;
        Ok(base.home_dir().join(".floop").join("graph.db"))
    }

    /// Open (creating if needed) a store at the given database path.
    ///
    /// `None` uses the default `~/.floop/graph.db`. The parent directory
    /// is created 0700 and the database file 0600 on Unix.
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                let _ = std::fs::set_permissions(dir, perms);
            }
        }

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            closed: AtomicBool::new(false),
        })
    }

    // ========================================================================
    // NODE OPERATIONS
    // ========================================================================

    /// Add a new node, stamping timestamps. Fails with `NodeExists` when
    /// the id is already present.
    pub fn add_node(&self, input: NewNode) -> Result<String> {
        let now = Utc::now();
        let node = Node {
            id: input.id,
            kind: input.kind,
            content: input.content,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };
        self.insert_node(&node)?;
        Ok(node.id)
    }

    /// Insert a fully-formed node verbatim, preserving its timestamps.
    ///
    /// Used by restore paths; `add_node` is the stamping front door.
    pub fn insert_node(&self, node: &Node) -> Result<()> {
        if node.id.is_empty() {
            return Err(StoreError::InvalidInput(
                "node id must not be empty".to_string(),
            ));
        }

        let content_json = serde_json::to_string(&node.content)
            .map_err(|e| StoreError::InvalidInput(format!("unserializable content: {}", e)))?;
        let metadata_json = serde_json::to_string(&node.metadata)
            .map_err(|e| StoreError::InvalidInput(format!("unserializable metadata: {}", e)))?;

        let scope = value::get_str(&node.metadata, "scope", "local").to_string();
        let priority = value::get_i64(&node.metadata, "priority", 0).max(0);
        let confidence = value::get_f64(&node.metadata, "confidence", 0.6);

        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;

        let exists: bool = writer
            .query_row(
                "SELECT 1 FROM nodes WHERE id = ?1",
                params![node.id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(StoreError::NodeExists(node.id.clone()));
        }

        writer.execute(
            "INSERT INTO nodes (
                id, kind, content, metadata, scope, priority, confidence,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                node.id,
                node.kind,
                content_json,
                metadata_json,
                scope,
                priority,
                confidence,
                node.created_at.to_rfc3339(),
                node.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get a node by id
    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare("SELECT * FROM nodes WHERE id = ?1")?;

        let node = stmt
            .query_row(params![id], |row| Self::row_to_node(row))
            .optional()?;
        Ok(node)
    }

    /// Replace a node's content and metadata wholesale.
    ///
    /// Bumps `updated_at`; `created_at` is untouched. Fails with
    /// `NodeMissing` when the node is unknown.
    pub fn update_node(&self, id: &str, content: AttrMap, metadata: AttrMap) -> Result<()> {
        let content_json = serde_json::to_string(&content)
            .map_err(|e| StoreError::InvalidInput(format!("unserializable content: {}", e)))?;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| StoreError::InvalidInput(format!("unserializable metadata: {}", e)))?;

        let scope = value::get_str(&metadata, "scope", "local").to_string();
        let priority = value::get_i64(&metadata, "priority", 0).max(0);
        let confidence = value::get_f64(&metadata, "confidence", 0.6);
        let now = Utc::now();

        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        let affected = writer.execute(
            "UPDATE nodes
             SET content = ?1, metadata = ?2, scope = ?3, priority = ?4,
                 confidence = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                content_json,
                metadata_json,
                scope,
                priority,
                confidence,
                now.to_rfc3339(),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NodeMissing(id.to_string()));
        }
        Ok(())
    }

    /// Delete a node and cascade all incident edges.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        let affected = writer.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NodeMissing(id.to_string()));
        }
        Ok(())
    }

    /// Query nodes by a field → value predicate.
    ///
    /// `kind`, `scope`, `priority`, and `confidence` hit indexed columns;
    /// remaining keys filter the attribute bags. Results order by
    /// `created_at` ascending, ties broken by id, so repeated queries are
    /// deterministic.
    pub fn query_nodes(&self, predicate: &NodePredicate) -> Result<Vec<Node>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut sql_params: Vec<rusqlite::types::Value> = Vec::new();
        let mut bag_filters: Vec<(&String, &serde_json::Value)> = Vec::new();

        for (key, val) in &predicate.fields {
            match key.as_str() {
                "kind" | "scope" => {
                    let Some(s) = val.as_str() else {
                        // Mistyped indexed value can never match
                        return Ok(Vec::new());
                    };
                    clauses.push(format!("{} = ?{}", key, sql_params.len() + 1));
                    sql_params.push(rusqlite::types::Value::Text(s.to_string()));
                }
                "priority" => {
                    let Some(p) = val.as_i64() else {
                        return Ok(Vec::new());
                    };
                    clauses.push(format!("priority = ?{}", sql_params.len() + 1));
                    sql_params.push(rusqlite::types::Value::Integer(p));
                }
                "confidence" => {
                    let Some(c) = val.as_f64() else {
                        return Ok(Vec::new());
                    };
                    clauses.push(format!("confidence = ?{}", sql_params.len() + 1));
                    sql_params.push(rusqlite::types::Value::Real(c));
                }
                _ => bag_filters.push((key, val)),
            }
        }

        let mut sql = String::from("SELECT * FROM nodes");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(sql_params), |row| {
            Self::row_to_node(row)
        })?;

        let mut result = Vec::new();
        for row in rows {
            let node = row?;
            let matches = bag_filters.iter().all(|(key, val)| {
                node.content.get(key.as_str()) == Some(*val)
                    || node.metadata.get(key.as_str()) == Some(*val)
            });
            if matches {
                result.push(node);
            }
        }
        Ok(result)
    }

    /// All node ids, sorted, for deterministic iteration.
    pub fn all_node_ids(&self) -> Result<Vec<String>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare("SELECT id FROM nodes ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    // ========================================================================
    // EDGE OPERATIONS
    // ========================================================================

    /// Insert an edge, stamping `created_at`. Idempotent on the
    /// (source, target, kind) triple: re-insertion updates the weight and
    /// never duplicates. Both endpoints must exist.
    pub fn add_edge(&self, input: NewEdge) -> Result<()> {
        let edge = Edge {
            source: input.source,
            target: input.target,
            kind: input.kind,
            weight: input.weight,
            created_at: Utc::now(),
            last_activated: None,
        };
        self.insert_edge(&edge)
    }

    /// Insert a fully-formed edge verbatim (restore path). Upserts on the
    /// identity triple.
    pub fn insert_edge(&self, edge: &Edge) -> Result<()> {
        let weight = edge.weight.clamp(0.0, 1.0);

        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;

        for endpoint in [&edge.source, &edge.target] {
            let exists: bool = writer
                .query_row(
                    "SELECT 1 FROM nodes WHERE id = ?1",
                    params![endpoint],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::EndpointMissing {
                    src: edge.source.clone(),
                    target: edge.target.clone(),
                    kind: edge.kind,
                    missing: endpoint.clone(),
                });
            }
        }

        writer.execute(
            "INSERT INTO edges (source, target, kind, weight, created_at, last_activated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source, target, kind)
             DO UPDATE SET weight = excluded.weight",
            params![
                edge.source,
                edge.target,
                edge.kind.as_str(),
                weight,
                edge.created_at.to_rfc3339(),
                edge.last_activated.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        Ok(())
    }

    /// Edges incident to a node, filtered by direction and optional kind.
    ///
    /// Ordered by (source, target, kind) so traversal is deterministic.
    pub fn get_edges(
        &self,
        node_id: &str,
        direction: Direction,
        kind_filter: Option<EdgeKind>,
    ) -> Result<Vec<Edge>> {
        let direction_clause = match direction {
            Direction::Outbound => "source = ?1",
            Direction::Inbound => "target = ?1",
            Direction::Both => "(source = ?1 OR target = ?1)",
        };

        let sql = match kind_filter {
            Some(_) => format!(
                "SELECT * FROM edges WHERE {} AND kind = ?2
                 ORDER BY source ASC, target ASC, kind ASC",
                direction_clause
            ),
            None => format!(
                "SELECT * FROM edges WHERE {}
                 ORDER BY source ASC, target ASC, kind ASC",
                direction_clause
            ),
        };

        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(&sql)?;

        let mut result = Vec::new();
        match kind_filter {
            Some(kind) => {
                let rows =
                    stmt.query_map(params![node_id, kind.as_str()], |row| Self::row_to_edge(row))?;
                for row in rows {
                    result.push(row?);
                }
            }
            None => {
                let rows = stmt.query_map(params![node_id], |row| Self::row_to_edge(row))?;
                for row in rows {
                    result.push(row?);
                }
            }
        }
        Ok(result)
    }

    /// All edges in the store, ordered by identity triple.
    pub fn all_edges(&self) -> Result<Vec<Edge>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt =
            reader.prepare("SELECT * FROM edges ORDER BY source ASC, target ASC, kind ASC")?;
        let rows = stmt.query_map([], |row| Self::row_to_edge(row))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Delete an edge by its identity triple.
    pub fn delete_edge(&self, source: &str, target: &str, kind: EdgeKind) -> Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        let affected = writer.execute(
            "DELETE FROM edges WHERE source = ?1 AND target = ?2 AND kind = ?3",
            params![source, target, kind.as_str()],
        )?;
        if affected == 0 {
            return Err(StoreError::EdgeMissing {
                src: source.to_string(),
                target: target.to_string(),
                kind,
            });
        }
        Ok(())
    }

    /// Record that activation traversed an edge.
    pub fn mark_edge_activated(&self, source: &str, target: &str, kind: EdgeKind) -> Result<()> {
        let now = Utc::now();
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        let affected = writer.execute(
            "UPDATE edges SET last_activated = ?1
             WHERE source = ?2 AND target = ?3 AND kind = ?4",
            params![now.to_rfc3339(), source, target, kind.as_str()],
        )?;
        if affected == 0 {
            return Err(StoreError::EdgeMissing {
                src: source.to_string(),
                target: target.to_string(),
                kind,
            });
        }
        Ok(())
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Flush pending writes durably (WAL checkpoint). Callers invoke
    /// after bulk mutations.
    pub fn sync(&self) -> Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_row| Ok(()))?;
        Ok(())
    }

    /// Checkpoint and mark the store closed. Idempotent; connections are
    /// released when the store drops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sync()
    }

    /// Aggregate counts for health reporting.
    pub fn stats(&self) -> Result<GraphStats> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;

        let total_nodes: i64 =
            reader.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let total_edges: i64 =
            reader.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;

        let mut nodes_by_kind = BTreeMap::new();
        let mut stmt = reader.prepare("SELECT kind, COUNT(*) FROM nodes GROUP BY kind")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (kind, count) = row?;
            nodes_by_kind.insert(kind, count);
        }
        drop(stmt);

        let mut edges_by_kind = BTreeMap::new();
        let mut stmt = reader.prepare("SELECT kind, COUNT(*) FROM edges GROUP BY kind")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (kind, count) = row?;
            edges_by_kind.insert(kind, count);
        }
        drop(stmt);

        let oldest_node: Option<String> =
            reader.query_row("SELECT MIN(created_at) FROM nodes", [], |row| row.get(0))?;
        let newest_node: Option<String> =
            reader.query_row("SELECT MAX(created_at) FROM nodes", [], |row| row.get(0))?;

        Ok(GraphStats {
            total_nodes,
            total_edges,
            nodes_by_kind,
            edges_by_kind,
            oldest_node: oldest_node.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            newest_node: newest_node.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        })
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    /// Convert a row to Node
    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
        let content_json: String = row.get("content")?;
        let metadata_json: String = row.get("metadata")?;
        let content: AttrMap = serde_json::from_str(&content_json).unwrap_or_default();
        let metadata: AttrMap = serde_json::from_str(&metadata_json).unwrap_or_default();

        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(Node {
            id: row.get("id")?,
            kind: row.get("kind")?,
            content,
            metadata,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
        })
    }

    /// Convert a row to Edge
    fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
        let kind_str: String = row.get("kind")?;
        let kind = EdgeKind::parse_name(&kind_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Unknown edge kind '{}'", kind_str),
                )),
            )
        })?;

        let created_at: String = row.get("created_at")?;
        let last_activated: Option<String> = row.get("last_activated")?;

        Ok(Edge {
            source: row.get("source")?,
            target: row.get("target")?,
            kind,
            weight: row.get("weight")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            last_activated: last_activated.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
