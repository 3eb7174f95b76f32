//! # Floop Core
//!
//! Behavior graph engine for agent memory. A behavior graph is a
//! persistent, typed directed graph of learned agent behaviors
//! (directives, constraints, procedures, preferences) and the relations
//! between them, with:
//!
//! - **Graph store**: SQLite-backed nodes with schemaless content and
//!   metadata bags, deduplicated weighted edges, indexed queries, and
//!   scope semantics
//! - **Spreading activation**: iterative diffusion over weighted edges
//!   with decay, threshold pruning, edge-kind polarity (conflicts
//!   inhibit), and deterministic step snapshots for animation
//! - **Backups**: plain-JSON V1 and gzip+SHA-256 V2 archives with
//!   merge/replace restore and count/age/size/union retention policies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use floop_core::{ActivationConfig, ActivationSeed, GraphStore, NewEdge, NewNode, EdgeKind};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = GraphStore::open(None)?;
//! store.add_node(NewNode::behavior("prefer-rebase"))?;
//! store.add_node(NewNode::behavior("no-force-push"))?;
//! store.add_edge(NewEdge::new("prefer-rebase", "no-force-push", EdgeKind::Requires, 0.9))?;
//!
//! let steps = floop_core::spread(
//!     &store,
//!     &[ActivationSeed::new("prefer-rebase", 1.0)],
//!     &ActivationConfig::default(),
//!     &CancellationToken::new(),
//! )?;
//! assert!(steps.last().unwrap().is_final);
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod activation;
pub mod backup;
pub mod graph;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Graph model
pub use graph::{
    derive_edge_scope, value, AttrMap, BehaviorKind, BehaviorView, Direction, Edge, EdgeKind,
    EdgeScope, NewEdge, NewNode, Node, Scope,
};

// Storage layer
pub use storage::{GraphStats, GraphStore, NodePredicate, Result, StoreError};

// Spreading activation
pub use activation::{
    default_polarity, spread, ActivationConfig, ActivationError, ActivationGraph, ActivationSeed,
    ActivationStep, DEFAULT_POLARITY,
};

// Backups and retention
pub use backup::{
    apply_retention, backup_file_name, default_backup_dir, list_backups, parse_duration,
    parse_size, read_backup, read_header, restore, snapshot_store, validate_path,
    verify_checksum, write_backup, BackupBody, BackupEntry, BackupError, BackupFormat,
    BackupHeader, RestoreMode, RestoreReport, RetentionPolicy, BACKUP_MAGIC, MAX_BACKUP_BYTES,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Coarse node kind used by the behavior graph
pub const BEHAVIOR_NODE_KIND: &str = "behavior";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        spread, ActivationConfig, ActivationSeed, ActivationStep, AttrMap, BackupBody,
        BackupFormat, BehaviorView, Direction, Edge, EdgeKind, GraphStore, NewEdge, NewNode,
        Node, NodePredicate, RestoreMode, Result, RetentionPolicy, Scope, StoreError,
    };
}
