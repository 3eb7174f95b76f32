//! Restore - applying a backup body to a live store
//!
//! Merge keeps whatever already exists; replace assumes the caller
//! cleared the store and surfaces the first failure. Both observe
//! cancellation at record boundaries and `sync` the store on success.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{BackupBody, BackupError, Result};
use crate::storage::{GraphStore, StoreError};

/// Restore mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Skip nodes that already exist and edges that fail to insert
    #[default]
    Merge,
    /// Insert unconditionally; the caller cleared the store first
    Replace,
}

/// Per-record outcome counts of a restore run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub nodes_restored: u64,
    pub nodes_skipped: u64,
    pub edges_restored: u64,
    pub edges_skipped: u64,
}

/// Capture the full store content as a backup body.
///
/// Nodes and edges come back in their deterministic store order, so two
/// snapshots of an unchanged store are identical.
pub fn snapshot_store(store: &GraphStore, cancel: &CancellationToken) -> Result<BackupBody> {
    let mut nodes = Vec::new();
    for id in store.all_node_ids()? {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        if let Some(node) = store.get_node(&id)? {
            nodes.push(node);
        }
    }
    let edges = store.all_edges()?;
    Ok(BackupBody {
        version: 2,
        created_at: chrono::Utc::now(),
        nodes,
        edges,
    })
}

/// Apply a backup body to the store.
///
/// Merge mode counts a `NodeExists` collision as skipped but aborts on
/// any other node failure rather than masking a genuine storage error;
/// edge insertion failures of any kind (endpoint missing included) are
/// counted as skipped. Replace mode surfaces the first error and stops.
/// The store is synced after a successful run.
pub fn restore(
    store: &GraphStore,
    body: &BackupBody,
    mode: RestoreMode,
    cancel: &CancellationToken,
) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();

    for node in &body.nodes {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        match store.insert_node(node) {
            Ok(()) => report.nodes_restored += 1,
            Err(StoreError::NodeExists(_)) if mode == RestoreMode::Merge => {
                report.nodes_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    for edge in &body.edges {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        match store.insert_edge(edge) {
            Ok(()) => report.edges_restored += 1,
            Err(e) => match mode {
                RestoreMode::Merge => {
                    tracing::debug!(edge = %edge.triple(), error = %e, "Skipping edge");
                    report.edges_skipped += 1;
                }
                RestoreMode::Replace => return Err(e.into()),
            },
        }
    }

    store.sync()?;
    tracing::info!(
        mode = ?mode,
        nodes_restored = report.nodes_restored,
        nodes_skipped = report.nodes_skipped,
        edges_restored = report.edges_restored,
        edges_skipped = report.edges_skipped,
        "Restore complete"
    );
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
