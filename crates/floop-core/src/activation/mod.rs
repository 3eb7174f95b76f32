//! Spreading-Activation Engine
//!
//! Iterative activation diffusion over the weighted behavior graph.
//! Given one or more seeds, activation spreads along outbound edges with
//! per-hop decay, edge-kind polarity (conflicts inhibit), threshold
//! pruning, and a residual leak of the previous activation. The engine
//! records a chronological snapshot per step for animation and analysis.
//!
//! The engine reads the graph through the narrow [`ActivationGraph`]
//! seam and never mutates; per-run state is owned by the invocation, so
//! concurrent runs are independent.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::graph::{Direction, Edge, EdgeKind};
use crate::storage::{GraphStore, StoreError};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Activation engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// Empty seed sequence
    #[error("At least one seed is required")]
    NoSeeds,
    /// Configuration out of range
    #[error("Invalid activation config: {0}")]
    InvalidConfig(String),
    /// Underlying store failure
    #[error("Store error during activation: {0}")]
    Store(#[from] StoreError),
    /// Cooperative cancellation fired
    #[error("Activation cancelled")]
    Cancelled,
}

// ============================================================================
// READ SEAM
// ============================================================================

/// Narrow read-only view of the graph used by the engine.
///
/// All outbound edges for a node come back from one call, so the
/// engine's view of any single step stays coherent even if the store
/// mutates mid-run.
pub trait ActivationGraph {
    fn outbound_edges(&self, node_id: &str) -> Result<Vec<Edge>, StoreError>;
}

impl ActivationGraph for GraphStore {
    fn outbound_edges(&self, node_id: &str) -> Result<Vec<Edge>, StoreError> {
        self.get_edges(node_id, Direction::Outbound, None)
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Polarity applied to edge kinds the config does not name.
pub const DEFAULT_POLARITY: f64 = 0.5;

/// A seed behavior with its initial activation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSeed {
    /// Node id to activate
    pub behavior_id: String,
    /// Initial activation in (0, 1]
    pub activation: f64,
    /// Tag describing where the seed came from (query, trigger, api)
    pub source: String,
}

impl ActivationSeed {
    pub fn new(behavior_id: impl Into<String>, activation: f64) -> Self {
        Self {
            behavior_id: behavior_id.into(),
            activation,
            source: "manual".to_string(),
        }
    }
}

/// Tuning knobs for a spreading run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationConfig {
    /// Multiplier applied per hop, in (0, 1]
    pub decay_factor: f64,
    /// Activations with magnitude strictly below this are pruned to zero
    pub threshold: f64,
    /// Hard upper bound on iterations
    pub max_steps: usize,
    /// Stop when the max per-node delta falls below this
    pub convergence_epsilon: f64,
    /// Edge-kind coefficient in [-1, 1]; kinds not listed use
    /// [`DEFAULT_POLARITY`]. Kept external to the engine so domain
    /// tuning never touches engine code.
    pub polarity: BTreeMap<EdgeKind, f64>,
}

/// The stock polarity table: requires excites fully, conflicts inhibits.
pub fn default_polarity() -> BTreeMap<EdgeKind, f64> {
    BTreeMap::from([
        (EdgeKind::Requires, 1.0),
        (EdgeKind::SimilarTo, 0.7),
        (EdgeKind::Overrides, 0.8),
        (EdgeKind::LearnedFrom, 0.5),
        (EdgeKind::Conflicts, -1.0),
    ])
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.85,
            threshold: 0.01,
            max_steps: 10,
            convergence_epsilon: 1e-4,
            polarity: default_polarity(),
        }
    }
}

impl ActivationConfig {
    fn validate(&self) -> Result<(), ActivationError> {
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(ActivationError::InvalidConfig(format!(
                "decayFactor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        if self.threshold < 0.0 {
            return Err(ActivationError::InvalidConfig(format!(
                "threshold must be >= 0, got {}",
                self.threshold
            )));
        }
        if self.max_steps == 0 {
            return Err(ActivationError::InvalidConfig(
                "maxSteps must be >= 1".to_string(),
            ));
        }
        if self.convergence_epsilon <= 0.0 {
            return Err(ActivationError::InvalidConfig(format!(
                "convergenceEpsilon must be > 0, got {}",
                self.convergence_epsilon
            )));
        }
        for (kind, coeff) in &self.polarity {
            if !(-1.0..=1.0).contains(coeff) {
                return Err(ActivationError::InvalidConfig(format!(
                    "polarity for {} must be in [-1, 1], got {}",
                    kind, coeff
                )));
            }
        }
        Ok(())
    }

    fn polarity_for(&self, kind: EdgeKind) -> f64 {
        self.polarity.get(&kind).copied().unwrap_or(DEFAULT_POLARITY)
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Engine state recorded at one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStep {
    /// Iteration index; 0 is the seed snapshot
    pub step: usize,
    /// Non-zero activations, keyed by node id (sorted)
    pub activation: BTreeMap<String, f64>,
    /// Nodes zero in the previous snapshot and non-zero here, sorted by id
    pub newly_activated: Vec<String>,
    /// True only on the last snapshot of the run
    #[serde(rename = "final")]
    pub is_final: bool,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Run spreading activation and record a snapshot per step.
///
/// Step 0 is the seed state, recorded before any diffusion. Each
/// subsequent step sums `A[u] * weight * polarity * decay` over the
/// outbound edges of every node at or above threshold, adds the residual
/// `A[v] * (1 - decay)`, clamps into [-1, 1], and prunes magnitudes
/// below threshold. The run stops on `max_steps`, on convergence
/// (max per-node delta < epsilon), or when every activation is zero;
/// the last snapshot carries `final = true`.
///
/// Determinism: activation vectors are ordered maps, node iteration and
/// edge enumeration are id-sorted, and reductions sum in sorted-key
/// order, so identical inputs yield bit-identical snapshot sequences.
///
/// A seed id absent from the store is a phantom: it holds and leaks
/// activation but contributes no outbound flow.
pub fn spread<G: ActivationGraph>(
    graph: &G,
    seeds: &[ActivationSeed],
    config: &ActivationConfig,
    cancel: &CancellationToken,
) -> Result<Vec<ActivationStep>, ActivationError> {
    config.validate()?;
    if seeds.is_empty() {
        return Err(ActivationError::NoSeeds);
    }
    for seed in seeds {
        if !(seed.activation > 0.0 && seed.activation <= 1.0) {
            return Err(ActivationError::InvalidConfig(format!(
                "seed activation for '{}' must be in (0, 1], got {}",
                seed.behavior_id, seed.activation
            )));
        }
    }

    let mut current: BTreeMap<String, f64> = BTreeMap::new();
    for seed in seeds {
        current.insert(seed.behavior_id.clone(), seed.activation);
    }

    let mut snapshots = Vec::with_capacity(config.max_steps + 1);
    snapshots.push(ActivationStep {
        step: 0,
        activation: current.clone(),
        newly_activated: current.keys().cloned().collect(),
        is_final: false,
    });

    for step in 1..=config.max_steps {
        if cancel.is_cancelled() {
            return Err(ActivationError::Cancelled);
        }

        // Gather contributions from every node at or above threshold.
        let mut contributions: BTreeMap<String, f64> = BTreeMap::new();
        for (node_id, &activation) in &current {
            if cancel.is_cancelled() {
                return Err(ActivationError::Cancelled);
            }
            if activation < config.threshold {
                continue;
            }
            let mut edges = graph.outbound_edges(node_id)?;
            edges.sort_by(|a, b| (&a.target, a.kind).cmp(&(&b.target, b.kind)));
            for edge in edges {
                if edge.weight <= 0.0 {
                    continue;
                }
                let flow =
                    activation * edge.weight * config.polarity_for(edge.kind) * config.decay_factor;
                *contributions.entry(edge.target).or_insert(0.0) += flow;
            }
        }

        // New vector: contributions plus the residual leak of the
        // previous activation, clamped and pruned.
        let candidates: BTreeSet<&String> =
            current.keys().chain(contributions.keys()).collect();
        let mut next: BTreeMap<String, f64> = BTreeMap::new();
        for id in candidates {
            let residual = current.get(id).copied().unwrap_or(0.0) * (1.0 - config.decay_factor);
            let value = (contributions.get(id).copied().unwrap_or(0.0) + residual)
                .clamp(-1.0, 1.0);
            if value.abs() >= config.threshold {
                next.insert(id.clone(), value);
            }
        }

        let max_delta = current
            .keys()
            .chain(next.keys())
            .map(|id| {
                let before = current.get(id).copied().unwrap_or(0.0);
                let after = next.get(id).copied().unwrap_or(0.0);
                (after - before).abs()
            })
            .fold(0.0_f64, f64::max);

        let newly_activated: Vec<String> = next
            .keys()
            .filter(|id| !current.contains_key(*id))
            .cloned()
            .collect();

        snapshots.push(ActivationStep {
            step,
            activation: next.clone(),
            newly_activated,
            is_final: false,
        });

        let all_zero = next.is_empty();
        current = next;
        if all_zero || max_delta < config.convergence_epsilon {
            break;
        }
    }

    if let Some(last) = snapshots.last_mut() {
        last.is_final = true;
    }
    Ok(snapshots)
}

// ============================================================================
// TESTS
// ============================================================================
