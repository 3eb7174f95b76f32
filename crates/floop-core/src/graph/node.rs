//! Graph model - Nodes, edges, and the closed relation vocabulary
//!
//! Each node carries two schemaless attribute bags (`content` and
//! `metadata`) plus store-managed timestamps. Edges are directed, typed,
//! and weighted; their identity is the (source, target, kind) triple.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value;

/// Dynamic attribute bag backing `content` and `metadata`.
pub type AttrMap = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// EDGE KINDS
// ============================================================================

/// Closed vocabulary of relations between behaviors
///
/// The kind drives activation polarity and rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Source depends on target being active
    Requires,
    /// Source supersedes target when both match
    Overrides,
    /// Source and target cannot both apply (inhibitory)
    Conflicts,
    /// Source and target express related behavior
    SimilarTo,
    /// Source was derived from target
    LearnedFrom,
}

impl EdgeKind {
    /// All kinds, in canonical order
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::Requires,
        EdgeKind::Overrides,
        EdgeKind::Conflicts,
        EdgeKind::SimilarTo,
        EdgeKind::LearnedFrom,
    ];

    /// Convert to the wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Requires => "requires",
            EdgeKind::Overrides => "overrides",
            EdgeKind::Conflicts => "conflicts",
            EdgeKind::SimilarTo => "similar-to",
            EdgeKind::LearnedFrom => "learned-from",
        }
    }

    /// Parse from the wire string
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "requires" => Some(EdgeKind::Requires),
            "overrides" => Some(EdgeKind::Overrides),
            "conflicts" => Some(EdgeKind::Conflicts),
            "similar-to" => Some(EdgeKind::SimilarTo),
            "learned-from" => Some(EdgeKind::LearnedFrom),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::parse_name(s).ok_or_else(|| format!("Unknown edge kind: {}", s))
    }
}

// ============================================================================
// SCOPE
// ============================================================================

/// Node scope - where a behavior applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Bound to the current project
    #[default]
    Local,
    /// Applies user-wide
    Global,
}

impl Scope {
    /// Convert to the wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }

    /// Parse from the wire string, defaulting to local
    pub fn parse_name(s: &str) -> Self {
        match s {
            "global" => Scope::Global,
            _ => Scope::Local,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived scope of an edge, a pure function of its endpoints
///
/// Equal endpoint scopes collapse to that scope; a cross-scope edge is
/// `Both`. Computed for rendering, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeScope {
    Local,
    Global,
    Both,
}

/// Derive the rendered scope of an edge from its endpoint scopes.
pub fn derive_edge_scope(source: Scope, target: Scope) -> EdgeScope {
    match (source, target) {
        (Scope::Local, Scope::Local) => EdgeScope::Local,
        (Scope::Global, Scope::Global) => EdgeScope::Global,
        _ => EdgeScope::Both,
    }
}

// ============================================================================
// BEHAVIOR KINDS
// ============================================================================

/// Conventional vocabulary for the `content.kind` field of behavior nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    /// An instruction the agent should follow
    #[default]
    Directive,
    /// A boundary the agent must not cross
    Constraint,
    /// A multi-step way of doing something
    Procedure,
    /// A soft stylistic preference
    Preference,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Directive => "directive",
            BehaviorKind::Constraint => "constraint",
            BehaviorKind::Procedure => "procedure",
            BehaviorKind::Preference => "preference",
        }
    }

    /// Parse from a content bag value, defaulting to directive
    pub fn parse_name(s: &str) -> Self {
        match s {
            "constraint" => BehaviorKind::Constraint,
            "procedure" => BehaviorKind::Procedure,
            "preference" => BehaviorKind::Preference,
            _ => BehaviorKind::Directive,
        }
    }
}

impl std::fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// NODES
// ============================================================================

/// A node in the behavior graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Opaque identifier, unique within a store
    pub id: String,
    /// Coarse node type ("behavior" for the behavior graph)
    pub kind: String,
    /// Schemaless content bag (name, kind, canonical text, tags, ...)
    pub content: AttrMap,
    /// Schemaless metadata bag (confidence, priority, scope, stats, ...)
    pub metadata: AttrMap,
    /// When the node was created (set by the store)
    pub created_at: DateTime<Utc>,
    /// When the node was last modified (set by the store)
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Node scope from metadata, defaulting to local when unspecified.
    pub fn scope(&self) -> Scope {
        Scope::parse_name(value::get_str(&self.metadata, "scope", "local"))
    }

    /// Confidence from metadata, defaulting to 0.6.
    pub fn confidence(&self) -> f64 {
        value::get_f64(&self.metadata, "confidence", 0.6)
    }

    /// Priority from metadata, defaulting to 0. Negative values clamp to 0.
    pub fn priority(&self) -> i64 {
        value::get_i64(&self.metadata, "priority", 0).max(0)
    }
}

/// Input for creating a node; timestamps are stamped by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNode {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub content: AttrMap,
    #[serde(default)]
    pub metadata: AttrMap,
}

impl NewNode {
    /// Create a behavior node input with the given id.
    pub fn behavior(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "behavior".to_string(),
            ..Default::default()
        }
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// A directed, weighted, typed edge between two nodes
///
/// Identity is (source, target, kind); re-insertion with the same triple
/// updates weight and timestamps in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Relation kind
    pub kind: EdgeKind,
    /// Weight in [0.0, 1.0]; 0.0 contributes nothing
    pub weight: f64,
    /// When the edge was first inserted
    pub created_at: DateTime<Utc>,
    /// When activation last traversed the edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activated: Option<DateTime<Utc>>,
}

impl Edge {
    /// The identity triple as a display string, for error messages.
    pub fn triple(&self) -> String {
        format!("{} -[{}]-> {}", self.source, self.kind, self.target)
    }
}

/// Input for inserting an edge; `created_at` is stamped by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: f64,
}

impl NewEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
        weight: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            weight,
        }
    }
}

/// Edge query direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges whose source is the queried node
    Outbound,
    /// Edges whose target is the queried node
    Inbound,
    /// Either endpoint
    Both,
}

// ============================================================================
// TESTS
// ============================================================================
