//! Typed read-only view over a behavior node
//!
//! The conventional behavior fields live in the schemaless bags, so
//! readers go through this facade instead of poking at raw JSON.

use super::node::{BehaviorKind, Node, Scope};
use super::value;

/// Read-only typed facade over a behavior node's attribute bags.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorView<'a> {
    node: &'a Node,
}

impl<'a> BehaviorView<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Node id.
    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Short display name, falling back to the node id.
    pub fn name(&self) -> &str {
        value::get_str(&self.node.content, "name", &self.node.id)
    }

    /// Behavior kind (directive, constraint, procedure, preference).
    pub fn behavior_kind(&self) -> BehaviorKind {
        BehaviorKind::parse_name(value::get_str(&self.node.content, "kind", "directive"))
    }

    /// Canonical behavior text from the nested `content.canonical` field.
    pub fn canonical(&self) -> &str {
        value::get_map(&self.node.content, "content")
            .map(|m| value::get_str(m, "canonical", ""))
            .unwrap_or("")
    }

    /// Optional trigger pattern (`when`).
    pub fn trigger(&self) -> Option<&str> {
        match value::get_str(&self.node.content, "when", "") {
            "" => None,
            s => Some(s),
        }
    }

    /// Where the behavior came from.
    pub fn provenance(&self) -> &str {
        value::get_str(&self.node.content, "provenance", "")
    }

    /// Tags, tolerating mixed-type storage.
    pub fn tags(&self) -> Vec<String> {
        value::get_str_list(&self.node.content, "tags")
    }

    pub fn confidence(&self) -> f64 {
        self.node.confidence()
    }

    pub fn priority(&self) -> i64 {
        self.node.priority()
    }

    pub fn scope(&self) -> Scope {
        self.node.scope()
    }
}
