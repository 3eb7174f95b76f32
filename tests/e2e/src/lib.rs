//! Shared fixtures for the floop journey tests

use floop_core::{AttrMap, GraphStore, NewNode};
use tempfile::TempDir;

/// Open a fresh store in a temp directory. Keep the TempDir alive for
/// the duration of the test.
pub fn fresh_store() -> (GraphStore, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let store = GraphStore::open(Some(dir.path().join("graph.db"))).expect("open store");
    (store, dir)
}

/// Build a behavior node input with conventional content/metadata bags.
pub fn behavior(id: &str, name: &str, scope: &str) -> NewNode {
    let content = obj(serde_json::json!({
        "name": name,
        "kind": "directive",
        "content": { "canonical": format!("Canonical text for {}", name) },
        "provenance": "journey-test",
        "tags": ["test"],
    }));
    let metadata = obj(serde_json::json!({
        "confidence": 0.7,
        "priority": 1,
        "scope": scope,
    }));
    NewNode {
        id: id.to_string(),
        kind: "behavior".to_string(),
        content,
        metadata,
    }
}

/// Unwrap a JSON value into an attribute bag.
pub fn obj(value: serde_json::Value) -> AttrMap {
    match value {
        serde_json::Value::Object(m) => m,
        _ => panic!("expected JSON object"),
    }
}
