//! Graph lifecycle journey: build a behavior graph, query it, derive
//! edge scopes, and tear nodes down with cascade.

use floop_e2e_tests::{behavior, fresh_store, obj};
use floop_core::{
    derive_edge_scope, BehaviorView, Direction, EdgeKind, EdgeScope, NewEdge, NodePredicate,
};

#[test]
fn edge_insertion_is_idempotent() {
    let (store, _dir) = fresh_store();
    store.add_node(behavior("a", "alpha", "local")).unwrap();
    store.add_node(behavior("b", "beta", "local")).unwrap();

    store
        .add_edge(NewEdge::new("a", "b", EdgeKind::Requires, 0.5))
        .unwrap();
    store
        .add_edge(NewEdge::new("a", "b", EdgeKind::Requires, 0.5))
        .unwrap();

    let edges = store.get_edges("a", Direction::Outbound, None).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].weight, 0.5);

    // Latest insertion wins the weight
    store
        .add_edge(NewEdge::new("a", "b", EdgeKind::Requires, 0.8))
        .unwrap();
    let edges = store.get_edges("a", Direction::Outbound, None).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].weight, 0.8);
}

#[test]
fn cross_scope_edges_derive_both() {
    let (store, _dir) = fresh_store();
    store.add_node(behavior("b1", "one", "local")).unwrap();
    store.add_node(behavior("b2", "two", "local")).unwrap();
    store.add_node(behavior("b3", "three", "global")).unwrap();
    store
        .add_edge(NewEdge::new("b1", "b2", EdgeKind::SimilarTo, 0.6))
        .unwrap();
    store
        .add_edge(NewEdge::new("b1", "b3", EdgeKind::Requires, 0.9))
        .unwrap();

    let scope_of = |edge_target: &str| {
        let source = store.get_node("b1").unwrap().unwrap();
        let target = store.get_node(edge_target).unwrap().unwrap();
        derive_edge_scope(source.scope(), target.scope())
    };
    assert_eq!(scope_of("b2"), EdgeScope::Local);
    assert_eq!(scope_of("b3"), EdgeScope::Both);
}

#[test]
fn query_surface_covers_indexed_and_bag_fields() {
    let (store, _dir) = fresh_store();
    store.add_node(behavior("b1", "one", "local")).unwrap();
    store.add_node(behavior("b2", "two", "global")).unwrap();
    store.add_node(behavior("b3", "three", "global")).unwrap();

    let all = store.query_nodes(&NodePredicate::new()).unwrap();
    assert_eq!(all.len(), 3);

    let global = store
        .query_nodes(&NodePredicate::new().with("scope", "global"))
        .unwrap();
    assert_eq!(global.len(), 2);

    let named = store
        .query_nodes(&NodePredicate::new().with("name", "two"))
        .unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].id, "b2");

    // The typed facade reads the conventional fields back
    let view = BehaviorView::new(&named[0]);
    assert_eq!(view.name(), "two");
    assert_eq!(view.canonical(), "Canonical text for two");
    assert_eq!(view.provenance(), "journey-test");
}

#[test]
fn update_then_delete_with_cascade() {
    let (store, _dir) = fresh_store();
    store.add_node(behavior("hub", "hub", "local")).unwrap();
    store.add_node(behavior("leaf", "leaf", "local")).unwrap();
    store
        .add_edge(NewEdge::new("hub", "leaf", EdgeKind::LearnedFrom, 0.4))
        .unwrap();
    store
        .add_edge(NewEdge::new("leaf", "hub", EdgeKind::Overrides, 0.3))
        .unwrap();

    // Wholesale metadata replacement reindexes scope
    let node = store.get_node("hub").unwrap().unwrap();
    store
        .update_node(
            "hub",
            node.content.clone(),
            obj(serde_json::json!({ "scope": "global" })),
        )
        .unwrap();
    assert_eq!(
        store
            .query_nodes(&NodePredicate::new().with("scope", "global"))
            .unwrap()
            .len(),
        1
    );

    store.delete_node("hub").unwrap();
    assert!(store.get_node("hub").unwrap().is_none());
    assert!(store
        .get_edges("leaf", Direction::Both, None)
        .unwrap()
        .is_empty());

    store.sync().unwrap();
    store.close().unwrap();
}
