//! Activation journey: seed a graph, spread with the default config,
//! and check inhibition, determinism, and the termination contract.

use floop_e2e_tests::{behavior, fresh_store};
use floop_core::{spread, ActivationConfig, ActivationSeed, EdgeKind, NewEdge};
use tokio_util::sync::CancellationToken;

#[test]
fn conflicts_inhibit_and_decay() {
    let (store, _dir) = fresh_store();
    for id in ["s", "a", "b"] {
        store.add_node(behavior(id, id, "local")).unwrap();
    }
    store
        .add_edge(NewEdge::new("s", "a", EdgeKind::Requires, 1.0))
        .unwrap();
    store
        .add_edge(NewEdge::new("s", "b", EdgeKind::Conflicts, 1.0))
        .unwrap();

    let steps = spread(
        &store,
        &[ActivationSeed::new("s", 1.0)],
        &ActivationConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    // Step 0 carries exactly the seed
    assert_eq!(steps[0].step, 0);
    assert_eq!(steps[0].activation.get("s"), Some(&1.0));

    // One hop: requires excites, conflicts inhibits
    let a1 = *steps[1].activation.get("a").unwrap();
    let b1 = *steps[1].activation.get("b").unwrap();
    assert!(a1 > 0.0);
    assert!(b1 < 0.0);

    // Both magnitudes decay toward zero as the seed drains
    let last = steps.last().unwrap();
    assert!(last.is_final);
    assert!(last.activation.get("a").copied().unwrap_or(0.0) < a1);
    assert!(last.activation.get("b").copied().unwrap_or(0.0).abs() < b1.abs());
}

#[test]
fn snapshots_are_deterministic_across_runs() {
    let (store, _dir) = fresh_store();
    for id in ["root", "m1", "m2", "m3"] {
        store.add_node(behavior(id, id, "local")).unwrap();
    }
    for (source, target, kind, weight) in [
        ("root", "m1", EdgeKind::Requires, 0.9),
        ("root", "m2", EdgeKind::SimilarTo, 0.8),
        ("m1", "m3", EdgeKind::Overrides, 0.7),
        ("m2", "m3", EdgeKind::Conflicts, 0.6),
        ("m3", "root", EdgeKind::LearnedFrom, 0.5),
    ] {
        store
            .add_edge(NewEdge::new(source, target, kind, weight))
            .unwrap();
    }

    let seeds = [ActivationSeed::new("root", 1.0)];
    let config = ActivationConfig::default();
    let cancel = CancellationToken::new();
    let run1 = spread(&store, &seeds, &config, &cancel).unwrap();
    let run2 = spread(&store, &seeds, &config, &cancel).unwrap();
    assert_eq!(run1, run2);

    // JSON serializations are bit-identical too
    assert_eq!(
        serde_json::to_string(&run1).unwrap(),
        serde_json::to_string(&run2).unwrap()
    );
}

#[test]
fn termination_contract_holds_on_dense_cycles() {
    let (store, _dir) = fresh_store();
    let ids = ["c0", "c1", "c2", "c3", "c4"];
    for id in ids {
        store.add_node(behavior(id, id, "local")).unwrap();
    }
    // Full cycle plus chords
    for i in 0..ids.len() {
        store
            .add_edge(NewEdge::new(
                ids[i],
                ids[(i + 1) % ids.len()],
                EdgeKind::Requires,
                1.0,
            ))
            .unwrap();
        store
            .add_edge(NewEdge::new(
                ids[i],
                ids[(i + 2) % ids.len()],
                EdgeKind::SimilarTo,
                0.9,
            ))
            .unwrap();
    }

    let config = ActivationConfig {
        max_steps: 25,
        ..Default::default()
    };
    let steps = spread(
        &store,
        &[ActivationSeed::new("c0", 1.0)],
        &config,
        &CancellationToken::new(),
    )
    .unwrap();

    assert!(steps.len() <= config.max_steps + 1);
    assert!(steps.last().unwrap().is_final);
    assert_eq!(
        steps.iter().filter(|s| s.is_final).count(),
        1,
        "exactly one final snapshot"
    );
    for step in &steps {
        for value in step.activation.values() {
            assert!((-1.0..=1.0).contains(value), "activation out of range");
        }
    }
}

#[test]
fn multi_seed_spread_unions_activation() {
    let (store, _dir) = fresh_store();
    for id in ["s1", "s2", "shared"] {
        store.add_node(behavior(id, id, "local")).unwrap();
    }
    store
        .add_edge(NewEdge::new("s1", "shared", EdgeKind::Requires, 0.5))
        .unwrap();
    store
        .add_edge(NewEdge::new("s2", "shared", EdgeKind::Requires, 0.5))
        .unwrap();

    let steps = spread(
        &store,
        &[
            ActivationSeed::new("s1", 1.0),
            ActivationSeed::new("s2", 0.5),
        ],
        &ActivationConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(steps[0].activation.len(), 2);
    // Shared target accumulates flow from both seeds
    let single = 1.0 * 0.5 * 1.0 * 0.85;
    let combined = steps[1].activation.get("shared").copied().unwrap();
    assert!(combined > single);
}
