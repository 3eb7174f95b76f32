//! Backup journey: snapshot a live store, write both formats, tamper,
//! restore in both modes, and prune with a composite retention policy.

use chrono::{Duration, Utc};
use floop_e2e_tests::{behavior, fresh_store};
use floop_core::{
    apply_retention, backup_file_name, list_backups, read_backup, restore, snapshot_store,
    write_backup, BackupError, BackupFormat, EdgeKind, NewEdge, RestoreMode, RetentionPolicy,
};
use tokio_util::sync::CancellationToken;

fn populated() -> (floop_core::GraphStore, tempfile::TempDir) {
    let (store, dir) = fresh_store();
    store.add_node(behavior("b1", "one", "local")).unwrap();
    store.add_node(behavior("b2", "two", "global")).unwrap();
    store
        .add_edge(NewEdge::new("b1", "b2", EdgeKind::Requires, 0.75))
        .unwrap();
    (store, dir)
}

#[test]
fn v2_roundtrip_through_disk_and_store() {
    let (store, dir) = populated();
    let cancel = CancellationToken::new();
    let body = snapshot_store(&store, &cancel).unwrap();

    let path = dir.path().join(backup_file_name(BackupFormat::V2, Utc::now()));
    write_backup(&path, BackupFormat::V2, &body).unwrap();

    let (read, format) = read_backup(&path).unwrap();
    assert_eq!(format, BackupFormat::V2);
    assert_eq!(read.nodes.len(), 2);
    assert_eq!(read.edges.len(), 1);
    assert_eq!(read.nodes[0].content, body.nodes[0].content);
    assert_eq!(read.edges[0].weight, 0.75);

    // Replace-restore into an empty store reproduces node and edge sets
    let (target, _tdir) = fresh_store();
    let report = restore(&target, &read, RestoreMode::Replace, &cancel).unwrap();
    assert_eq!(report.nodes_restored, 2);
    assert_eq!(report.edges_restored, 1);
    assert_eq!(target.all_node_ids().unwrap(), store.all_node_ids().unwrap());
}

#[test]
fn tampered_backup_never_partially_applies() {
    let (store, dir) = populated();
    let cancel = CancellationToken::new();
    let body = snapshot_store(&store, &cancel).unwrap();

    let path = dir.path().join("floop-backup-20260401-000000.json.gz");
    write_backup(&path, BackupFormat::V2, &body).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let err = read_backup(&path).unwrap_err();
    assert!(matches!(err, BackupError::Corrupted(_)));
}

#[test]
fn merge_restore_counts_skips() {
    let (store, dir) = populated();
    let cancel = CancellationToken::new();
    let body = snapshot_store(&store, &cancel).unwrap();

    let path = dir.path().join("floop-backup-20260401-000001.json");
    write_backup(&path, BackupFormat::V1, &body).unwrap();
    let (read, format) = read_backup(&path).unwrap();
    assert_eq!(format, BackupFormat::V1);

    // Target already has b1 and the b1→b2 edge will land after b2 merges
    let (target, _tdir) = fresh_store();
    target.add_node(behavior("b1", "pre-existing", "local")).unwrap();

    let report = restore(&target, &read, RestoreMode::Merge, &cancel).unwrap();
    assert_eq!(report.nodes_restored, 1);
    assert_eq!(report.nodes_skipped, 1);
    assert_eq!(report.edges_restored, 1);

    // Merge kept the pre-existing node untouched
    let node = target.get_node("b1").unwrap().unwrap();
    assert_eq!(
        node.content.get("name").and_then(|v| v.as_str()),
        Some("pre-existing")
    );
}

#[test]
fn composite_retention_keeps_union_and_deletes_rest() {
    let (store, dir) = populated();
    let cancel = CancellationToken::new();
    let body = snapshot_store(&store, &cancel).unwrap();

    let backups = dir.path().join("backups");
    let now = Utc::now();
    // Ages: 0h, 1h, 48h, 72h, 100h
    for age_hours in [0, 1, 48, 72, 100] {
        let at = now - Duration::hours(age_hours);
        let path = backups.join(backup_file_name(BackupFormat::V2, at));
        write_backup(&path, BackupFormat::V2, &body).unwrap();
    }
    assert_eq!(list_backups(&backups).unwrap().len(), 5);

    // Count=3 keeps the newest three; Age=24h keeps the two freshest.
    // Union keeps exactly the newest three relative to the file stamps.
    let policy = RetentionPolicy::Any(vec![
        RetentionPolicy::Count(3),
        RetentionPolicy::Age(Duration::hours(24)),
    ]);
    let entries = list_backups(&backups).unwrap();
    let keep = policy.keep(&entries, now);
    assert_eq!(keep, vec![true, true, true, false, false]);

    let deleted = apply_retention(&backups, &policy).unwrap();
    assert_eq!(deleted.len(), 2);
    let remaining = list_backups(&backups).unwrap();
    assert_eq!(remaining.len(), 3);
    assert_eq!(
        remaining[0].path.file_name().unwrap(),
        backup_file_name(BackupFormat::V2, now).as_str()
    );

    // Every survivor still reads back clean
    for entry in remaining {
        let (read, _) = read_backup(&entry.path).unwrap();
        assert_eq!(read.nodes.len(), 2);
    }
}
