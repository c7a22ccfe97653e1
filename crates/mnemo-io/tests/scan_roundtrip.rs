//! Scanner round-trip and idempotence against an in-memory store.

use std::sync::Arc;

use mnemo_core::cancel::CancellationListener;
use mnemo_core::io_types::ChangeKind;
use mnemo_db::Database;
use mnemo_io::{ScanConfig, ScanInput, Scanner};

fn scanner() -> Scanner {
    Scanner::new(
        Arc::new(Database::init_with_schema().unwrap()),
        ScanConfig::default(),
    )
}

fn input(path: &str, content: &str) -> ScanInput {
    ScanInput {
        path: path.to_string(),
        content: content.to_string(),
    }
}

const V1: &str = "import { helper } from './helper';\n\nexport function entry() {\n  return helper();\n}\n";
const V2: &str = "export function entry() {\n  return 42;\n}\n\nexport function extra() {}\n";
const HELPER: &str = "export function helper() {\n  return 1;\n}\n";

#[test]
fn rescan_is_idempotent() {
    let s = scanner();
    let cancel = CancellationListener::never();
    let files = vec![input("src/main.ts", V1), input("src/helper.ts", HELPER)];

    let first = s.scan(&files, &cancel).unwrap();
    assert_eq!(first.stats.files_scanned, 2);
    let nodes_after_first = s.db().code_node_count().unwrap();
    let edges_after_first = s.db().code_edge_count().unwrap();

    let second = s.scan(&files, &cancel).unwrap();
    assert_eq!(second.stats.files_scanned, 0);
    assert_eq!(second.stats.nodes_added, 0);
    assert_eq!(s.db().code_node_count().unwrap(), nodes_after_first);
    assert_eq!(s.db().code_edge_count().unwrap(), edges_after_first);
}

#[test]
fn add_modify_delete_sequence() {
    let s = scanner();
    let cancel = CancellationListener::never();

    let added = s.scan(&[input("a.ts", V1)], &cancel).unwrap();
    assert_eq!(added.changes.len(), 1);
    assert_eq!(added.changes[0].kind, ChangeKind::Added);

    let modified = s.scan(&[input("a.ts", V2)], &cancel).unwrap();
    assert_eq!(modified.changes[0].kind, ChangeKind::Modified);
    assert!(modified.stats.nodes_deleted > 0);

    let deleted = s.scan(&[], &cancel).unwrap();
    assert_eq!(deleted.changes[0].kind, ChangeKind::Deleted);
    assert!(deleted.stats.nodes_deleted > 0);
    assert!(s.db().all_file_hashes().unwrap().is_empty());
    assert_eq!(s.db().code_node_count().unwrap(), 0);
}

#[test]
fn edge_endpoints_always_exist() {
    let s = scanner();
    let cancel = CancellationListener::never();
    s.scan(
        &[input("src/main.ts", V1), input("src/helper.ts", HELPER)],
        &cancel,
    )
    .unwrap();
    // Remove the import target; the edge must go with it.
    s.scan(&[input("src/main.ts", V1)], &cancel).unwrap();

    for kind in [
        mnemo_core::types::CodeEdgeType::Imports,
        mnemo_core::types::CodeEdgeType::Calls,
    ] {
        for (from, to) in s.db().edges_of_type(kind).unwrap() {
            assert!(s.db().get_code_node(&from).unwrap().is_some(), "{from}");
            assert!(s.db().get_code_node(&to).unwrap().is_some(), "{to}");
        }
    }
}

#[test]
fn file_hash_rows_match_nodes() {
    let s = scanner();
    let cancel = CancellationListener::never();
    s.scan(
        &[input("src/main.ts", V1), input("notes.txt", "plain text")],
        &cancel,
    )
    .unwrap();
    for entry in s.db().all_file_hashes().unwrap() {
        assert!(
            !s.db().nodes_by_file(&entry.path).unwrap().is_empty(),
            "hash row without nodes for {}",
            entry.path
        );
    }
}

#[test]
fn per_file_error_does_not_abort_batch() {
    let s = scanner();
    let cancel = CancellationListener::never();
    // A binary blob is skipped; the good file still lands.
    let out = s
        .scan(
            &[
                input("bin.ts", "\u{0}\u{0}binary"),
                input("good.ts", "export function ok() {}\n"),
            ],
            &cancel,
        )
        .unwrap();
    assert_eq!(out.stats.files_scanned, 1);
    assert!(!s.db().nodes_by_file("good.ts").unwrap().is_empty());
}
