// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn create_dir_recursive_creates_nested_path_and_undo_removes_leaf() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("a/b/c");

    let handler = create_dir_recursive(&target).unwrap();
    assert!(target.is_dir());
    assert_eq!(handler, CleanupHandler::DirectoryRemove { path: target.clone() });

    undo(&handler).unwrap();
    assert!(!target.exists());
    // Ancestors created along the way are left in place.
    assert!(target.parent().unwrap().is_dir());
}

#[test]
fn touch_file_creates_empty_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("staging/gateway-dir/a.txt");

    let handler = touch_file(&target).unwrap();
    assert!(target.is_file());
    assert_eq!(std::fs::read(&target).unwrap().len(), 0);
    assert_eq!(handler, CleanupHandler::FileUnlink { path: target });
}

#[test]
fn write_file_truncates_existing_contents() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("env");
    write_file(&target, b"first").unwrap();
    write_file(&target, b"second").unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
}

#[test]
fn append_file_accumulates_across_calls() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("env");
    append_file(&target, "export PATH='/usr/bin'\n").unwrap();
    append_file(&target, "export HOME='/root'\n").unwrap();
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "export PATH='/usr/bin'\nexport HOME='/root'\n"
    );
}

#[test]
fn undo_directory_remove_is_idempotent_for_missing_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("never-created");
    let handler = CleanupHandler::DirectoryRemove { path: missing };
    undo(&handler).unwrap();
}

#[test]
fn undo_file_unlink_is_idempotent_for_missing_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("never-created.txt");
    let handler = CleanupHandler::FileUnlink { path: missing };
    undo(&handler).unwrap();
}

#[test]
fn undo_ignores_handlers_dispatched_elsewhere() {
    // ProcessTerminate/IptablesRuleDelete/AudioModuleUnload are dispatched by
    // sc-engine's Cleanup Stack, not the filesystem toolkit.
    undo(&CleanupHandler::ProcessTerminate { pid: 1 }).unwrap();
    undo(&CleanupHandler::IptablesRuleDelete { handle: "h".to_string() }).unwrap();
    undo(&CleanupHandler::AudioModuleUnload { index: 0 }).unwrap();
}

#[test]
#[ignore = "requires CAP_SYS_ADMIN to bind-mount; run in a privileged sandbox"]
fn bind_mount_then_undo_round_trips() {
    let dir = TempDir::new().unwrap();
    let host = dir.path().join("host.txt");
    std::fs::write(&host, "hello").unwrap();
    let target = dir.path().join("target.txt");
    std::fs::write(&target, "").unwrap();

    let handler = bind_mount(&host, &target).unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");

    undo(&handler).unwrap();
    assert!(host.exists(), "host file must survive teardown");
}
