// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn directory_remove_has_a_dedup_path() {
    let h = CleanupHandler::DirectoryRemove {
        path: PathBuf::from("/tmp/x"),
    };
    assert_eq!(h.dedup_path(), Some(&PathBuf::from("/tmp/x")));
    assert_eq!(h.kind(), "directory_remove");
}

#[test]
fn file_unlink_has_a_dedup_path() {
    let h = CleanupHandler::FileUnlink {
        path: PathBuf::from("/tmp/x"),
    };
    assert_eq!(h.dedup_path(), Some(&PathBuf::from("/tmp/x")));
}

#[test]
fn mount_handlers_are_never_deduplicated() {
    let h = CleanupHandler::UnmountLazy {
        path: PathBuf::from("/tmp/x"),
    };
    assert_eq!(h.dedup_path(), None);
}

#[test]
fn process_terminate_kind_name() {
    let h = CleanupHandler::ProcessTerminate { pid: 42 };
    assert_eq!(h.kind(), "process_terminate");
}
