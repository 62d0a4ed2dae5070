use super::*;
use sc_adapters::FakeContainerDriver;
use sc_core::CleanupHandler;
use std::path::PathBuf;

fn driver() -> Arc<dyn ContainerDriver> {
    Arc::new(FakeContainerDriver::new())
}

#[test]
fn push_suppresses_duplicate_path_for_file_unlink() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::FileUnlink { path: PathBuf::from("/tmp/a") });
    stack.push(CleanupHandler::FileUnlink { path: PathBuf::from("/tmp/a") });
    assert_eq!(stack.len(), 1);
}

#[test]
fn push_does_not_suppress_duplicate_mount_path() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::UnmountLazy { path: PathBuf::from("/run/sc/gw") });
    stack.push(CleanupHandler::UnmountLazy { path: PathBuf::from("/run/sc/gw") });
    assert_eq!(stack.len(), 2);
}

#[tokio::test]
async fn drain_dispatches_process_terminate_to_driver() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::ProcessTerminate { pid: 4242 });
    let driver = driver();
    let failed = stack.drain(&driver).await;
    assert!(failed.is_empty());
    assert!(stack.is_empty());
}

#[tokio::test]
async fn drain_is_lifo() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::FileUnlink { path: PathBuf::from("/tmp/first") });
    stack.push(CleanupHandler::ProcessTerminate { pid: 1 });
    let driver = driver();
    // FileUnlink for a nonexistent path is treated as already-undone, so
    // both handlers drain cleanly regardless of order; what matters here is
    // that drain empties the stack and the ProcessTerminate (pushed last)
    // doesn't block on the FileUnlink pushed first.
    let failed = stack.drain(&driver).await;
    assert!(failed.is_empty());
}

#[tokio::test]
async fn drain_reports_iptables_handler_as_failed() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::IptablesRuleDelete { handle: "SC-1".to_string() });
    let driver = driver();
    let failed = stack.drain(&driver).await;
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn rollback_to_mark_leaves_earlier_handlers() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::FileUnlink { path: PathBuf::from("/tmp/kept") });
    let mark = stack.mark();
    stack.push(CleanupHandler::FileUnlink { path: PathBuf::from("/tmp/undone") });
    let driver = driver();
    let failed = stack.rollback_to(mark, &driver).await;
    assert!(failed.is_empty());
    assert_eq!(stack.len(), 1);
}

#[tokio::test]
async fn drain_empties_stack_even_on_failure() {
    let stack = CleanupStack::new();
    stack.push(CleanupHandler::AudioModuleUnload { index: 3 });
    let driver = driver();
    stack.drain(&driver).await;
    assert!(stack.is_empty());
}
