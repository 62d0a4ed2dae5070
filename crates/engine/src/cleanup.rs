// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup Stack (C1): a LIFO ledger of reversible side effects (§3,
//! §4.2). Every mutating operation in the Container lifecycle and the
//! gateways pushes the [`CleanupHandler`] that inverts it before control
//! returns (invariant I3); [`CleanupStack::drain`] unwinds the ledger on
//! rollback, `destroy`, or agent shutdown, continuing past individual
//! failures and reporting what did not come clean.

use parking_lot::Mutex;
use sc_adapters::{fs_toolkit, ContainerDriver};
use sc_core::CleanupHandler;
use std::sync::Arc;
use tracing::warn;

/// Thread-safe LIFO stack of pending cleanup handlers, shared by a
/// Container and the gateways it owns.
#[derive(Default)]
pub struct CleanupStack {
    handlers: Mutex<Vec<CleanupHandler>>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a handler. `DirectoryRemove`/`FileUnlink` handlers targeting a
    /// path already on the stack are suppressed (§4.2: a later
    /// operation re-touching the same path does not need a second undo);
    /// mount handlers are never deduplicated, since each bind/overlay/tmpfs
    /// mount at a reused path is a distinct mount-table entry to unwind.
    pub fn push(&self, handler: CleanupHandler) {
        let mut handlers = self.handlers.lock();
        if let Some(path) = handler.dedup_path() {
            if handlers.iter().any(|h| h.dedup_path() == Some(path)) {
                return;
            }
        }
        handlers.push(handler);
    }

    /// Number of handlers currently on the stack. Used by tests asserting a
    /// failed setup left nothing behind after rollback.
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// A mark for [`CleanupStack::rollback_to`]: the number of handlers
    /// currently on the stack. Take a mark before a compound operation and
    /// roll back to it on failure to undo only that operation's own
    /// handlers, leaving everything pushed before it untouched.
    pub fn mark(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Unwinds handlers pushed since `mark`, in LIFO order, and leaves the
    /// rest of the stack in place. Used for the Container lifecycle's local
    /// rollback of a single compound operation (§4.1's "destroy" note
    /// that failure at any step unwinds only the handlers pushed in that
    /// call). Failures are logged and do not stop the unwind, matching
    /// `drain`.
    pub async fn rollback_to(
        &self,
        mark: usize,
        driver: &Arc<dyn ContainerDriver>,
    ) -> Vec<CleanupHandler> {
        let pending: Vec<CleanupHandler> = {
            let mut handlers = self.handlers.lock();
            if mark >= handlers.len() {
                Vec::new()
            } else {
                handlers.split_off(mark)
            }
        };

        let mut failed = Vec::new();
        for handler in pending.into_iter().rev() {
            if let Err(detail) = Self::undo_one(driver, &handler).await {
                warn!(kind = handler.kind(), %detail, "rollback handler failed");
                failed.push(handler);
            }
        }
        failed
    }

    /// Unwinds every handler in LIFO order. Each handler's failure is
    /// logged and does not stop the drain (§4.2: cleanup is
    /// best-effort and exhaustive); the handlers that failed are returned
    /// so the caller can report `ResourceError::CleanupIncomplete`.
    pub async fn drain(&self, driver: &Arc<dyn ContainerDriver>) -> Vec<CleanupHandler> {
        let pending: Vec<CleanupHandler> = {
            let mut handlers = self.handlers.lock();
            std::mem::take(&mut *handlers)
        };

        let mut failed = Vec::new();
        for handler in pending.into_iter().rev() {
            if let Err(detail) = Self::undo_one(driver, &handler).await {
                warn!(kind = handler.kind(), %detail, "cleanup handler failed");
                failed.push(handler);
            }
        }
        failed
    }

    async fn undo_one(
        driver: &Arc<dyn ContainerDriver>,
        handler: &CleanupHandler,
    ) -> Result<(), String> {
        match handler {
            CleanupHandler::DirectoryRemove { .. }
            | CleanupHandler::FileUnlink { .. }
            | CleanupHandler::UnmountLazy { .. }
            | CleanupHandler::OverlaySync { .. } => {
                fs_toolkit::undo(handler).map_err(|e| e.to_string())
            }
            CleanupHandler::ProcessTerminate { pid } => {
                driver.terminate_pid(*pid).await.map_err(|e| e.to_string())
            }
            // Insertion/removal of iptables rules and audio modules is
            // performed directly by the Network/Pulse gateways' own
            // teardown, which runs before the Cleanup Stack would ever be
            // drained in the normal shutdown path. Reaching one of these
            // here means teardown was skipped (e.g. the agent crashed); the
            // in-memory stack cannot act on a rule or module handle across
            // a process restart, so this is a best-effort no-op that is
            // reported as failed so `CleanupIncomplete` surfaces it.
            CleanupHandler::IptablesRuleDelete { .. } | CleanupHandler::AudioModuleUnload { .. } => {
                Err("handler requires live gateway teardown, not stack drain".to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
