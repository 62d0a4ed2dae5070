// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fanout for the `ProcessStateChanged` signal (§4.10, §6).
//!
//! No state is preserved across Agent restarts (§6's persistent state
//! layout note), so this is a plain in-memory broadcast: every `Subscribe`d
//! listener task sees every signal sent while it is attached, and nothing
//! is durable or replayed.

use sc_core::ContainerHandle;
use tokio::sync::broadcast;

/// One firing of the **ProcessStateChanged** signal (§6): delivered
/// fire-and-forget to every subscriber, exactly once per launched process
/// (property P8).
#[derive(Debug, Clone)]
pub struct ProcessStateChanged {
    pub handle: ContainerHandle,
    pub pid: i32,
    pub is_running: bool,
    pub exit_code: i32,
}

/// Default channel capacity; a subscriber lagging behind by this many
/// signals misses the oldest ones and is told so on its next `recv`.
const CHANNEL_CAPACITY: usize = 1024;

/// Signal bus shared by the Agent Core (the sender) and the listener's
/// `Subscribe` connections (the receivers).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProcessStateChanged>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire-and-forget. No subscribers is not an error — the signal is
    /// simply unobserved, matching a D-Bus signal with no listener.
    pub fn send(&self, signal: ProcessStateChanged) {
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessStateChanged> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
