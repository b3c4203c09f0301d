// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Diagnostic events emitted by a queue.
//!
//! Each [`OperationQueue`](crate::OperationQueue) reports what it does to an
//! injected [`EventSink`]. The default [`TracingSink`] turns events into
//! `tracing` records tagged with the partition; tests can install a
//! [`RecordingSink`] and assert on the exact sequence instead.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::PartitionKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Store opened and cursors recovered.
    Opened { dir: PathBuf, head: u64, tail: u64 },
    /// One operation appended.
    Added {
        unique_suffix: String,
        head:          u64,
        tail:          u64,
    },
    /// Range `[from, to)` read for a peek.
    Peeked { from: u64, to: u64 },
    /// Range `[from, to)` read and about to be deleted.
    Removing { from: u64, to: u64 },
    /// Deleting the range failed; the head was not advanced.
    DeleteFailed { from: u64, to: u64, reason: String },
    /// Head advanced after a successful remove.
    Removed { head: u64, tail: u64 },
    /// Close started.
    Closing,
    /// The store reported an error while closing. Swallowed.
    CloseFailed { reason: String },
    /// Read-only call made against a closed queue.
    ClosedAccess,
    /// Partition storage about to be deleted.
    Dropping { dir: PathBuf },
}

/// Receives every event a queue emits.
pub trait EventSink: Send + Sync {
    fn emit(&self, partition: &PartitionKey, event: &QueueEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, partition: &PartitionKey, event: &QueueEvent) {
        let channel = partition.channel_id();
        let namespace = partition.namespace();
        match event {
            QueueEvent::Opened { dir, head, tail } => info!(
                channel,
                namespace,
                path = ?dir,
                head,
                tail,
                "Initialized operation queue"
            ),
            QueueEvent::Added {
                unique_suffix,
                head,
                tail,
            } => debug!(
                channel,
                namespace,
                unique_suffix = %unique_suffix,
                head,
                tail,
                "Added operation"
            ),
            QueueEvent::Peeked { from, to } => {
                debug!(channel, namespace, from, to, "Returning operations");
            }
            QueueEvent::Removing { from, to } => {
                debug!(channel, namespace, from, to, "Removing operations");
            }
            QueueEvent::DeleteFailed { from, to, reason } => warn!(
                channel,
                namespace,
                from,
                to,
                reason = %reason,
                "Unable to delete removed operations"
            ),
            QueueEvent::Removed { head, tail } => {
                debug!(channel, namespace, head, tail, "Removed operations");
            }
            QueueEvent::Closing => info!(channel, namespace, "Closing queue"),
            QueueEvent::CloseFailed { reason } => {
                error!(channel, namespace, reason = %reason, "Error closing queue store");
            }
            QueueEvent::ClosedAccess => warn!(channel, namespace, "Invocation on a closed queue"),
            QueueEvent::Dropping { dir } => {
                warn!(channel, namespace, path = ?dir, "Dropping queue storage");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(PartitionKey, QueueEvent)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Events recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events
            .lock()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Events recorded for one partition.
    #[must_use]
    pub fn events_for(&self, partition: &PartitionKey) -> Vec<QueueEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(key, _)| key == partition)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, partition: &PartitionKey, event: &QueueEvent) {
        self.events.lock().push((partition.clone(), event.clone()));
    }
}
