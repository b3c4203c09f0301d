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

//! Queue engine: cursor management and lifecycle.
//!
//! An [`OperationQueue`] owns one partition. Records live in the store under
//! their offset; the in-memory cursors `head` and `tail` bound the persisted
//! range `[head, tail)`.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = OperationQueue::open(PartitionKey::new("ch", "ns")?, "/var/opqueue")?;
//!
//! queue.add(&op)?;
//!
//! let batch = queue.peek(100)?;
//! // ... commit the batch downstream ...
//! queue.remove(batch.len() as u64)?;
//!
//! queue.close();
//! queue.drop_storage()?;
//! ```
//!
//! ## Locking
//!
//! One reader-writer lock guards the cursors and the store handle. `add`,
//! `remove` and `peek` hold the write lock for their whole duration,
//! including store I/O. `len` only takes the read lock.

use std::{
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    OperationInfo, PartitionKey, QueueBuilder, Result,
    codec::{decode_offset, decode_record, encode_offset, encode_record},
    error::{
        ClosedSnafu, DeleteSnafu, DroppedSnafu, MissingRecordSnafu, NotClosedSnafu,
        OffsetExhaustedSnafu, RemoveDirSnafu, StoreSnafu,
    },
    events::{EventSink, QueueEvent},
    recovery::Cursors,
    store::Store,
};

enum State {
    Open(Box<dyn Store>),
    Closed,
    Dropped,
}

struct Inner {
    cursors: Cursors,
    state:   State,
}

/// A durable FIFO queue of pending operations for one partition.
///
/// `OperationQueue` is `Send + Sync`; share it behind an [`Arc`] between the
/// producers calling [`add`](Self::add) and the batching consumer calling
/// [`peek`](Self::peek) and [`remove`](Self::remove).
pub struct OperationQueue {
    partition: PartitionKey,
    dir:       PathBuf,
    sink:      Arc<dyn EventSink>,
    inner:     RwLock<Inner>,
}

impl OperationQueue {
    /// Opens the partition under `base_dir` with the default configuration.
    pub fn open<P: Into<PathBuf>>(partition: PartitionKey, base_dir: P) -> Result<Self> {
        QueueBuilder::new(base_dir, partition).open()
    }

    pub(crate) fn from_parts(
        partition: PartitionKey,
        dir: PathBuf,
        store: Box<dyn Store>,
        cursors: Cursors,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        sink.emit(
            &partition,
            &QueueEvent::Opened {
                dir:  dir.clone(),
                head: cursors.head,
                tail: cursors.tail,
            },
        );

        Self {
            partition,
            dir,
            sink,
            inner: RwLock::new(Inner {
                cursors,
                state: State::Open(store),
            }),
        }
    }

    #[must_use]
    pub const fn partition(&self) -> &PartitionKey { &self.partition }

    /// Storage directory of this partition.
    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }

    /// Current `(head, tail)`.
    #[must_use]
    pub fn cursors(&self) -> Cursors { self.inner.read().cursors }

    fn emit(&self, event: &QueueEvent) { self.sink.emit(&self.partition, event); }

    /// Appends `op` at the tail and returns the new size.
    ///
    /// Nothing changes if encoding or the store write fails.
    pub fn add(&self, op: &OperationInfo) -> Result<u64> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let State::Open(store) = &inner.state else {
            return ClosedSnafu.fail();
        };

        let tail = inner.cursors.tail;
        let next_tail = tail
            .checked_add(1)
            .context(OffsetExhaustedSnafu { tail })?;
        let value = encode_record(op)?;
        store.put(&encode_offset(tail), &value).context(StoreSnafu)?;
        inner.cursors.tail = next_tail;

        self.emit(&QueueEvent::Added {
            unique_suffix: op.unique_suffix.clone(),
            head:          inner.cursors.head,
            tail:          inner.cursors.tail,
        });

        Ok(inner.cursors.len())
    }

    /// Removes up to `max` operations from the head and returns them oldest
    /// first, together with the new size.
    ///
    /// Every record in the range is read and decoded before anything is
    /// deleted, so a corrupted record leaves the queue untouched. If the
    /// delete fails the head is not advanced.
    pub fn remove(&self, max: u64) -> Result<(Vec<OperationInfo>, u64)> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let State::Open(store) = &inner.state else {
            return ClosedSnafu.fail();
        };

        let Cursors { head, tail } = inner.cursors;
        if head == tail {
            return Ok((Vec::new(), 0));
        }
        let to = head + max.min(tail - head);
        if to == head {
            return Ok((Vec::new(), tail - head));
        }

        self.emit(&QueueEvent::Removing { from: head, to });
        let ops = read_range(&**store, head, to)?;

        let keys: Vec<Vec<u8>> = (head..to)
            .map(|offset| encode_offset(offset).to_vec())
            .collect();
        if let Err(source) = store.delete_batch(&keys) {
            self.emit(&QueueEvent::DeleteFailed {
                from:   head,
                to,
                reason: source.to_string(),
            });
            return Err(source).context(DeleteSnafu { from: head, to });
        }

        inner.cursors.head = to;
        self.emit(&QueueEvent::Removed {
            head: inner.cursors.head,
            tail: inner.cursors.tail,
        });

        Ok((ops, inner.cursors.len()))
    }

    /// Returns up to `max` operations from the head without removing them.
    pub fn peek(&self, max: u64) -> Result<Vec<OperationInfo>> {
        let guard = self.inner.write();
        let State::Open(store) = &guard.state else {
            return ClosedSnafu.fail();
        };

        let Cursors { head, tail } = guard.cursors;
        let to = head + max.min(tail - head);
        if to == head {
            return Ok(Vec::new());
        }

        self.emit(&QueueEvent::Peeked { from: head, to });
        read_range(&**store, head, to)
    }

    /// Number of operations in the queue, or 0 once closed.
    #[must_use]
    pub fn len(&self) -> u64 {
        let guard = self.inner.read();
        if let State::Open(_) = guard.state {
            guard.cursors.len()
        } else {
            self.emit(&QueueEvent::ClosedAccess);
            0
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    #[must_use]
    pub fn is_closed(&self) -> bool { !matches!(self.inner.read().state, State::Open(_)) }

    /// Releases the store. Only the first call has any effect; an error from
    /// the store is reported to the event sink and otherwise ignored.
    pub fn close(&self) {
        let mut guard = self.inner.write();
        if !matches!(guard.state, State::Open(_)) {
            return;
        }

        self.emit(&QueueEvent::Closing);
        if let State::Open(store) = mem::replace(&mut guard.state, State::Closed) {
            if let Err(e) = store.close() {
                self.emit(&QueueEvent::CloseFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Deletes the partition directory and everything in it.
    ///
    /// The queue must be [closed](Self::close) first, so no file is deleted
    /// while the store still holds it open. Dropping is single-shot.
    pub fn drop_storage(&self) -> Result<()> {
        let mut guard = self.inner.write();
        match guard.state {
            State::Open(_) => return NotClosedSnafu.fail(),
            State::Dropped => return DroppedSnafu.fail(),
            State::Closed => {}
        }

        self.emit(&QueueEvent::Dropping {
            dir: self.dir.clone(),
        });
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).context(RemoveDirSnafu {
                    path: self.dir.clone(),
                });
            }
        }

        guard.state = State::Dropped;
        Ok(())
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) { self.close(); }
}

/// Reads and decodes `[from, to)`, checking that every offset is present.
fn read_range(store: &dyn Store, from: u64, to: u64) -> Result<Vec<OperationInfo>> {
    let capacity = usize::try_from(to - from).unwrap_or(0);
    let mut ops = Vec::with_capacity(capacity);
    let mut expected = from;

    for item in store.range(&encode_offset(from), &encode_offset(to)) {
        let (key, value) = item.context(StoreSnafu)?;
        let offset = decode_offset(&key)?;
        ensure!(
            offset == expected,
            MissingRecordSnafu {
                expected,
                found: Some(offset),
            }
        );
        ops.push(decode_record(offset, &value)?);
        expected += 1;
    }

    ensure!(
        expected == to,
        MissingRecordSnafu {
            expected,
            found: None::<u64>,
        }
    );
    Ok(ops)
}
