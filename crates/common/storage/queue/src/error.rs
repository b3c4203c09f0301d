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

use std::{io, path::PathBuf};

use snafu::Snafu;

use crate::store::StoreError;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueueError {
    /// Operation invoked after [`close`](crate::OperationQueue::close).
    #[snafu(display("queue is closed"))]
    Closed,

    /// [`drop_storage`](crate::OperationQueue::drop_storage) invoked on an
    /// open queue.
    #[snafu(display("queue must be closed before it can be dropped"))]
    NotClosed,

    /// The partition storage was already deleted.
    #[snafu(display("queue has already been dropped"))]
    Dropped,

    /// Channel or namespace cannot be mapped to a storage directory.
    #[snafu(display("invalid {field} {value:?}: {reason}"))]
    InvalidPartition {
        field:  &'static str,
        value:  String,
        reason: &'static str,
    },

    /// Underlying store failure, propagated verbatim.
    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },

    /// Operation could not be serialized. Nothing was written.
    #[snafu(display("unable to encode operation {unique_suffix}: {source}"))]
    Encode {
        unique_suffix: String,
        source:        bincode::error::EncodeError,
    },

    /// A persisted key is not a well-formed offset.
    #[snafu(display("corrupted key: expected {expected} bytes, got {len}"))]
    MalformedKey { expected: usize, len: usize },

    /// A persisted value could not be decoded into an operation.
    #[snafu(display("corrupted record at offset {offset}: {reason}"))]
    CorruptedRecord { offset: u64, reason: String },

    /// An offset inside `[head, tail)` has no persisted record.
    #[snafu(display("missing record at offset {expected} (next present: {found:?})"))]
    MissingRecord { expected: u64, found: Option<u64> },

    /// Deleting the removed range failed before the head was advanced.
    #[snafu(display("unable to delete operations in range [{from}:{to}): {source}"))]
    Delete {
        from:   u64,
        to:     u64,
        source: StoreError,
    },

    /// The tail reached the end of the offset space.
    #[snafu(display("offset space exhausted at tail {tail}"))]
    OffsetExhausted { tail: u64 },

    /// Removing the partition directory failed.
    #[snafu(display("unable to remove queue directory {}: {source}", path.display()))]
    RemoveDir { path: PathBuf, source: io::Error },
}

impl QueueError {
    /// Whether this error indicates corrupted persisted state rather than a
    /// transient or caller-side condition.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::MalformedKey { .. } | Self::CorruptedRecord { .. } | Self::MissingRecord { .. }
        )
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
