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

//! Cursor recovery for a reopened partition.
//!
//! No cursor metadata is persisted. The persisted key range is always
//! `[head, tail)`, so the cursors are rebuilt from the store alone:
//! 1. `head` is the first key, or 0 for an empty store
//! 2. `tail` is the last key plus one, or 0 for an empty store
//!
//! Because `head` comes from whatever key is actually first, a crash in the
//! middle of deleting a removed range heals on the next open.

use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::{
    Result,
    codec::decode_offset,
    error::{OffsetExhaustedSnafu, StoreSnafu},
    store::Store,
};

/// Head and tail recovered from persisted keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    /// Offset of the oldest record present.
    pub head: u64,
    /// Offset the next added record will receive.
    pub tail: u64,
}

impl Cursors {
    #[must_use]
    pub const fn len(&self) -> u64 { self.tail - self.head }

    #[must_use]
    pub const fn is_empty(&self) -> bool { self.head == self.tail }
}

/// Rebuilds the cursors from the first and last key in `store`.
pub fn recover(store: &dyn Store) -> Result<Cursors> {
    let head = match store.first_key().context(StoreSnafu)? {
        Some(key) => decode_offset(&key)?,
        None => 0,
    };

    let tail = match store.last_key().context(StoreSnafu)? {
        Some(key) => {
            let last = decode_offset(&key)?;
            last.checked_add(1)
                .context(OffsetExhaustedSnafu { tail: last })?
        }
        None => 0,
    };

    debug!(head, tail, "Recovered queue cursors");
    Ok(Cursors { head, tail })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        QueueError,
        codec::encode_offset,
        store::MemoryStore,
    };

    #[test]
    fn test_recover_empty_store() {
        let store = MemoryStore::new();
        let cursors = recover(&store).unwrap();
        assert_eq!(cursors, Cursors { head: 0, tail: 0 });
        assert!(cursors.is_empty());
    }

    #[test]
    fn test_recover_partially_drained_store() {
        let store = MemoryStore::new();
        for offset in 3..8 {
            store.insert_raw(&encode_offset(offset), b"v");
        }

        let cursors = recover(&store).unwrap();
        assert_eq!(cursors, Cursors { head: 3, tail: 8 });
        assert_eq!(cursors.len(), 5);
    }

    #[test]
    fn test_recover_single_entry() {
        let store = MemoryStore::new();
        store.insert_raw(&encode_offset(41), b"v");
        assert_eq!(recover(&store).unwrap(), Cursors { head: 41, tail: 42 });
    }

    #[test]
    fn test_recover_rejects_foreign_key() {
        let store = MemoryStore::new();
        store.insert_raw(b"not-an-offset", b"v");
        assert!(recover(&store).unwrap_err().is_corruption());
    }

    #[test]
    fn test_recover_last_offset_exhausted() {
        let store = MemoryStore::new();
        store.insert_raw(&encode_offset(u64::MAX), b"v");
        let err = recover(&store).unwrap_err();
        assert!(matches!(err, QueueError::OffsetExhausted { tail: u64::MAX }));
    }
}
