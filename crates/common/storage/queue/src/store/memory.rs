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

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use snafu::ensure;

use super::{KvPair, Result, Store, StoreIter, UnavailableSnafu};

#[derive(Default)]
struct Shared {
    entries:            Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_puts:          AtomicBool,
    fail_close:         AtomicBool,
    /// Number of deletes that still succeed before every further delete fails.
    deletes_until_fail: Mutex<Option<usize>>,
}

/// In-memory [`Store`].
///
/// Clones share the same entries, so a test can keep a handle, hand a clone to
/// a queue, and later reopen another queue over the surviving contents. Also
/// supports injecting put and delete failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Makes every subsequent `put` fail (or succeed again).
    pub fn fail_puts(&self, fail: bool) { self.shared.fail_puts.store(fail, Ordering::SeqCst); }

    /// Makes `close` fail (or succeed again).
    pub fn fail_close(&self, fail: bool) { self.shared.fail_close.store(fail, Ordering::SeqCst); }

    /// Lets `count` more deletes succeed, then fails every delete after them.
    /// `None` clears the injection.
    pub fn fail_deletes_after(&self, count: Option<usize>) {
        *self.shared.deletes_until_fail.lock() = count;
    }

    /// Writes a raw entry, bypassing the queue.
    pub fn insert_raw(&self, key: &[u8], value: &[u8]) {
        self.shared
            .entries
            .lock()
            .insert(key.to_vec(), value.to_vec());
    }

    /// Snapshot of all keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> { self.shared.entries.lock().keys().cloned().collect() }

    #[must_use]
    pub fn len(&self) -> usize { self.shared.entries.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Store for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(
            !self.shared.fail_puts.load(Ordering::SeqCst),
            UnavailableSnafu {
                message: "injected put failure",
            }
        );
        self.insert_raw(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        {
            let mut remaining = self.shared.deletes_until_fail.lock();
            if let Some(count) = remaining.as_mut() {
                ensure!(
                    *count > 0,
                    UnavailableSnafu {
                        message: "injected delete failure",
                    }
                );
                *count -= 1;
            }
        }
        self.shared.entries.lock().remove(key);
        Ok(())
    }

    fn range<'a>(&'a self, start: &[u8], limit: &[u8]) -> StoreIter<'a> {
        let snapshot: Vec<KvPair> = self
            .shared
            .entries
            .lock()
            .range(start.to_vec()..limit.to_vec())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Box::new(snapshot.into_iter().map(Ok))
    }

    fn first_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.shared.entries.lock().keys().next().cloned())
    }

    fn last_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.shared.entries.lock().keys().next_back().cloned())
    }

    fn close(self: Box<Self>) -> Result<()> {
        ensure!(
            !self.shared.fail_close.load(Ordering::SeqCst),
            UnavailableSnafu {
                message: "injected close failure",
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.put(b"a", b"1").unwrap();
        assert_eq!(store.keys(), vec![b"a".to_vec()]);
    }

    #[test]
    fn test_range_is_half_open() {
        let store = MemoryStore::new();
        for key in [b"a", b"b", b"c"] {
            store.put(key, b"v").unwrap();
        }
        let keys: Vec<_> = store.range(b"a", b"c").map(|kv| kv.unwrap().0).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new();
        store.fail_puts(true);
        assert!(store.put(b"a", b"1").is_err());
        store.fail_puts(false);
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();

        store.fail_deletes_after(Some(1));
        let err = store
            .delete_batch(&[b"a".to_vec(), b"b".to_vec()])
            .unwrap_err();
        assert!(err.to_string().contains("injected delete failure"));
        assert_eq!(store.keys(), vec![b"b".to_vec()]);
    }
}
