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
    fs::{File, OpenOptions},
    io,
    path::Path,
};

use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use fs2::FileExt;
use snafu::ResultExt;
use tracing::debug;

use super::{
    CreateDirSnafu, FjallSnafu, LockFileSnafu, LockedSnafu, Result, Store, StoreError, StoreIter,
};
use crate::FlushMode;

/// Name of the single fjall partition holding the queue entries.
const OPERATIONS_PARTITION: &str = "operations";

/// Lock file taken exclusively for as long as the store is open.
const LOCK_FILE: &str = "LOCK";

/// [`Store`] backed by a fjall keyspace in its own directory.
///
/// Every mutation is followed by a journal persist at the configured
/// [`FlushMode`], so an acknowledged `put` survives a restart.
///
/// Only one `FjallStore` can hold a directory at a time. Two handles would
/// each recover their own tail and overwrite each other's records.
pub struct FjallStore {
    keyspace:     Keyspace,
    partition:    PartitionHandle,
    persist_mode: PersistMode,
    /// Released last, after the keyspace.
    lock:         File,
}

impl FjallStore {
    /// Opens or creates the keyspace at `dir`.
    ///
    /// Fails with [`StoreError::Locked`] while another handle has `dir` open.
    pub fn open(dir: &Path, flush_mode: FlushMode) -> Result<Self> {
        std::fs::create_dir_all(dir).context(CreateDirSnafu {
            path: dir.to_path_buf(),
        })?;
        let lock = lock_dir(dir)?;

        let keyspace = fjall::Config::new(dir).open().context(FjallSnafu)?;
        let partition = keyspace
            .open_partition(OPERATIONS_PARTITION, PartitionCreateOptions::default())
            .context(FjallSnafu)?;

        debug!(path = ?dir, ?flush_mode, "Opened fjall store");

        Ok(Self {
            keyspace,
            partition,
            persist_mode: flush_mode.into(),
            lock,
        })
    }

    fn persist(&self) -> Result<()> { self.keyspace.persist(self.persist_mode).context(FjallSnafu) }
}

impl Store for FjallStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.partition.insert(key, value).context(FjallSnafu)?;
        self.persist()
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.partition.remove(key).context(FjallSnafu)?;
        self.persist()
    }

    fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for key in keys {
            batch.remove(&self.partition, key.as_slice());
        }
        batch.commit().context(FjallSnafu)?;
        self.persist()
    }

    fn range<'a>(&'a self, start: &[u8], limit: &[u8]) -> StoreIter<'a> {
        Box::new(
            self.partition
                .range(start.to_vec()..limit.to_vec())
                .map(|item| {
                    item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                        .context(FjallSnafu)
                }),
        )
    }

    fn first_key(&self) -> Result<Option<Vec<u8>>> {
        let first = self.partition.first_key_value().context(FjallSnafu)?;
        Ok(first.map(|(key, _)| key.to_vec()))
    }

    fn last_key(&self) -> Result<Option<Vec<u8>>> {
        let last = self.partition.last_key_value().context(FjallSnafu)?;
        Ok(last.map(|(key, _)| key.to_vec()))
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll).context(FjallSnafu)?;
        let Self {
            keyspace,
            partition,
            lock,
            ..
        } = *self;
        drop(partition);
        drop(keyspace);
        drop(lock);
        Ok(())
    }
}

fn lock_dir(dir: &Path) -> Result<File> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&path)
        .context(LockFileSnafu { path: path.clone() })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if is_contended(&e) => LockedSnafu { path: dir.to_path_buf() }.fail(),
        Err(source) => Err(StoreError::LockFile { path, source }),
    }
}

fn is_contended(err: &io::Error) -> bool {
    let contended = fs2::lock_contended_error().raw_os_error();
    err.kind() == io::ErrorKind::WouldBlock
        || (contended.is_some() && err.raw_os_error() == contended)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open(dir: &Path) -> Box<dyn Store> { Box::new(FjallStore::open(dir, FlushMode::Buffer).unwrap()) }

    #[test]
    fn test_put_range_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(temp_dir.path());

        for i in 0u64..5 {
            store.put(&i.to_be_bytes(), format!("v{i}").as_bytes()).unwrap();
        }

        let pairs: Vec<_> = store
            .range(&1u64.to_be_bytes(), &4u64.to_be_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (1u64.to_be_bytes().to_vec(), b"v1".to_vec()));
        assert_eq!(pairs[2], (3u64.to_be_bytes().to_vec(), b"v3".to_vec()));

        store
            .delete_batch(&[0u64.to_be_bytes().to_vec(), 1u64.to_be_bytes().to_vec()])
            .unwrap();
        store.delete(&9u64.to_be_bytes()).unwrap();

        assert_eq!(store.first_key().unwrap(), Some(2u64.to_be_bytes().to_vec()));
        assert_eq!(store.last_key().unwrap(), Some(4u64.to_be_bytes().to_vec()));
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open(temp_dir.path());
            store.put(&7u64.to_be_bytes(), b"seven").unwrap();
            store.close().unwrap();
        }

        let store = open(temp_dir.path());
        assert_eq!(store.first_key().unwrap(), Some(7u64.to_be_bytes().to_vec()));
        assert_eq!(store.last_key().unwrap(), Some(7u64.to_be_bytes().to_vec()));
        store.close().unwrap();
    }

    #[test]
    fn test_second_open_is_locked_until_close() {
        let temp_dir = TempDir::new().unwrap();
        let first = open(temp_dir.path());

        let second = FjallStore::open(temp_dir.path(), FlushMode::Buffer);
        assert!(matches!(second, Err(StoreError::Locked { .. })));

        first.close().unwrap();
        let reopened = open(temp_dir.path());
        reopened.close().unwrap();
    }

    #[test]
    fn test_empty_store_has_no_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(temp_dir.path());
        assert_eq!(store.first_key().unwrap(), None);
        assert_eq!(store.last_key().unwrap(), None);
        assert_eq!(store.range(&[0u8; 8], &[0xFFu8; 8]).count(), 0);
        store.close().unwrap();
    }
}
