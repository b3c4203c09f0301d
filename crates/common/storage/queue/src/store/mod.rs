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

//! Minimal contract the queue engine needs from an ordered key-value store.
//!
//! - [`FjallStore`]: on-disk LSM store, the default backend
//! - [`MemoryStore`]: in-process `BTreeMap`, for tests and ephemeral queues

mod lsm;
mod memory;

use std::{io, path::PathBuf};

use snafu::Snafu;

pub use self::{lsm::FjallStore, memory::MemoryStore};

/// Store backend errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("unable to create store directory {}: {source}", path.display()))]
    CreateDir { path: PathBuf, source: io::Error },

    #[snafu(display("unable to open lock file {}: {source}", path.display()))]
    LockFile { path: PathBuf, source: io::Error },

    /// Another handle, in this or another process, holds the store open.
    #[snafu(display("store at {} is locked by another handle", path.display()))]
    Locked { path: PathBuf },

    #[snafu(display("fjall error: {source}"))]
    Fjall { source: ::fjall::Error },

    #[snafu(display("store unavailable: {message}"))]
    Unavailable { message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// An owned key/value pair.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ascending iterator over a snapshot of a key range.
pub type StoreIter<'a> = Box<dyn Iterator<Item = Result<KvPair>> + 'a>;

/// Ordered key-value store holding one queue partition.
///
/// Implementations must order keys lexicographically by bytes. The engine
/// serializes every call under its own lock, so implementations only need to
/// be safe to share, not to coordinate concurrent writers.
pub trait Store: Send + Sync {
    /// Durable upsert.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Durable removal. Removing an absent key succeeds.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Removes every key in `keys`.
    ///
    /// The default deletes one key at a time and stops at the first failure,
    /// leaving earlier keys deleted. Backends with atomic write batches
    /// override this so the whole set commits or none of it does.
    fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Iterates `[start, limit)` in ascending key order over a stable view
    /// taken when the call is made.
    fn range<'a>(&'a self, start: &[u8], limit: &[u8]) -> StoreIter<'a>;

    /// Smallest key present.
    fn first_key(&self) -> Result<Option<Vec<u8>>>;

    /// Largest key present.
    fn last_key(&self) -> Result<Option<Vec<u8>>>;

    /// Releases the backend. Consumes the store so it runs at most once.
    fn close(self: Box<Self>) -> Result<()>;
}
