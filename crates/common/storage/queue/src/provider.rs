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

//! Process-wide registry of open queues.
//!
//! A peer joins a channel by creating one queue per namespace it serves, and
//! releases (or drops) them when it leaves. The provider guarantees there is
//! at most one [`OperationQueue`] per partition in the process, since two
//! queues over the same directory would hand out the same offsets.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

use crate::{
    OperationQueue, PartitionKey, QueueBuilder, QueueConfig, Result,
    events::{EventSink, TracingSink},
};

pub struct QueueProvider {
    config:  QueueConfig,
    sink:    Arc<dyn EventSink>,
    queues:  Mutex<HashMap<PartitionKey, Arc<OperationQueue>>>,
    /// Serializes store opens and closes. Held across disk I/O, so `queues`
    /// is only ever locked briefly.
    opening: Mutex<()>,
}

impl QueueProvider {
    #[must_use]
    pub fn new(config: QueueConfig) -> Self { Self::with_sink(config, Arc::new(TracingSink)) }

    /// Every queue opened by this provider reports to `sink`.
    #[must_use]
    pub fn with_sink(config: QueueConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            queues: Mutex::new(HashMap::new()),
            opening: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig { &self.config }

    /// Returns the open queue for the partition, opening it on first use.
    pub fn create(&self, channel_id: &str, namespace: &str) -> Result<Arc<OperationQueue>> {
        let key = PartitionKey::new(channel_id, namespace)?;
        if let Some(queue) = self.queues.lock().get(&key) {
            return Ok(queue.clone());
        }

        let _opening = self.opening.lock();
        // Another caller may have opened it while we waited.
        if let Some(queue) = self.queues.lock().get(&key) {
            return Ok(queue.clone());
        }
        let queue = Arc::new(self.open_queue(key.clone())?);
        Ok(self.queues.lock().entry(key).or_insert(queue).clone())
    }

    #[must_use]
    pub fn get(&self, channel_id: &str, namespace: &str) -> Option<Arc<OperationQueue>> {
        let key = PartitionKey::new(channel_id, namespace).ok()?;
        self.queues.lock().get(&key).cloned()
    }

    /// Closes and forgets the partition. Returns whether it was open.
    ///
    /// Clones of the queue held elsewhere see it as closed afterwards.
    pub fn release(&self, channel_id: &str, namespace: &str) -> Result<bool> {
        let key = PartitionKey::new(channel_id, namespace)?;
        let _opening = self.opening.lock();
        let removed = self.queues.lock().remove(&key);
        Ok(removed.is_some_and(|queue| {
            queue.close();
            true
        }))
    }

    /// Closes the partition and deletes its storage.
    ///
    /// A partition that is not open here is opened first, so its directory is
    /// removed the same way.
    pub fn drop_partition(&self, channel_id: &str, namespace: &str) -> Result<()> {
        let key = PartitionKey::new(channel_id, namespace)?;
        let _opening = self.opening.lock();
        let removed = self.queues.lock().remove(&key);
        let queue = match removed {
            Some(queue) => queue,
            None => Arc::new(self.open_queue(key)?),
        };
        queue.close();
        queue.drop_storage()
    }

    fn open_queue(&self, key: PartitionKey) -> Result<OperationQueue> {
        QueueBuilder::with_config(self.config.clone(), key)
            .event_sink(self.sink.clone())
            .open()
    }

    /// Open partitions in key order.
    #[must_use]
    pub fn partitions(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<_> = self.queues.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Closes every open queue and empties the registry.
    pub fn close_all(&self) {
        let _opening = self.opening.lock();
        let queues: Vec<_> = self.queues.lock().drain().collect();
        info!(count = queues.len(), "Closing all operation queues");
        for (_, queue) in queues {
            queue.close();
        }
    }
}

impl Drop for QueueProvider {
    fn drop(&mut self) { self.close_all(); }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{OperationInfo, QueueError};

    fn provider(dir: &TempDir) -> QueueProvider {
        QueueProvider::new(QueueConfig {
            base_path: dir.path().to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn test_create_returns_shared_queue() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);

        let first = provider.create("ch", "ns").unwrap();
        let second = provider.create("ch", "ns").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(temp_dir.path().join("ch").join("ns").is_dir());

        first
            .add(&OperationInfo::new("a", "ns", b"x".to_vec()))
            .unwrap();
        assert_eq!(provider.get("ch", "ns").unwrap().len(), 1);
        assert!(provider.get("ch", "other").is_none());
    }

    #[test]
    fn test_release_closes_queue() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);
        let queue = provider.create("ch", "ns").unwrap();

        assert!(provider.release("ch", "ns").unwrap());
        assert!(!provider.release("ch", "ns").unwrap());
        assert!(queue.is_closed());
        assert!(provider.partitions().is_empty());

        // Storage survives a release.
        let reopened = provider.create("ch", "ns").unwrap();
        assert!(!reopened.is_closed());
    }

    #[test]
    fn test_drop_partition_removes_storage() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);
        let queue = provider.create("ch", "ns").unwrap();
        queue
            .add(&OperationInfo::new("a", "ns", b"x".to_vec()))
            .unwrap();

        provider.drop_partition("ch", "ns").unwrap();
        assert!(!temp_dir.path().join("ch").join("ns").exists());
        assert!(matches!(queue.drop_storage(), Err(QueueError::Dropped)));

        // Dropping a partition that is not open still removes its directory.
        provider.create("ch", "other").unwrap();
        provider.release("ch", "other").unwrap();
        provider.drop_partition("ch", "other").unwrap();
        assert!(!temp_dir.path().join("ch").join("other").exists());
    }

    #[test]
    fn test_partitions_and_close_all() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);
        let b = provider.create("ch2", "ns").unwrap();
        let a = provider.create("ch1", "ns").unwrap();

        let names: Vec<_> = provider
            .partitions()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["ch1-ns", "ch2-ns"]);

        provider.close_all();
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(provider.partitions().is_empty());
    }

    #[test]
    fn test_lookups_not_blocked_by_pending_open() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);
        provider.create("ch", "ns").unwrap();

        // Stands in for a create that is busy opening its store.
        let _opening = provider.opening.lock();
        assert!(provider.get("ch", "ns").is_some());
        assert_eq!(provider.partitions().len(), 1);
        // Already-open partitions are served without waiting.
        assert!(provider.create("ch", "ns").is_ok());
    }

    #[test]
    fn test_concurrent_create_shares_one_queue() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);

        let queues: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| provider.create("ch", "ns").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(queues.iter().all(|q| Arc::ptr_eq(q, &queues[0])));
        assert_eq!(provider.partitions().len(), 1);
    }

    #[test]
    fn test_invalid_partition_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let provider = provider(&temp_dir);
        assert!(matches!(
            provider.create("ch", "../escape"),
            Err(QueueError::InvalidPartition { .. })
        ));
        assert!(provider.get("", "ns").is_none());
    }
}
