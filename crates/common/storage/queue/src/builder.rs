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

use std::{path::PathBuf, sync::Arc};

use snafu::ResultExt;

use crate::{
    FlushMode, OperationQueue, PartitionKey, QueueConfig, Result,
    error::StoreSnafu,
    events::{EventSink, QueueEvent, TracingSink},
    path::partition_dir,
    recovery::recover,
    store::{FjallStore, Store},
};

pub struct QueueBuilder {
    config:    QueueConfig,
    partition: PartitionKey,
    sink:      Arc<dyn EventSink>,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(base_path: P, partition: PartitionKey) -> Self {
        Self {
            config: QueueConfig {
                base_path: base_path.into(),
                ..Default::default()
            },
            partition,
            sink: Arc::new(TracingSink),
        }
    }

    /// Starts from an existing configuration.
    pub fn with_config(config: QueueConfig, partition: PartitionKey) -> Self {
        Self {
            config,
            partition,
            sink: Arc::new(TracingSink),
        }
    }

    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Storage directory the queue will use.
    #[must_use]
    pub fn dir(&self) -> PathBuf { partition_dir(&self.config.base_path, &self.partition) }

    /// Opens (or creates) the fjall store for the partition and recovers it.
    ///
    /// A store that fails to open is reported as is and no queue is built.
    pub fn open(self) -> Result<OperationQueue> {
        let dir = self.dir();
        let store = FjallStore::open(&dir, self.config.flush_mode).context(StoreSnafu)?;
        self.build(dir, Box::new(store))
    }

    /// Recovers a queue over a caller-supplied store. The partition directory
    /// is only used by [`OperationQueue::drop_storage`].
    pub fn open_with_store(self, store: Box<dyn Store>) -> Result<OperationQueue> {
        let dir = self.dir();
        self.build(dir, store)
    }

    fn build(self, dir: PathBuf, store: Box<dyn Store>) -> Result<OperationQueue> {
        let cursors = match recover(&*store) {
            Ok(cursors) => cursors,
            Err(e) => {
                // The store is useless without cursors; release it before failing.
                if let Err(close_err) = store.close() {
                    self.sink.emit(
                        &self.partition,
                        &QueueEvent::CloseFailed {
                            reason: close_err.to_string(),
                        },
                    );
                }
                return Err(e);
            }
        };
        Ok(OperationQueue::from_parts(
            self.partition,
            dir,
            store,
            cursors,
            self.sink,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordingSink, store::MemoryStore};

    fn key() -> PartitionKey { PartitionKey::new("ch", "ns").unwrap() }

    #[test]
    fn test_builder_default_config() {
        let builder = QueueBuilder::new("/tmp/test_queue", key());
        assert_eq!(builder.config.base_path, PathBuf::from("/tmp/test_queue"));
        assert_eq!(builder.config.flush_mode, FlushMode::SyncAll);
        assert_eq!(builder.dir(), PathBuf::from("/tmp/test_queue/ch/ns"));
    }

    #[test]
    fn test_builder_custom_config() {
        let builder = QueueBuilder::new("/tmp/test_queue", key()).flush_mode(FlushMode::Buffer);
        assert_eq!(builder.config.flush_mode, FlushMode::Buffer);

        let config = QueueConfig {
            base_path:  PathBuf::from("/data"),
            flush_mode: FlushMode::SyncData,
        };
        let builder = QueueBuilder::with_config(config.clone(), key());
        assert_eq!(builder.config, config);
    }

    #[test]
    fn test_recovery_failure_reports_close_error() {
        let store = MemoryStore::new();
        store.insert_raw(b"not-an-offset", b"v");
        store.fail_close(true);
        let sink = Arc::new(RecordingSink::new());

        let result = QueueBuilder::new("/nonexistent/opqueue", key())
            .event_sink(sink.clone())
            .open_with_store(Box::new(store));

        assert!(result.err().unwrap().is_corruption());
        assert!(matches!(
            sink.events().as_slice(),
            [QueueEvent::CloseFailed { reason }] if reason.contains("injected close failure")
        ));
    }

    #[test]
    fn test_open_failure_is_returned() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("ch");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = QueueBuilder::new(temp_dir.path(), key()).open();
        assert!(matches!(result, Err(crate::QueueError::Store { .. })));
    }
}
