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

pub mod config;
pub mod error;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use opqueue_common_storage_queue::{Cursors, OperationQueue, PartitionKey, QueueProvider};
use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt};
use tracing::{info, warn};

pub use crate::{
    config::AppConfig,
    error::{AppError, Result},
};
use crate::error::{OpenQueueSnafu, SpawnMonitorSnafu, UnknownChannelSnafu};

/// Owns the queues of every joined channel and the optional size monitor.
pub struct App {
    config:   AppConfig,
    provider: Arc<QueueProvider>,
    running:  Arc<AtomicBool>,
    monitor:  Mutex<Option<MonitorHandle>>,
}

struct MonitorHandle {
    stop_tx: mpsc::Sender<()>,
    handle:  JoinHandle<()>,
}

/// Size of one open partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatus {
    pub partition: PartitionKey,
    pub len:       u64,
    pub cursors:   Cursors,
}

impl AppConfig {
    #[must_use]
    pub fn open(self) -> App {
        let provider = Arc::new(QueueProvider::new(self.queue_config()));
        App {
            config: self,
            provider,
            running: Arc::new(AtomicBool::new(false)),
            monitor: Mutex::new(None),
        }
    }
}

impl App {
    #[must_use]
    pub const fn config(&self) -> &AppConfig { &self.config }

    #[must_use]
    pub const fn provider(&self) -> &Arc<QueueProvider> { &self.provider }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Joins every configured channel and starts the monitor.
    pub fn start(&self) -> Result<()> {
        info!(
            base_dir = ?self.config.queue.base_dir,
            channels = self.config.channels.len(),
            "Starting opqueue"
        );

        for channel in &self.config.channels {
            self.join(&channel.channel_id)?;
        }

        match self.config.monitor_period() {
            Some(period) => self.start_monitor(period)?,
            None => info!("Queue monitor disabled"),
        }

        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Opens one queue per namespace of a configured channel.
    pub fn join(&self, channel_id: &str) -> Result<Vec<Arc<OperationQueue>>> {
        let channel = self
            .config
            .channels
            .iter()
            .find(|c| c.channel_id == channel_id)
            .context(UnknownChannelSnafu { channel_id })?;

        let queues = channel
            .namespaces
            .iter()
            .map(|ns| {
                self.provider
                    .create(&channel.channel_id, &ns.namespace)
                    .context(OpenQueueSnafu {
                        channel_id: channel.channel_id.clone(),
                        namespace:  ns.namespace.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(channel = channel_id, queues = queues.len(), "Joined channel");
        Ok(queues)
    }

    /// Closes the queues of a channel, keeping their storage. Returns how
    /// many were closed.
    pub fn leave(&self, channel_id: &str) -> usize {
        let mut released = 0;
        for key in self.provider.partitions() {
            if key.channel_id() != channel_id {
                continue;
            }
            match self.provider.release(key.channel_id(), key.namespace()) {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => warn!(partition = %key, error = %e, "Unable to release queue"),
            }
        }
        info!(channel = channel_id, released, "Left channel");
        released
    }

    #[must_use]
    pub fn queue(&self, channel_id: &str, namespace: &str) -> Option<Arc<OperationQueue>> {
        self.provider.get(channel_id, namespace)
    }

    /// Sizes of all open partitions in key order.
    #[must_use]
    pub fn status(&self) -> Vec<PartitionStatus> { partition_status(&self.provider) }

    /// Stops the monitor and closes every queue.
    pub fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().take() {
            let _ = monitor.stop_tx.send(());
            if monitor.handle.join().is_err() {
                warn!("Queue monitor panicked");
            }
        }
        self.provider.close_all();
        if self.running.swap(false, Ordering::SeqCst) {
            info!("opqueue shutdown complete");
        }
    }

    fn start_monitor(&self, period: Duration) -> Result<()> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let provider = Arc::clone(&self.provider);

        let handle = thread::Builder::new()
            .name("opqueue-monitor".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            for status in partition_status(&provider) {
                                info!(
                                    channel = status.partition.channel_id(),
                                    namespace = status.partition.namespace(),
                                    len = status.len,
                                    head = status.cursors.head,
                                    tail = status.cursors.tail,
                                    "Queue status"
                                );
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context(SpawnMonitorSnafu)?;

        info!(period_secs = period.as_secs(), "Queue monitor started");
        *self.monitor.lock() = Some(MonitorHandle { stop_tx, handle });
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) { self.shutdown(); }
}

fn partition_status(provider: &QueueProvider) -> Vec<PartitionStatus> {
    provider
        .partitions()
        .into_iter()
        .filter_map(|key| {
            let queue = provider.get(key.channel_id(), key.namespace())?;
            Some(PartitionStatus {
                len:       queue.len(),
                cursors:   queue.cursors(),
                partition: key,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use opqueue_common_storage_queue::OperationInfo;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{ChannelConfig, NamespaceConfig, QueueSection};

    fn app_config(dir: &TempDir, monitor_period_secs: u64) -> AppConfig {
        let namespace = |name: &str| NamespaceConfig {
            namespace: name.to_string(),
            base_path: format!("/{name}"),
        };
        AppConfig {
            queue: QueueSection {
                base_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
            channels: vec![
                ChannelConfig {
                    channel_id: "ch1".to_string(),
                    namespaces: vec![namespace("did:a"), namespace("did:b")],
                },
                ChannelConfig {
                    channel_id: "ch2".to_string(),
                    namespaces: vec![namespace("did:a")],
                },
            ],
            monitor_period_secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_joins_configured_channels() {
        let temp_dir = TempDir::new().unwrap();
        let app = app_config(&temp_dir, 0).open();
        assert!(!app.is_running());

        app.start().unwrap();
        assert!(app.is_running());
        assert_eq!(app.provider().partitions().len(), 3);
        assert!(temp_dir.path().join("ch1").join("did:b").is_dir());

        let queue = app.queue("ch1", "did:a").unwrap();
        queue.add(&OperationInfo::new("x", "did:a", b"1".to_vec())).unwrap();
        let status = app.status();
        assert_eq!(status[0].partition.to_string(), "ch1-did:a");
        assert_eq!(status[0].len, 1);

        app.shutdown();
        assert!(!app.is_running());
        assert!(queue.is_closed());
    }

    #[test]
    fn test_leave_closes_only_that_channel() {
        let temp_dir = TempDir::new().unwrap();
        let app = app_config(&temp_dir, 0).open();
        app.start().unwrap();

        let kept = app.queue("ch2", "did:a").unwrap();
        assert_eq!(app.leave("ch1"), 2);
        assert!(app.queue("ch1", "did:a").is_none());
        assert!(!kept.is_closed());

        // Rejoining reopens the surviving storage.
        assert_eq!(app.join("ch1").unwrap().len(), 2);
    }

    #[test]
    fn test_join_unknown_channel() {
        let temp_dir = TempDir::new().unwrap();
        let app = app_config(&temp_dir, 0).open();
        assert!(matches!(
            app.join("missing"),
            Err(AppError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn test_monitor_stops_on_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let app = app_config(&temp_dir, 1).open();
        app.start().unwrap();
        assert!(app.monitor.lock().is_some());

        app.shutdown();
        assert!(app.monitor.lock().is_none());
        assert!(app.provider().partitions().is_empty());
    }
}
