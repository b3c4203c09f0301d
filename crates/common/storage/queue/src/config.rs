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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Root under which every partition gets `<channel>/<namespace>`.
    pub base_path:  PathBuf,
    pub flush_mode: FlushMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_path:  PathBuf::from("./opqueue_data"),
            flush_mode: FlushMode::SyncAll,
        }
    }
}

/// How far each write is pushed towards stable storage before the call
/// returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Hand the write to the OS. Survives a process crash, not a power loss.
    Buffer,
    /// fdatasync the journal.
    SyncData,
    /// fsync the journal and its metadata.
    #[default]
    SyncAll,
}

impl From<FlushMode> for fjall::PersistMode {
    fn from(mode: FlushMode) -> Self {
        match mode {
            FlushMode::Buffer => Self::Buffer,
            FlushMode::SyncData => Self::SyncData,
            FlushMode::SyncAll => Self::SyncAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flush_mode_is_durable() {
        let config = QueueConfig::default();
        assert_eq!(config.flush_mode, FlushMode::SyncAll);
        assert!(matches!(
            fjall::PersistMode::from(config.flush_mode),
            fjall::PersistMode::SyncAll
        ));
    }

    #[test]
    fn test_flush_mode_maps_to_persist_mode() {
        assert!(matches!(
            fjall::PersistMode::from(FlushMode::Buffer),
            fjall::PersistMode::Buffer
        ));
        assert!(matches!(
            fjall::PersistMode::from(FlushMode::SyncData),
            fjall::PersistMode::SyncData
        ));
    }
}
