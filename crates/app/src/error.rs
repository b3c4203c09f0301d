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

use opqueue_common_storage_queue::QueueError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("config file {} does not exist", path.display()))]
    ConfigFileMissing { path: PathBuf },

    #[snafu(display("unable to load configuration: {source}"))]
    LoadConfig { source: ::config::ConfigError },

    #[snafu(display("invalid configuration: {source}"))]
    ValidateConfig { source: validator::ValidationErrors },

    #[snafu(display("unable to open queue {channel_id}/{namespace}: {source}"))]
    OpenQueue {
        channel_id: String,
        namespace:  String,
        source:     QueueError,
    },

    #[snafu(display("channel {channel_id} is not configured"))]
    UnknownChannel { channel_id: String },

    #[snafu(display("unable to start queue monitor: {source}"))]
    SpawnMonitor { source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, AppError>;
