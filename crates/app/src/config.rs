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

//! Application configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. the TOML file passed with `--config`, if any
//! 3. `OPQUEUE__`-prefixed environment variables, `__` separating levels,
//!    e.g. `OPQUEUE__QUEUE__BASE_DIR=/data/opqueue`
//!
//! ```toml
//! monitor_period_secs = 30
//!
//! [queue]
//! base_dir = "/var/lib/opqueue"
//! persist = "sync_all"
//!
//! [[channels]]
//! channel_id = "mychannel"
//!
//! [[channels.namespaces]]
//! namespace = "did:sidetree"
//! base_path = "/sidetree/0.0.1"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use opqueue_common_storage_queue::{FlushMode, QueueConfig};
use opqueue_common_telemetry::LoggingOptions;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, ensure};
use validator::{Validate, ValidationError};

use crate::error::{ConfigFileMissingSnafu, LoadConfigSnafu, Result, ValidateConfigSnafu};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "OPQUEUE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub queue: QueueSection,

    /// Channels joined at startup.
    #[validate(nested)]
    pub channels: Vec<ChannelConfig>,

    /// Period of the queue size monitor. 0 disables it.
    #[default = 0]
    pub monitor_period_secs: u64,

    pub logging: LoggingOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct QueueSection {
    /// Root directory; each partition lives in `<base_dir>/<channel>/<namespace>`.
    #[default(_code = "PathBuf::from(\"./opqueue_data\")")]
    #[validate(custom(function = "validate_base_dir"))]
    pub base_dir: PathBuf,

    pub persist: FlushMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChannelConfig {
    #[validate(length(min = 1, message = "channel_id is required"))]
    pub channel_id: String,

    #[serde(default)]
    #[validate(nested)]
    pub namespaces: Vec<NamespaceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NamespaceConfig {
    #[validate(length(min = 1, message = "namespace is required"))]
    pub namespace: String,

    /// REST base path the namespace is served under.
    #[validate(
        length(min = 1, message = "base_path is required"),
        custom(function = "validate_base_path")
    )]
    pub base_path: String,
}

fn validate_base_dir(dir: &Path) -> std::result::Result<(), ValidationError> {
    if dir.as_os_str().is_empty() {
        return Err(ValidationError::new("empty").with_message("base_dir is required".into()));
    }
    Ok(())
}

fn validate_base_path(path: &str) -> std::result::Result<(), ValidationError> {
    if !path.is_empty() && !path.starts_with('/') {
        return Err(ValidationError::new("leading_slash")
            .with_message("base_path must begin with '/'".into()));
    }
    Ok(())
}

impl AppConfig {
    /// Loads and validates the configuration.
    ///
    /// A `path` that is given but does not exist is an error rather than
    /// being silently skipped.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            ensure!(
                path.is_file(),
                ConfigFileMissingSnafu {
                    path: path.to_path_buf(),
                }
            );
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context(LoadConfigSnafu)?
            .try_deserialize()
            .context(LoadConfigSnafu)?;
        config.validate().context(ValidateConfigSnafu)?;
        Ok(config)
    }

    /// Settings for the queues this process opens.
    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            base_path:  self.queue.base_dir.clone(),
            flush_mode: self.queue.persist,
        }
    }

    /// `None` when the monitor is disabled.
    #[must_use]
    pub const fn monitor_period(&self) -> Option<Duration> {
        match self.monitor_period_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use test_case::test_case;

    use super::*;
    use crate::error::AppError;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.base_dir, PathBuf::from("./opqueue_data"));
        assert_eq!(config.queue.persist, FlushMode::SyncAll);
        assert!(config.monitor_period().is_none());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
monitor_period_secs = 15

[queue]
base_dir = "/data/opqueue"
persist = "buffer"

[[channels]]
channel_id = "mychannel"

[[channels.namespaces]]
namespace = "did:sidetree"
base_path = "/sidetree/0.0.1"
"#,
        );

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.queue.base_dir, PathBuf::from("/data/opqueue"));
        assert_eq!(config.queue.persist, FlushMode::Buffer);
        assert_eq!(config.monitor_period(), Some(Duration::from_secs(15)));
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].namespaces[0].namespace, "did:sidetree");

        let queue = config.queue_config();
        assert_eq!(queue.base_path, PathBuf::from("/data/opqueue"));
        assert_eq!(queue.flush_mode, FlushMode::Buffer);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/opqueue.toml"))).unwrap_err();
        assert!(matches!(err, AppError::ConfigFileMissing { .. }));
    }

    #[test_case("", "did:a", "/a" ; "missing channel id")]
    #[test_case("ch", "", "/a" ; "missing namespace")]
    #[test_case("ch", "did:a", "" ; "missing base path")]
    #[test_case("ch", "did:a", "a/b" ; "relative base path")]
    fn test_invalid_channel(channel_id: &str, namespace: &str, base_path: &str) {
        let config = AppConfig {
            channels: vec![ChannelConfig {
                channel_id: channel_id.to_string(),
                namespaces: vec![NamespaceConfig {
                    namespace: namespace.to_string(),
                    base_path: base_path.to_string(),
                }],
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let file = write_config(
            r#"
[[channels]]
channel_id = "ch"

[[channels.namespaces]]
namespace = "did:a"
base_path = "no-slash"
"#,
        );
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppError::ValidateConfig { .. }));
    }
}
