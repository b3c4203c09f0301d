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

use std::path::{Path, PathBuf};

use snafu::ensure;

use crate::{Result, error::InvalidPartitionSnafu};

/// Identifies one queue partition: a namespace within a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("{channel_id}-{namespace}")]
pub struct PartitionKey {
    channel_id: String,
    namespace:  String,
}

impl PartitionKey {
    /// Validates both components as single path segments.
    pub fn new(channel_id: impl Into<String>, namespace: impl Into<String>) -> Result<Self> {
        let channel_id = channel_id.into();
        let namespace = namespace.into();
        validate_segment("channel id", &channel_id)?;
        validate_segment("namespace", &namespace)?;
        Ok(Self {
            channel_id,
            namespace,
        })
    }

    #[must_use]
    pub fn channel_id(&self) -> &str { &self.channel_id }

    #[must_use]
    pub fn namespace(&self) -> &str { &self.namespace }
}

fn validate_segment(field: &'static str, value: &str) -> Result<()> {
    let fail = |reason| InvalidPartitionSnafu {
        field,
        value: value.to_string(),
        reason,
    };
    ensure!(!value.is_empty(), fail("must not be empty"));
    ensure!(
        value != "." && value != "..",
        fail("must not be a relative path component")
    );
    ensure!(
        !value.contains(['/', '\\', '\0']),
        fail("must not contain path separators")
    );
    Ok(())
}

/// Storage directory of a partition: `base/<channel>/<namespace>`.
pub fn partition_dir<P: AsRef<Path>>(base: P, key: &PartitionKey) -> PathBuf {
    base.as_ref().join(&key.channel_id).join(&key.namespace)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    #[test]
    fn test_partition_dir() {
        let key = PartitionKey::new("mychannel", "did:sidetree").unwrap();
        assert_eq!(
            partition_dir("/var/opqueue", &key),
            PathBuf::from("/var/opqueue/mychannel/did:sidetree")
        );
    }

    #[test]
    fn test_display() {
        let key = PartitionKey::new("ch1", "ns1").unwrap();
        assert_eq!(key.to_string(), "ch1-ns1");
        assert_eq!(key.channel_id(), "ch1");
        assert_eq!(key.namespace(), "ns1");
    }

    #[test_case("", "ns" ; "empty channel")]
    #[test_case("ch", "" ; "empty namespace")]
    #[test_case("..", "ns" ; "parent channel")]
    #[test_case("ch", "a/b" ; "separator in namespace")]
    #[test_case("c\\h", "ns" ; "backslash in channel")]
    fn test_invalid_partition(channel: &str, namespace: &str) {
        let err = PartitionKey::new(channel, namespace).unwrap_err();
        assert!(matches!(err, QueueError::InvalidPartition { .. }));
    }
}
