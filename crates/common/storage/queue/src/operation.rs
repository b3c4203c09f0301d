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

//! The operation record buffered by the queue.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A pending write operation waiting to be batched.
///
/// The queue treats the record as opaque. `unique_suffix` identifies the
/// operation in diagnostics only; it takes no part in ordering and the queue
/// does not deduplicate on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Caller-supplied identifier of the document the operation applies to.
    pub unique_suffix: String,

    /// Namespace the operation was submitted under.
    pub namespace: String,

    /// The encoded operation request.
    pub data: Bytes,
}

impl OperationInfo {
    pub fn new(
        unique_suffix: impl Into<String>,
        namespace: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            unique_suffix: unique_suffix.into(),
            namespace:     namespace.into(),
            data:          data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_converts_arguments() {
        let op = OperationInfo::new("abc", "did:sidetree", b"payload".to_vec());
        assert_eq!(op.unique_suffix, "abc");
        assert_eq!(op.namespace, "did:sidetree");
        assert_eq!(op.data, Bytes::from_static(b"payload"));
    }
}
