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

//! Durable FIFO queue of pending operations.
//!
//! Each partition (a namespace within a channel) keeps its operations in an
//! ordered key-value store, keyed by a monotonically increasing offset. The
//! queue survives restarts: reopening a partition rebuilds its cursors from
//! the keys that are still present.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod operation;
pub mod path;
pub mod provider;
pub mod queue;
pub mod recovery;
pub mod store;

pub use builder::QueueBuilder;
pub use config::{FlushMode, QueueConfig};
pub use error::{QueueError, Result};
pub use events::{EventSink, QueueEvent, RecordingSink, TracingSink};
pub use operation::OperationInfo;
pub use path::{PartitionKey, partition_dir};
pub use provider::QueueProvider;
pub use queue::OperationQueue;
pub use recovery::Cursors;
pub use store::{FjallStore, MemoryStore, Store};
