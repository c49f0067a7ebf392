// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::queue::{CodecKind, DiskPriorityQueue, QueueError, QueueOrder, DEFAULT_CHUNK_SIZE};
use camino::Utf8PathBuf;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::num::NonZeroUsize;

/// The default directory of the persistent queue.
pub const DEFAULT_QUEUE_ROOT: &str = "erigone_data/queue";

/// Where and how the persistent priority queue is stored.
#[derive(Debug, Clone, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename(serialize = "Queue"))]
#[serde(default)]
pub struct QueueConfig {
    /// The root directory, every priority gets its own queue below it.
    pub root: Utf8PathBuf,
    /// The order inside a priority (default: fifo)
    pub order: QueueOrder,
    /// The number of records per chunk file of a fifo queue. (default: 100000)
    pub chunk_size: NonZeroUsize,
    /// The encoding of the elements (default: bincode)
    pub codec: CodecKind,
}

impl QueueConfig {
    /// Opens the persistent priority queue described by this config.
    pub fn open<T>(&self) -> Result<DiskPriorityQueue<T, CodecKind>, QueueError>
    where
        T: Serialize + DeserializeOwned + Debug,
    {
        DiskPriorityQueue::open(&self.root, self.order, self.chunk_size, self.codec)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from(DEFAULT_QUEUE_ROOT),
            order: QueueOrder::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            codec: CodecKind::default(),
        }
    }
}
