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

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Error of a queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    EncodingError(#[from] bincode::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("The record has {0} bytes but a record can hold at most {max} bytes.", max = u32::MAX)]
    RecordTooLarge(usize),
    #[error("The queue can not hold more than {0} elements.")]
    CapacityExceeded(usize),
    #[error("The record at offset {offset} in {path} is corrupt: {reason}")]
    CorruptRecord {
        path: Utf8PathBuf,
        offset: u64,
        reason: &'static str,
    },
    #[error("The queue is already closed.")]
    Closed,
    #[error("Locks Poisoned")]
    LockPoisoned,
}

impl QueueError {
    pub(crate) fn corrupt(path: impl AsRef<Utf8Path>, offset: u64, reason: &'static str) -> Self {
        Self::CorruptRecord {
            path: path.as_ref().to_path_buf(),
            offset,
            reason,
        }
    }
}

impl<T> TryFrom<RawQueueError<T>> for QueueError {
    type Error = T;

    fn try_from(value: RawQueueError<T>) -> Result<Self, Self::Error> {
        match value {
            RawQueueError::Queue(err) => Ok(err),
            RawQueueError::Blocked(v) => Err(v),
            RawQueueError::LockPoisoned => Ok(Self::LockPoisoned),
        }
    }
}

/// Error of a non-blocking queue operation
#[derive(Debug, Error)]
pub enum RawQueueError<T> {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("The queue is blocked.")]
    Blocked(T),
    #[error("Poisoned")]
    LockPoisoned,
}

impl<T> RawQueueError<T> {
    pub fn retry(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Returns the value handed back by a blocked operation.
    pub fn into_blocked(self) -> Option<T> {
        match self {
            RawQueueError::Blocked(value) => Some(value),
            _ => None,
        }
    }
}
