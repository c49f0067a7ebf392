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

use crate::queue::QueueError;
use serde::{Deserialize, Serialize};

/// The order in which the elements of a single queue are served.
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum QueueOrder {
    /// First in, first out.
    #[default]
    Fifo,
    /// Last in, first out.
    Lifo,
}

/// A queue of elements of type [T].
///
/// Popping from an empty queue is not an error, it returns `None`.
/// After [Queue::close] every operation besides [Queue::len] and
/// [Queue::is_empty] fails with [QueueError::Closed].
pub trait Queue<T> {
    /// Enqueue a value.
    fn push(&mut self, value: T) -> Result<(), QueueError>;

    /// Dequeues the next value
    fn pop(&mut self) -> Result<Option<T>, QueueError>;

    /// Returns the value the next [Queue::pop] returns without removing it.
    fn peek(&mut self) -> Result<Option<T>, QueueError>;

    /// Returns the len of the queue
    fn len(&self) -> usize;

    /// Returns true if the queue is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists whatever the queue keeps in memory.
    fn flush(&mut self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Closes the queue. Closing a closed queue does nothing.
    fn close(&mut self) -> Result<(), QueueError>;
}

/// A queue that accepts an explicit priority for an element.
/// Lower values are served first.
pub trait PriorityPush<T>: Queue<T> {
    fn push_with_priority(&mut self, value: T, priority: i64) -> Result<(), QueueError>;
}

/// Creates the sub-queue for a key of a multiplexing queue.
pub trait QueueFactory<K, T> {
    type Queue: Queue<T>;

    fn create(&mut self, key: &K) -> Result<Self::Queue, QueueError>;
}

impl<K, T, Q, F> QueueFactory<K, T> for F
where
    Q: Queue<T>,
    F: FnMut(&K) -> Result<Q, QueueError>,
{
    type Queue = Q;

    #[inline]
    fn create(&mut self, key: &K) -> Result<Self::Queue, QueueError> {
        self(key)
    }
}

#[cfg(test)]
mod test {
    use crate::queue::QueueOrder;
    use std::str::FromStr;

    #[test]
    fn order_parses_case_insensitive() {
        assert_eq!(QueueOrder::Fifo, QueueOrder::from_str("FIFO").unwrap());
        assert_eq!(QueueOrder::Lifo, QueueOrder::from_str("lifo").unwrap());
        assert!(QueueOrder::from_str("random").is_err());
        assert_eq!("lifo", QueueOrder::Lifo.to_string());
    }
}
