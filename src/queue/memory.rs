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

use crate::queue::{Queue, QueueError};
use std::collections::VecDeque;

macro_rules! memory_queue {
    ($(#[$meta:meta])* $name: ident, $pop: ident, $peek: ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<T> {
            inner: VecDeque<T>,
            closed: bool,
        }

        impl<T> $name<T> {
            pub fn new() -> Self {
                Self {
                    inner: VecDeque::new(),
                    closed: false,
                }
            }

            pub fn with_capacity(capacity: usize) -> Self {
                Self {
                    inner: VecDeque::with_capacity(capacity),
                    closed: false,
                }
            }

            #[inline]
            fn check_open(&self) -> Result<(), QueueError> {
                if self.closed {
                    Err(QueueError::Closed)
                } else {
                    Ok(())
                }
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T: Clone> Queue<T> for $name<T> {
            fn push(&mut self, value: T) -> Result<(), QueueError> {
                self.check_open()?;
                self.inner.push_back(value);
                Ok(())
            }

            fn pop(&mut self) -> Result<Option<T>, QueueError> {
                self.check_open()?;
                Ok(self.inner.$pop())
            }

            fn peek(&mut self) -> Result<Option<T>, QueueError> {
                self.check_open()?;
                Ok(self.inner.$peek().cloned())
            }

            #[inline]
            fn len(&self) -> usize {
                self.inner.len()
            }

            fn close(&mut self) -> Result<(), QueueError> {
                self.closed = true;
                Ok(())
            }
        }

        impl<T> FromIterator<T> for $name<T> {
            fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
                Self {
                    inner: iter.into_iter().collect(),
                    closed: false,
                }
            }
        }
    };
}

memory_queue! {
    /// An in-memory first in, first out queue.
    FifoMemoryQueue, pop_front, front
}

memory_queue! {
    /// An in-memory last in, first out queue.
    LifoMemoryQueue, pop_back, back
}

#[cfg(test)]
mod test {
    use crate::queue::{FifoMemoryQueue, LifoMemoryQueue, Queue, QueueError};

    #[test]
    fn fifo_serves_in_insertion_order() {
        let mut queue = FifoMemoryQueue::new();
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.push("c").unwrap();
        assert_eq!(3, queue.len());
        assert_eq!(Some("a"), queue.peek().unwrap());
        assert_eq!(Some("a"), queue.pop().unwrap());
        assert_eq!(Some("b"), queue.pop().unwrap());
        assert_eq!(Some("c"), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn lifo_serves_newest_first() {
        let mut queue: LifoMemoryQueue<u32> = (1..=3).collect();
        assert_eq!(Some(3), queue.peek().unwrap());
        assert_eq!(Some(3), queue.pop().unwrap());
        queue.push(4).unwrap();
        assert_eq!(Some(4), queue.pop().unwrap());
        assert_eq!(Some(2), queue.pop().unwrap());
        assert_eq!(Some(1), queue.pop().unwrap());
        assert_eq!(None, queue.peek().unwrap());
    }

    #[test]
    fn closed_queue_rejects_access() {
        let mut queue = FifoMemoryQueue::new();
        queue.push(1).unwrap();
        queue.close().unwrap();
        queue.close().unwrap();
        assert_eq!(1, queue.len());
        assert!(matches!(queue.push(2), Err(QueueError::Closed)));
        assert!(matches!(queue.pop(), Err(QueueError::Closed)));
    }
}
