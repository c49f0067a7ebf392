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

use crate::queue::{Queue, QueueError, QueueFactory};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;

/// A queue with one sub-queue per key, serving the keys in rotation.
///
/// New keys are served after every key already known. A key whose queue runs
/// empty leaves the rotation and its queue is closed.
pub struct RoundRobinQueue<K, T, F: QueueFactory<K, T>> {
    queues: HashMap<K, F::Queue>,
    rotation: VecDeque<K>,
    factory: F,
    closed: bool,
    _element_typ: PhantomData<fn(T) -> T>,
}

impl<K, T, F> RoundRobinQueue<K, T, F>
where
    K: Eq + Hash + Clone + Debug,
    F: QueueFactory<K, T>,
{
    pub fn new(factory: F) -> Self {
        Self {
            queues: HashMap::new(),
            rotation: VecDeque::new(),
            factory,
            closed: false,
            _element_typ: PhantomData,
        }
    }

    /// Creates the queue and opens the sub-queues of `keys` right away.
    pub fn with_start_keys<I>(factory: F, keys: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = K>,
    {
        let mut new = Self::new(factory);
        for key in keys {
            if !new.queues.contains_key(&key) {
                let queue = new.factory.create(&key)?;
                new.queues.insert(key.clone(), queue);
                new.rotation.push_back(key);
            }
        }
        Ok(new)
    }

    #[inline]
    fn check_open(&self) -> Result<(), QueueError> {
        if self.closed {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    /// Enqueue a value for a key.
    pub fn push(&mut self, value: T, key: K) -> Result<(), QueueError> {
        self.check_open()?;
        let queue = match self.queues.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("Add {:?} to the rotation", entry.key());
                let queue = self.factory.create(entry.key())?;
                self.rotation.push_back(entry.key().clone());
                entry.insert(queue)
            }
        };
        queue.push(value)
    }

    /// Dequeues from the next key in the rotation.
    pub fn pop(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        while let Some(key) = self.rotation.pop_front() {
            let Some(queue) = self.queues.get_mut(&key) else {
                continue;
            };
            let value = queue.pop()?;
            if queue.is_empty() || value.is_none() {
                if let Some(mut queue) = self.queues.remove(&key) {
                    log::debug!("Remove {key:?} from the rotation");
                    if let Err(err) = queue.close() {
                        log::warn!("Failed to close the drained queue for {key:?}: {err}");
                    }
                }
            } else {
                self.rotation.push_back(key);
            }
            if value.is_some() {
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// Returns the value the next [RoundRobinQueue::pop] returns.
    pub fn peek(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        for key in self.rotation.iter() {
            if let Some(queue) = self.queues.get_mut(key) {
                if let Some(found) = queue.peek()? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(|queue| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(|queue| queue.is_empty())
    }

    /// The keys in the order they are served.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.rotation.iter()
    }

    /// Closes every sub-queue and returns the keys that still hold elements,
    /// in rotation order.
    pub fn finish(&mut self) -> Result<Vec<K>, QueueError> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.closed = true;
        let mut active = Vec::new();
        let mut first_error = None;
        for key in std::mem::take(&mut self.rotation) {
            let Some(mut queue) = self.queues.remove(&key) else {
                continue;
            };
            if !queue.is_empty() {
                active.push(key.clone());
            }
            if let Err(err) = queue.close() {
                log::warn!("Failed to close the queue for {key:?}: {err}");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            None => Ok(active),
            Some(err) => Err(err),
        }
    }
}

impl<K, T, F> Debug for RoundRobinQueue<K, T, F>
where
    K: Debug + Eq + Hash,
    F: QueueFactory<K, T>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobinQueue")
            .field("rotation", &self.rotation)
            .field("len", &self.queues.values().map(|queue| queue.len()).sum::<usize>())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::queue::{FifoMemoryQueue, Queue, QueueError, RoundRobinQueue};

    /// Serves like a fifo, but every close fails.
    #[derive(Debug, Default)]
    struct BrokenCleanup(FifoMemoryQueue<u32>);

    impl Queue<u32> for BrokenCleanup {
        fn push(&mut self, value: u32) -> Result<(), QueueError> {
            self.0.push(value)
        }

        fn pop(&mut self) -> Result<Option<u32>, QueueError> {
            self.0.pop()
        }

        fn peek(&mut self) -> Result<Option<u32>, QueueError> {
            self.0.peek()
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn close(&mut self) -> Result<(), QueueError> {
            Err(std::io::Error::other("cleanup failed").into())
        }
    }

    fn factory(_: &&'static str) -> Result<FifoMemoryQueue<u32>, QueueError> {
        Ok(FifoMemoryQueue::new())
    }

    #[test]
    fn keys_are_served_in_rotation() {
        let mut queue = RoundRobinQueue::new(factory);
        queue.push(1, "a.example").unwrap();
        queue.push(2, "a.example").unwrap();
        queue.push(3, "a.example").unwrap();
        queue.push(10, "b.example").unwrap();
        queue.push(20, "b.example").unwrap();
        queue.push(100, "c.example").unwrap();
        assert_eq!(6, queue.len());
        assert_eq!(Some(1), queue.peek().unwrap());

        let mut found = Vec::new();
        while let Some(value) = queue.pop().unwrap() {
            found.push(value);
        }
        assert_eq!(vec![1, 10, 100, 2, 20, 3], found);
        assert!(queue.is_empty());
        assert_eq!(0, queue.keys().count());
    }

    #[test]
    fn start_keys_keep_their_order() {
        let mut queue =
            RoundRobinQueue::with_start_keys(factory, ["b.example", "a.example"]).unwrap();
        queue.push(1, "a.example").unwrap();
        queue.push(2, "b.example").unwrap();
        assert_eq!(Some(2), queue.pop().unwrap());
        assert_eq!(Some(1), queue.pop().unwrap());
    }

    #[test]
    fn finish_reports_active_keys() {
        let mut queue = RoundRobinQueue::new(factory);
        queue.push(1, "a.example").unwrap();
        queue.push(2, "b.example").unwrap();
        queue.push(3, "b.example").unwrap();
        assert_eq!(Some(1), queue.pop().unwrap());
        assert_eq!(vec!["b.example"], queue.finish().unwrap());
        assert!(matches!(queue.pop(), Err(QueueError::Closed)));
    }

    #[test]
    fn failing_cleanup_keeps_the_popped_value() {
        let mut queue = RoundRobinQueue::new(|_: &&'static str| {
            Ok::<_, QueueError>(BrokenCleanup::default())
        });
        queue.push(7, "a.example").unwrap();
        queue.push(8, "b.example").unwrap();
        assert_eq!(Some(7), queue.pop().unwrap());
        assert_eq!(vec![&"b.example"], queue.keys().collect::<Vec<_>>());
        assert_eq!(Some(8), queue.pop().unwrap());
        assert!(queue.is_empty());
    }
}
