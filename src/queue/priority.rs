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

use crate::queue::{PriorityPush, Queue, QueueError, QueueFactory};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// A queue multiplexing one sub-queue (bucket) per priority.
///
/// The bucket with the lowest numeric priority is served first, the order
/// inside a bucket is the order of the sub-queue created by [F].
/// Buckets are created lazily on push and closed as soon as they run empty.
pub struct PriorityQueue<T, F: QueueFactory<i64, T>> {
    queues: BTreeMap<i64, F::Queue>,
    factory: F,
    closed: bool,
    _element_typ: PhantomData<fn(T) -> T>,
}

impl<T, F> PriorityQueue<T, F>
where
    F: QueueFactory<i64, T>,
{
    pub fn new(factory: F) -> Self {
        Self {
            queues: BTreeMap::new(),
            factory,
            closed: false,
            _element_typ: PhantomData,
        }
    }

    /// Creates the queue and opens the buckets of `priorities` right away,
    /// used to pick up buckets persisted by an earlier run.
    pub fn with_start_priorities<I>(factory: F, priorities: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut new = Self::new(factory);
        for priority in priorities {
            if let Entry::Vacant(entry) = new.queues.entry(priority) {
                entry.insert(new.factory.create(&priority)?);
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

    /// Enqueue a value with a priority.
    pub fn push_with_priority(&mut self, value: T, priority: i64) -> Result<(), QueueError> {
        self.check_open()?;
        let queue = match self.queues.entry(priority) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("Create the bucket for priority {priority}");
                entry.insert(self.factory.create(&priority)?)
            }
        };
        queue.push(value)
    }

    /// Dequeues from the bucket with the lowest priority.
    pub fn pop(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        while let Some(mut entry) = self.queues.first_entry() {
            let value = entry.get_mut().pop()?;
            if entry.get().is_empty() || value.is_none() {
                let (priority, mut queue) = entry.remove_entry();
                if value.is_none() && !queue.is_empty() {
                    log::warn!(
                        "The bucket for priority {priority} reports {} elements but returned none.",
                        queue.len()
                    );
                }
                log::debug!("Remove the drained bucket for priority {priority}");
                if let Err(err) = queue.close() {
                    log::warn!(
                        "Failed to close the drained bucket for priority {priority}: {err}"
                    );
                }
            }
            if value.is_some() {
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// Returns the value the next [PriorityQueue::pop] returns.
    pub fn peek(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        for queue in self.queues.values_mut() {
            if let Some(found) = queue.peek()? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// The sum of the lengths of all buckets.
    pub fn len(&self) -> usize {
        self.queues.values().map(|queue| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(|queue| queue.is_empty())
    }

    /// The priority the next element is served from.
    pub fn current_priority(&self) -> Option<i64> {
        self.queues
            .iter()
            .find(|(_, queue)| !queue.is_empty())
            .map(|(priority, _)| *priority)
    }

    /// All priorities with an open bucket, ascending.
    pub fn priorities(&self) -> impl Iterator<Item = i64> + '_ {
        self.queues.keys().copied()
    }

    /// Flushes every bucket.
    pub fn flush(&mut self) -> Result<(), QueueError> {
        self.check_open()?;
        for queue in self.queues.values_mut() {
            queue.flush()?;
        }
        Ok(())
    }

    /// Closes every bucket and returns the priorities that still hold
    /// elements, ascending. A closed queue returns an empty list.
    pub fn finish(&mut self) -> Result<Vec<i64>, QueueError> {
        match self.finish_all() {
            (active, None) => Ok(active),
            (_, Some(err)) => Err(err),
        }
    }

    /// Closes every bucket like [PriorityQueue::finish], but keeps the active
    /// priorities when a bucket fails to close. The first failure is returned
    /// next to them.
    pub fn finish_all(&mut self) -> (Vec<i64>, Option<QueueError>) {
        if self.closed {
            return (Vec::new(), None);
        }
        self.closed = true;
        let mut active = Vec::new();
        let mut first_error = None;
        for (priority, mut queue) in std::mem::take(&mut self.queues) {
            if !queue.is_empty() {
                active.push(priority);
            }
            if let Err(err) = queue.close() {
                log::warn!("Failed to close the bucket for priority {priority}: {err}");
                first_error.get_or_insert(err);
            }
        }
        (active, first_error)
    }
}

impl<T, F> Queue<T> for PriorityQueue<T, F>
where
    F: QueueFactory<i64, T>,
{
    /// Enqueues with priority 0.
    fn push(&mut self, value: T) -> Result<(), QueueError> {
        self.push_with_priority(value, 0)
    }

    fn pop(&mut self) -> Result<Option<T>, QueueError> {
        PriorityQueue::pop(self)
    }

    fn peek(&mut self) -> Result<Option<T>, QueueError> {
        PriorityQueue::peek(self)
    }

    fn len(&self) -> usize {
        PriorityQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        PriorityQueue::is_empty(self)
    }

    fn flush(&mut self) -> Result<(), QueueError> {
        PriorityQueue::flush(self)
    }

    fn close(&mut self) -> Result<(), QueueError> {
        self.finish().map(|_| ())
    }
}

impl<T, F> PriorityPush<T> for PriorityQueue<T, F>
where
    F: QueueFactory<i64, T>,
{
    #[inline]
    fn push_with_priority(&mut self, value: T, priority: i64) -> Result<(), QueueError> {
        PriorityQueue::push_with_priority(self, value, priority)
    }
}

impl<T, F> Debug for PriorityQueue<T, F>
where
    F: QueueFactory<i64, T>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue")
            .field(
                "buckets",
                &self
                    .queues
                    .iter()
                    .map(|(priority, queue)| (*priority, queue.len()))
                    .collect::<Vec<_>>(),
            )
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::queue::{
        FifoMemoryQueue, LifoMemoryQueue, PriorityQueue, Queue, QueueError,
    };
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// A bucket that loses its backing storage on close.
    #[derive(Debug, Default)]
    struct BrokenCleanup {
        values: VecDeque<u32>,
    }

    impl Queue<u32> for BrokenCleanup {
        fn push(&mut self, value: u32) -> Result<(), QueueError> {
            self.values.push_back(value);
            Ok(())
        }

        fn pop(&mut self) -> Result<Option<u32>, QueueError> {
            Ok(self.values.pop_front())
        }

        fn peek(&mut self) -> Result<Option<u32>, QueueError> {
            Ok(self.values.front().copied())
        }

        fn len(&self) -> usize {
            self.values.len()
        }

        fn close(&mut self) -> Result<(), QueueError> {
            Err(std::io::Error::other("cleanup failed").into())
        }
    }

    fn fifo_factory(_: &i64) -> Result<FifoMemoryQueue<&'static str>, QueueError> {
        Ok(FifoMemoryQueue::new())
    }

    #[test]
    fn lowest_priority_is_served_first() {
        let mut queue = PriorityQueue::new(fifo_factory);
        queue.push_with_priority("low-1", 5).unwrap();
        queue.push_with_priority("high-1", -2).unwrap();
        queue.push_with_priority("default", 0).unwrap();
        queue.push_with_priority("high-2", -2).unwrap();
        queue.push_with_priority("low-2", 5).unwrap();
        assert_eq!(5, queue.len());
        assert_eq!(Some(-2), queue.current_priority());
        assert_eq!(Some("high-1"), queue.peek().unwrap());

        let mut found = Vec::new();
        while let Some(value) = queue.pop().unwrap() {
            found.push(value);
        }
        assert_eq!(vec!["high-1", "high-2", "default", "low-1", "low-2"], found);
        assert_eq!(None, queue.current_priority());
        assert!(queue.is_empty());
        assert_eq!(0, queue.priorities().count());
    }

    #[test]
    fn bucket_order_follows_the_sub_queue() {
        let mut queue = PriorityQueue::new(|_: &i64| {
            Ok::<_, QueueError>(LifoMemoryQueue::<u32>::new())
        });
        for value in 1..=3 {
            queue.push_with_priority(value, 1).unwrap();
        }
        queue.push(10).unwrap();
        assert_eq!(Some(10), queue.pop().unwrap());
        assert_eq!(Some(3), queue.pop().unwrap());
        assert_eq!(Some(2), queue.pop().unwrap());
        assert_eq!(Some(1), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
    }

    #[test]
    fn drained_buckets_are_closed_and_removed() {
        let created = Rc::new(RefCell::new(Vec::new()));
        let created_by_factory = created.clone();
        let mut queue = PriorityQueue::new(move |priority: &i64| {
            created_by_factory.borrow_mut().push(*priority);
            Ok::<_, QueueError>(FifoMemoryQueue::<u8>::new())
        });
        queue.push_with_priority(1, 1).unwrap();
        queue.pop().unwrap();
        assert_eq!(0, queue.priorities().count());
        queue.push_with_priority(2, 1).unwrap();
        assert_eq!(vec![1, 1], *created.borrow());
    }

    #[test]
    fn empty_start_buckets_do_not_hide_elements() {
        let mut queue = PriorityQueue::with_start_priorities(fifo_factory, [0, 1, 2]).unwrap();
        assert_eq!(vec![0, 1, 2], queue.priorities().collect::<Vec<_>>());
        queue.push_with_priority("value", 2).unwrap();
        assert_eq!(Some(2), queue.current_priority());
        assert_eq!(Some("value"), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
    }

    #[test]
    fn finish_reports_active_priorities() {
        let mut queue = PriorityQueue::new(fifo_factory);
        queue.push_with_priority("a", 3).unwrap();
        queue.push_with_priority("b", -1).unwrap();
        queue.push_with_priority("c", 7).unwrap();
        assert_eq!(Some("b"), queue.pop().unwrap());
        assert_eq!(vec![3, 7], queue.finish().unwrap());
        assert!(queue.finish().unwrap().is_empty());
        assert!(matches!(queue.push_with_priority("d", 0), Err(QueueError::Closed)));
    }

    #[test]
    fn failing_cleanup_keeps_the_popped_value() {
        let mut queue = PriorityQueue::new(|_: &i64| Ok::<_, QueueError>(BrokenCleanup::default()));
        queue.push_with_priority(7, 0).unwrap();
        queue.push_with_priority(8, 1).unwrap();
        assert_eq!(Some(7), queue.pop().unwrap());
        assert_eq!(1, queue.len());
        assert_eq!(vec![1], queue.priorities().collect::<Vec<_>>());
        assert_eq!(Some(8), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
    }

    #[test]
    fn finish_all_keeps_the_active_priorities_on_failure() {
        let mut queue = PriorityQueue::new(|_: &i64| Ok::<_, QueueError>(BrokenCleanup::default()));
        queue.push_with_priority(1, 5).unwrap();
        queue.push_with_priority(2, -3).unwrap();
        let (active, err) = queue.finish_all();
        assert_eq!(vec![-3, 5], active);
        assert!(matches!(err, Some(QueueError::Io(_))));
        let (active, err) = queue.finish_all();
        assert!(active.is_empty());
        assert!(err.is_none());
    }
}
