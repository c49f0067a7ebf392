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

use crate::queue::{Codec, DiskQueueFactory, PriorityQueue, QueueError, QueueFactory, QueueOrder};
use camino::Utf8Path;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroUsize;

/// Knows how much work is currently in flight for a slot.
pub trait SlotActivity {
    fn active(&self, slot: &str) -> usize;
}

impl<F> SlotActivity for F
where
    F: Fn(&str) -> usize,
{
    #[inline]
    fn active(&self, slot: &str) -> usize {
        self(slot)
    }
}

/// Converts a slot into a unique, filesystem safe directory name.
pub fn slot_directory(slot: &str) -> String {
    let readable: String = slot
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{readable}-{:016x}", twox_hash::xxh3::hash64(slot.as_bytes()))
}

/// Creates a slot factory that keeps the buckets of a slot in
/// `root/{slot_directory(slot)}/p{priority}`.
pub fn disk_slot_factory<C: Codec + Clone>(
    root: impl AsRef<Utf8Path>,
    order: QueueOrder,
    chunk_size: NonZeroUsize,
    codec: C,
) -> impl FnMut(&str) -> Result<DiskQueueFactory<C>, QueueError> {
    let root = root.as_ref().to_path_buf();
    move |slot: &str| {
        Ok(DiskQueueFactory::new(
            root.join(slot_directory(slot)),
            order,
            chunk_size,
            codec.clone(),
        ))
    }
}

/// A priority queue per slot. Pops are served from the slot with the least
/// work in flight, ties are broken by the slot name.
pub struct SlotAwarePriorityQueue<T, G, F, A>
where
    G: FnMut(&str) -> Result<F, QueueError>,
    F: QueueFactory<i64, T>,
    A: SlotActivity,
{
    slots: BTreeMap<String, PriorityQueue<T, F>>,
    make_factory: G,
    activity: A,
    closed: bool,
}

impl<T, G, F, A> SlotAwarePriorityQueue<T, G, F, A>
where
    G: FnMut(&str) -> Result<F, QueueError>,
    F: QueueFactory<i64, T>,
    A: SlotActivity,
{
    pub fn new(make_factory: G, activity: A) -> Self {
        Self {
            slots: BTreeMap::new(),
            make_factory,
            activity,
            closed: false,
        }
    }

    /// Creates the queue and reopens the given slots with their priorities,
    /// usually the result of an earlier [SlotAwarePriorityQueue::finish].
    pub fn with_start_slots<I, P>(make_factory: G, activity: A, slots: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = (String, P)>,
        P: IntoIterator<Item = i64>,
    {
        let mut new = Self::new(make_factory, activity);
        for (slot, priorities) in slots {
            let factory = (new.make_factory)(&slot)?;
            let queue = PriorityQueue::with_start_priorities(factory, priorities)?;
            new.slots.insert(slot, queue);
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

    /// Enqueue a value for a slot with a priority.
    pub fn push(&mut self, value: T, slot: &str, priority: i64) -> Result<(), QueueError> {
        self.check_open()?;
        let queue = match self.slots.entry(slot.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("Create the queue for slot {slot}");
                let factory = (self.make_factory)(slot)?;
                entry.insert(PriorityQueue::new(factory))
            }
        };
        queue.push_with_priority(value, priority)
    }

    /// The slot the next element is served from.
    pub fn next_slot(&self) -> Option<&str> {
        self.slots
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .min_by_key(|&(slot, _)| (self.activity.active(slot), slot))
            .map(|(slot, _)| slot.as_str())
    }

    /// Dequeues the most urgent element of the least busy slot.
    pub fn pop(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        let Some(slot) = self.next_slot().map(str::to_string) else {
            return Ok(None);
        };
        let Some(queue) = self.slots.get_mut(&slot) else {
            return Ok(None);
        };
        let value = queue.pop()?;
        if queue.is_empty() {
            if let Some(mut queue) = self.slots.remove(&slot) {
                log::debug!("Remove the drained slot {slot}");
                if let Err(err) = queue.finish() {
                    log::warn!("Failed to close the drained slot {slot}: {err}");
                }
            }
        }
        Ok(value)
    }

    /// Returns the value the next [SlotAwarePriorityQueue::pop] returns.
    pub fn peek(&mut self) -> Result<Option<T>, QueueError> {
        self.check_open()?;
        let Some(slot) = self.next_slot().map(str::to_string) else {
            return Ok(None);
        };
        match self.slots.get_mut(&slot) {
            Some(queue) => queue.peek(),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.values().map(|queue| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|queue| queue.is_empty())
    }

    /// The number of elements queued for `slot`.
    pub fn len_of(&self, slot: &str) -> usize {
        self.slots.get(slot).map_or(0, |queue| queue.len())
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.keys().map(String::as_str)
    }

    /// Closes every slot and returns the active priorities per slot.
    pub fn finish(&mut self) -> Result<BTreeMap<String, Vec<i64>>, QueueError> {
        if self.closed {
            return Ok(BTreeMap::new());
        }
        self.closed = true;
        let mut active = BTreeMap::new();
        let mut first_error = None;
        for (slot, mut queue) in std::mem::take(&mut self.slots) {
            let (priorities, err) = queue.finish_all();
            if let Some(err) = err {
                log::warn!("Failed to close the queue of slot {slot}: {err}");
                first_error.get_or_insert(err);
            }
            if !priorities.is_empty() {
                active.insert(slot, priorities);
            }
        }
        match first_error {
            None => Ok(active),
            Some(err) => Err(err),
        }
    }
}

impl<T, G, F, A> Debug for SlotAwarePriorityQueue<T, G, F, A>
where
    G: FnMut(&str) -> Result<F, QueueError>,
    F: QueueFactory<i64, T>,
    A: SlotActivity,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotAwarePriorityQueue")
            .field("slots", &self.slots)
            .field("closed", &self.closed)
            .finish()
    }
}
