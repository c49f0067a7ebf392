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

use crate::queue::{PriorityPush, Queue, QueueError, RawQueueError};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tokio::sync::watch::{Receiver, Sender};

/// A signal sent when push is called on a [SharedQueue]
#[derive(Debug, Copy, Clone)]
pub struct EnqueueCalled;

/// A mutexed queue that can be shared between threads and tasks.
///
/// The blocking methods wait for the lock, the `try_` methods fail with
/// [RawQueueError::Blocked] instead and hand back whatever they were given.
#[derive(Debug)]
pub struct SharedQueue<Q> {
    broadcast: Sender<EnqueueCalled>,
    queue: Arc<Mutex<Q>>,
}

impl<Q> Clone for SharedQueue<Q> {
    fn clone(&self) -> Self {
        Self {
            broadcast: self.broadcast.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<Q> SharedQueue<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue: Arc::new(Mutex::new(queue)),
            broadcast: Sender::new(EnqueueCalled),
        }
    }

    /// Acquires the lock for a batch of operations.
    /// Pushes done through the guard do not notify the subscribers.
    pub fn lock(&self) -> Result<MutexGuard<'_, Q>, QueueError> {
        self.queue.lock().map_err(|_| QueueError::LockPoisoned)
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Q>, RawQueueError<()>> {
        match self.queue.try_lock() {
            Ok(lock) => Ok(lock),
            Err(TryLockError::WouldBlock) => Err(RawQueueError::Blocked(())),
            Err(TryLockError::Poisoned(_)) => Err(RawQueueError::LockPoisoned),
        }
    }

    #[inline]
    fn notify(&self) {
        self.broadcast.send_replace(EnqueueCalled);
    }

    /// Returns a subscription that is woken after every successful push.
    pub fn subscribe_to_change(&self) -> Receiver<EnqueueCalled> {
        self.broadcast.subscribe()
    }

    pub fn push<T>(&self, value: T) -> Result<(), QueueError>
    where
        Q: Queue<T>,
    {
        log::trace!("Acquire lock.");
        let mut lock = self.lock()?;
        lock.push(value)?;
        drop(lock);
        self.notify();
        Ok(())
    }

    pub fn try_push<T>(&self, value: T) -> Result<(), RawQueueError<T>>
    where
        Q: Queue<T>,
    {
        let mut lock = match self.queue.try_lock() {
            Ok(lock) => lock,
            Err(TryLockError::WouldBlock) => return Err(RawQueueError::Blocked(value)),
            Err(TryLockError::Poisoned(_)) => return Err(RawQueueError::LockPoisoned),
        };
        lock.push(value)?;
        drop(lock);
        self.notify();
        Ok(())
    }

    pub fn push_with_priority<T>(&self, value: T, priority: i64) -> Result<(), QueueError>
    where
        Q: PriorityPush<T>,
    {
        let mut lock = self.lock()?;
        lock.push_with_priority(value, priority)?;
        drop(lock);
        self.notify();
        Ok(())
    }

    pub fn pop<T>(&self) -> Result<Option<T>, QueueError>
    where
        Q: Queue<T>,
    {
        self.lock()?.pop()
    }

    pub fn try_pop<T>(&self) -> Result<Option<T>, RawQueueError<()>>
    where
        Q: Queue<T>,
    {
        Ok(self.try_lock()?.pop()?)
    }

    /// Pops up to `n` elements while holding the lock once.
    pub fn pop_n<T>(&self, n: usize) -> Result<Vec<T>, QueueError>
    where
        Q: Queue<T>,
    {
        let mut lock = self.lock()?;
        let mut found = Vec::with_capacity(n.min(lock.len()));
        while found.len() < n {
            match lock.pop()? {
                Some(value) => found.push(value),
                None => break,
            }
        }
        Ok(found)
    }

    pub fn peek<T>(&self) -> Result<Option<T>, QueueError>
    where
        Q: Queue<T>,
    {
        self.lock()?.peek()
    }

    pub fn len<T>(&self) -> Result<usize, QueueError>
    where
        Q: Queue<T>,
    {
        Ok(self.lock()?.len())
    }

    pub fn try_len<T>(&self) -> Result<usize, RawQueueError<()>>
    where
        Q: Queue<T>,
    {
        Ok(self.try_lock()?.len())
    }

    pub fn is_empty<T>(&self) -> Result<bool, QueueError>
    where
        Q: Queue<T>,
    {
        Ok(self.lock()?.is_empty())
    }

    pub fn flush<T>(&self) -> Result<(), QueueError>
    where
        Q: Queue<T>,
    {
        self.lock()?.flush()
    }

    pub fn close<T>(&self) -> Result<(), QueueError>
    where
        Q: Queue<T>,
    {
        self.lock()?.close()
    }
}
