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

use crate::queue::{
    Codec, DiskQueueFactory, PriorityPush, PriorityQueue, Queue, QueueError, QueueOrder,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::num::NonZeroUsize;

const ACTIVE_FILE_NAME: &str = "active.json";

/// A priority queue of disk queues that remembers its non-empty priorities
/// in `active.json`, so a later run can pick the buckets up again.
#[derive(Debug)]
pub struct DiskPriorityQueue<T, C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    root: Utf8PathBuf,
    inner: PriorityQueue<T, DiskQueueFactory<C>>,
    finished: bool,
}

impl<T, C> DiskPriorityQueue<T, C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    /// Opens the queue below `root` and reopens the priorities listed in `active.json`.
    pub fn open<P: AsRef<Utf8Path>>(
        root: P,
        order: QueueOrder,
        chunk_size: NonZeroUsize,
        codec: C,
    ) -> Result<Self, QueueError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let active = Self::read_active(&root)?;
        if !active.is_empty() {
            log::info!("Resume the queue at {root} with the priorities {active:?}");
        }
        let factory = DiskQueueFactory::new(&root, order, chunk_size, codec);
        Ok(Self {
            inner: PriorityQueue::with_start_priorities(factory, active)?,
            root,
            finished: false,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn active_path(root: &Utf8Path) -> Utf8PathBuf {
        root.join(ACTIVE_FILE_NAME)
    }

    fn read_active(root: &Utf8Path) -> Result<Vec<i64>, QueueError> {
        match File::open(Self::active_path(root)) {
            Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_active(&self, active: &[i64]) -> Result<(), QueueError> {
        let path = Self::active_path(&self.root);
        if active.is_empty() {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        } else {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer(&mut writer, active)?;
            writer.flush()?;
            Ok(())
        }
    }

    /// Enqueue a value with a priority.
    pub fn push_with_priority(&mut self, value: T, priority: i64) -> Result<(), QueueError> {
        self.inner.push_with_priority(value, priority)
    }

    /// The priority the next element is served from.
    pub fn current_priority(&self) -> Option<i64> {
        self.inner.current_priority()
    }

    /// Closes every bucket, records the active priorities and returns them.
    /// The priorities are recorded even when a bucket fails to close.
    pub fn finish(&mut self) -> Result<Vec<i64>, QueueError> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.finished = true;
        let (active, err) = self.inner.finish_all();
        self.write_active(&active)?;
        if let Some(err) = err {
            return Err(err);
        }
        log::debug!("Closed the queue at {} with the priorities {active:?}", self.root);
        Ok(active)
    }
}

impl<T, C> Queue<T> for DiskPriorityQueue<T, C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    delegate::delegate! {
        to self.inner {
            fn push(&mut self, value: T) -> Result<(), QueueError>;
            fn pop(&mut self) -> Result<Option<T>, QueueError>;
            fn peek(&mut self) -> Result<Option<T>, QueueError>;
            fn len(&self) -> usize;
            fn is_empty(&self) -> bool;
        }
    }

    /// Flushes every bucket and records the currently active priorities.
    fn flush(&mut self) -> Result<(), QueueError> {
        self.inner.flush()?;
        let active: Vec<i64> = self
            .inner
            .priorities()
            .collect();
        self.write_active(&active)
    }

    fn close(&mut self) -> Result<(), QueueError> {
        self.finish().map(|_| ())
    }
}

impl<T, C> PriorityPush<T> for DiskPriorityQueue<T, C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    #[inline]
    fn push_with_priority(&mut self, value: T, priority: i64) -> Result<(), QueueError> {
        DiskPriorityQueue::push_with_priority(self, value, priority)
    }
}

impl<T, C> Drop for DiskPriorityQueue<T, C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            log::warn!("Failed to close the queue at {}: {err}", self.root);
        }
    }
}
