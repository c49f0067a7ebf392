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

pub mod fifo;
pub mod lifo;

use crate::queue::{
    Codec, FifoDiskQueue, LifoDiskQueue, Queue, QueueError, QueueFactory, QueueOrder,
    SerializedQueue,
};
use byteorder::{BigEndian, ReadBytesExt};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::io::Read;
use std::num::NonZeroUsize;

/// Size of the length header (fifo) or trailer (lifo) of a record.
pub(crate) const RECORD_HEADER_SIZE: u64 = 4;

#[inline]
pub(crate) fn read_record_len<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    reader.read_u32::<BigEndian>()
}

/// A disk queue whose order is only known at runtime.
#[derive(Debug)]
pub enum DiskQueue {
    Fifo(FifoDiskQueue),
    Lifo(LifoDiskQueue),
}

impl DiskQueue {
    /// Opens a fifo queue in the directory `path` or a lifo queue in the file `path`.
    pub fn open<P: AsRef<Utf8Path>>(
        path: P,
        order: QueueOrder,
        chunk_size: NonZeroUsize,
    ) -> Result<Self, QueueError> {
        match order {
            QueueOrder::Fifo => Ok(Self::Fifo(FifoDiskQueue::open(path, chunk_size)?)),
            QueueOrder::Lifo => Ok(Self::Lifo(LifoDiskQueue::open(path)?)),
        }
    }

    pub fn order(&self) -> QueueOrder {
        match self {
            DiskQueue::Fifo(_) => QueueOrder::Fifo,
            DiskQueue::Lifo(_) => QueueOrder::Lifo,
        }
    }
}

impl Queue<Vec<u8>> for DiskQueue {
    fn push(&mut self, value: Vec<u8>) -> Result<(), QueueError> {
        match self {
            DiskQueue::Fifo(queue) => queue.push(value),
            DiskQueue::Lifo(queue) => queue.push(value),
        }
    }

    fn pop(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        match self {
            DiskQueue::Fifo(queue) => queue.pop(),
            DiskQueue::Lifo(queue) => queue.pop(),
        }
    }

    fn peek(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        match self {
            DiskQueue::Fifo(queue) => queue.peek(),
            DiskQueue::Lifo(queue) => queue.peek(),
        }
    }

    fn len(&self) -> usize {
        match self {
            DiskQueue::Fifo(queue) => queue.len(),
            DiskQueue::Lifo(queue) => queue.len(),
        }
    }

    fn flush(&mut self) -> Result<(), QueueError> {
        match self {
            DiskQueue::Fifo(queue) => queue.flush(),
            DiskQueue::Lifo(queue) => queue.flush(),
        }
    }

    fn close(&mut self) -> Result<(), QueueError> {
        match self {
            DiskQueue::Fifo(queue) => queue.close(),
            DiskQueue::Lifo(queue) => queue.close(),
        }
    }
}

/// Creates the serialized disk queue of a priority below a root directory.
/// The queue of priority `p` lives at `root/p{p}`.
#[derive(Debug, Clone)]
pub struct DiskQueueFactory<C> {
    root: Utf8PathBuf,
    order: QueueOrder,
    chunk_size: NonZeroUsize,
    codec: C,
}

impl<C> DiskQueueFactory<C> {
    pub fn new<P: AsRef<Utf8Path>>(
        root: P,
        order: QueueOrder,
        chunk_size: NonZeroUsize,
        codec: C,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            order,
            chunk_size,
            codec,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path_for(&self, priority: i64) -> Utf8PathBuf {
        self.root.join(format!("p{priority}"))
    }
}

impl<C, T> QueueFactory<i64, T> for DiskQueueFactory<C>
where
    C: Codec + Clone,
    T: Serialize + DeserializeOwned + Debug,
{
    type Queue = SerializedQueue<DiskQueue, C, T>;

    fn create(&mut self, priority: &i64) -> Result<Self::Queue, QueueError> {
        let path = self.path_for(*priority);
        log::debug!("Open the {} queue for priority {priority} at {path}", self.order);
        Ok(SerializedQueue::new(
            DiskQueue::open(path, self.order, self.chunk_size)?,
            self.codec.clone(),
        ))
    }
}
