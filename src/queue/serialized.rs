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

use crate::queue::{Codec, Queue, QueueError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

/// A typed queue on top of a queue of raw bytes.
///
/// Elements are encoded by [C] on push and decoded on pop. An element that
/// fails to decode is still removed from the underlying queue.
#[derive(Debug)]
pub struct SerializedQueue<Q, C, T> {
    inner: Q,
    codec: C,
    _element_typ: PhantomData<fn(T) -> T>,
}

impl<Q, C, T> SerializedQueue<Q, C, T> {
    pub fn new(inner: Q, codec: C) -> Self {
        Self {
            inner,
            codec,
            _element_typ: PhantomData,
        }
    }

    pub fn inner(&self) -> &Q {
        &self.inner
    }

    pub fn into_inner(self) -> Q {
        self.inner
    }
}

impl<Q, C, T> Queue<T> for SerializedQueue<Q, C, T>
where
    Q: Queue<Vec<u8>>,
    C: Codec,
    T: Serialize + DeserializeOwned + Debug,
{
    fn push(&mut self, value: T) -> Result<(), QueueError> {
        log::trace!("Encode {:?}", value);
        let encoded = self.codec.encode(&value)?;
        self.inner.push(encoded)
    }

    fn pop(&mut self) -> Result<Option<T>, QueueError> {
        match self.inner.pop()? {
            None => Ok(None),
            Some(encoded) => Ok(Some(self.codec.decode(&encoded)?)),
        }
    }

    fn peek(&mut self) -> Result<Option<T>, QueueError> {
        match self.inner.peek()? {
            None => Ok(None),
            Some(encoded) => Ok(Some(self.codec.decode(&encoded)?)),
        }
    }

    delegate::delegate! {
        to self.inner {
            fn len(&self) -> usize;
            fn is_empty(&self) -> bool;
            fn flush(&mut self) -> Result<(), QueueError>;
            fn close(&mut self) -> Result<(), QueueError>;
        }
    }
}

#[cfg(test)]
mod test {
    use crate::queue::{
        BincodeCodec, FifoDiskQueue, FifoMemoryQueue, JsonCodec, LifoDiskQueue, Queue, QueueError,
        SerializedQueue,
    };
    use camino_tempfile::Utf8TempDir;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Request {
        url: String,
        priority: i64,
        meta: Option<Vec<String>>,
    }

    fn request(url: &str) -> Request {
        Request {
            url: url.to_string(),
            priority: 0,
            meta: Some(vec!["seed".to_string()]),
        }
    }

    #[test]
    fn typed_fifo_on_disk() {
        let dir = Utf8TempDir::new().unwrap();
        let raw = FifoDiskQueue::open_default(dir.path().join("fifo")).unwrap();
        let mut queue = SerializedQueue::new(raw, BincodeCodec);
        queue.push(request("https://a.example/")).unwrap();
        queue.push(request("https://b.example/")).unwrap();
        assert_eq!(2, queue.len());
        assert_eq!(Some(request("https://a.example/")), queue.peek().unwrap());
        assert_eq!(Some(request("https://a.example/")), queue.pop().unwrap());
        assert_eq!(Some(request("https://b.example/")), queue.pop().unwrap());
        let none: Option<Request> = queue.pop().unwrap();
        assert_eq!(None, none);
    }

    #[test]
    fn typed_lifo_on_disk() {
        let dir = Utf8TempDir::new().unwrap();
        let raw = LifoDiskQueue::open(dir.path().join("lifo")).unwrap();
        let mut queue = SerializedQueue::new(raw, JsonCodec);
        queue.push(request("https://a.example/")).unwrap();
        queue.push(request("https://b.example/")).unwrap();
        assert_eq!(Some(request("https://b.example/")), queue.pop().unwrap());
        assert_eq!(Some(request("https://a.example/")), queue.pop().unwrap());
    }

    #[test]
    fn undecodable_elements_are_consumed() {
        let mut raw = FifoMemoryQueue::new();
        raw.push(b"{broken".to_vec()).unwrap();
        raw.push(br#"{"url":"https://c.example/","priority":3,"meta":null}"#.to_vec())
            .unwrap();
        let mut queue: SerializedQueue<_, _, Request> = SerializedQueue::new(raw, JsonCodec);
        assert!(matches!(queue.pop(), Err(QueueError::JsonError(_))));
        assert_eq!(1, queue.len());
        let found = queue.pop().unwrap().unwrap();
        assert_eq!(3, found.priority);
        assert_eq!(None, found.meta);
    }
}
