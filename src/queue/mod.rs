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

mod codec;
mod disk;
mod errors;
mod memory;
mod persistent;
mod priority;
mod round_robin;
mod serialized;
mod shared;
mod slot_aware;
mod traits;

pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec};
pub use disk::fifo::{FifoDiskQueue, DEFAULT_CHUNK_SIZE};
pub use disk::lifo::LifoDiskQueue;
pub use disk::{DiskQueue, DiskQueueFactory};
pub use errors::{QueueError, RawQueueError};
pub use memory::{FifoMemoryQueue, LifoMemoryQueue};
pub use persistent::DiskPriorityQueue;
pub use priority::PriorityQueue;
pub use round_robin::RoundRobinQueue;
pub use serialized::SerializedQueue;
pub use shared::{EnqueueCalled, SharedQueue};
pub use slot_aware::{disk_slot_factory, slot_directory, SlotActivity, SlotAwarePriorityQueue};
pub use traits::{PriorityPush, Queue, QueueFactory, QueueOrder};
