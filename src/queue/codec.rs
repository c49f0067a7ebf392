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
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Turns elements into the bytes stored by a raw queue and back.
pub trait Codec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, QueueError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, QueueError>;
}

/// Compact binary encoding.
#[derive(Debug, Copy, Clone, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    #[inline]
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, QueueError> {
        Ok(bincode::serialize(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, QueueError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Human readable encoding, handy when the queue files are inspected by hand.
#[derive(Debug, Copy, Clone, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    #[inline]
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, QueueError> {
        Ok(serde_json::to_vec(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, QueueError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A codec selected at runtime, e.g. from the config.
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
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

impl Codec for CodecKind {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, QueueError> {
        match self {
            CodecKind::Bincode => BincodeCodec.encode(value),
            CodecKind::Json => JsonCodec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, QueueError> {
        match self {
            CodecKind::Bincode => BincodeCodec.decode(bytes),
            CodecKind::Json => JsonCodec.decode(bytes),
        }
    }
}
