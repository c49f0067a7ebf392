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

use crate::queue::disk::{read_record_len, RECORD_HEADER_SIZE};
use crate::queue::{Queue, QueueError};
use byteorder::{BigEndian, WriteBytesExt};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

/// A last in, first out queue of byte records stored in a single file.
///
/// The file starts with the big endian `u32` element count, followed by the
/// records. Every record is the payload followed by its big endian `u32`
/// length, so the newest record can be read from the end of the file.
#[derive(Debug)]
pub struct LifoDiskQueue {
    path: Utf8PathBuf,
    file: Option<File>,
    size: usize,
}

impl LifoDiskQueue {
    /// Opens the queue file at `path`, creating it (and its parents) when missing.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        let (file, size) = if path.exists() {
            let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
            let file_len = file.metadata()?.len();
            if file_len < RECORD_HEADER_SIZE {
                return Err(QueueError::corrupt(path, 0, "missing count header"));
            }
            let mut size = read_record_len(&mut file)? as usize;
            if size == 0 && file_len > RECORD_HEADER_SIZE {
                size = Self::recount(&path, &mut file, file_len)?;
                log::warn!(
                    "The lifo queue at {path} was not closed properly, recovered {size} elements."
                );
            }
            (file, size)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            file.write_u32::<BigEndian>(0)?;
            (file, 0)
        };
        log::trace!("Open lifo queue at {path} with {size} elements");
        Ok(Self {
            path,
            file: Some(file),
            size,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Counts the records by following the length trailers from the end of the file.
    fn recount(path: &Utf8Path, file: &mut File, file_len: u64) -> Result<usize, QueueError> {
        let mut position = file_len;
        let mut count = 0usize;
        while position > RECORD_HEADER_SIZE {
            if position < 2 * RECORD_HEADER_SIZE {
                return Err(QueueError::corrupt(path, position, "truncated length trailer"));
            }
            file.seek(SeekFrom::Start(position - RECORD_HEADER_SIZE))?;
            let len = read_record_len(file)? as u64;
            let record_start = position - RECORD_HEADER_SIZE;
            if len > record_start - RECORD_HEADER_SIZE {
                return Err(QueueError::corrupt(path, position, "record exceeds the file"));
            }
            position = record_start - len;
            count += 1;
        }
        Ok(count)
    }

    /// Reads the newest record, returns it with the offset it starts at.
    fn read_last(&mut self) -> Result<Option<(Vec<u8>, u64)>, QueueError> {
        if self.size == 0 {
            return Ok(None);
        }
        let file = self.file.as_mut().ok_or(QueueError::Closed)?;
        let end = file.seek(SeekFrom::End(0))?;
        if end < 2 * RECORD_HEADER_SIZE {
            return Err(QueueError::corrupt(&self.path, end, "truncated length trailer"));
        }
        file.seek(SeekFrom::Start(end - RECORD_HEADER_SIZE))?;
        let len = read_record_len(file)? as u64;
        let record_end = end - RECORD_HEADER_SIZE;
        if len > record_end - RECORD_HEADER_SIZE {
            return Err(QueueError::corrupt(&self.path, end, "record exceeds the file"));
        }
        let start = record_end - len;
        file.seek(SeekFrom::Start(start))?;
        let mut data = vec![0u8; len as usize];
        file.read_exact(&mut data).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => {
                QueueError::corrupt(&self.path, start, "truncated record payload")
            }
            _ => err.into(),
        })?;
        Ok(Some((data, start)))
    }

    fn write_count(&mut self) -> Result<(), QueueError> {
        let count = u32::try_from(self.size).map_err(|_| QueueError::CapacityExceeded(self.size))?;
        let file = self.file.as_mut().ok_or(QueueError::Closed)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_u32::<BigEndian>(count)?;
        Ok(())
    }
}

impl Queue<Vec<u8>> for LifoDiskQueue {
    fn push(&mut self, value: Vec<u8>) -> Result<(), QueueError> {
        let len = u32::try_from(value.len()).map_err(|_| QueueError::RecordTooLarge(value.len()))?;
        if self.size >= u32::MAX as usize {
            return Err(QueueError::CapacityExceeded(self.size));
        }
        let file = self.file.as_mut().ok_or(QueueError::Closed)?;
        let mut record = value;
        record.write_u32::<BigEndian>(len)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&record)?;
        self.size += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        if self.file.is_none() {
            return Err(QueueError::Closed);
        }
        match self.read_last()? {
            None => Ok(None),
            Some((data, start)) => {
                if let Some(file) = self.file.as_mut() {
                    file.set_len(start)?;
                }
                self.size -= 1;
                Ok(Some(data))
            }
        }
    }

    fn peek(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        if self.file.is_none() {
            return Err(QueueError::Closed);
        }
        Ok(self.read_last()?.map(|(data, _)| data))
    }

    #[inline]
    fn len(&self) -> usize {
        self.size
    }

    fn flush(&mut self) -> Result<(), QueueError> {
        self.write_count()?;
        if let Some(file) = self.file.as_mut() {
            file.sync_data()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), QueueError> {
        if self.file.is_none() {
            return Ok(());
        }
        if self.size > 0 {
            self.write_count()?;
            if let Some(file) = self.file.take() {
                file.sync_all()?;
            }
            log::trace!("Close lifo queue at {} with {} elements", self.path, self.size);
        } else {
            self.file = None;
            log::debug!("Remove the empty lifo queue at {}", self.path);
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for LifoDiskQueue {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Failed to close the lifo queue at {}: {err}", self.path);
        }
    }
}
