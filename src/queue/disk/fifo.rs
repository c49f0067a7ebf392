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
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;

/// The default number of records in a chunk.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(100_000) };

const INFO_FILE_NAME: &str = "info.json";
const INFO_TMP_FILE_NAME: &str = "info.json.tmp";

/// The persisted offset index of a [FifoDiskQueue].
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct FifoInfo {
    chunksize: usize,
    size: usize,
    /// The read end: chunk, consumed records in the chunk, byte offset of the next record.
    tail: (u64, usize, u64),
    /// The write end: chunk, written records in the chunk.
    head: (u64, usize),
}

impl FifoInfo {
    fn new(chunksize: NonZeroUsize) -> Self {
        Self {
            chunksize: chunksize.get(),
            size: 0,
            tail: (0, 0, 0),
            head: (0, 0),
        }
    }

    #[inline]
    fn has_unread(&self) -> bool {
        (self.tail.0, self.tail.1) < self.head
    }
}

/// A first in, first out queue of byte records stored in a directory.
///
/// Records are appended to chunk files (`q00000`, `q00001`, ...), each record
/// prefixed by its big endian `u32` length. A chunk holds at most `chunksize`
/// records and is deleted as soon as every record in it was consumed.
/// The positions of both ends are kept in `info.json`, written on
/// [Queue::flush] and [Queue::close].
#[derive(Debug)]
pub struct FifoDiskQueue {
    path: Utf8PathBuf,
    info: FifoInfo,
    head_file: Option<File>,
    tail_file: Option<File>,
}

impl FifoDiskQueue {
    /// Opens the queue in the directory at `path`, creating it when missing.
    /// The chunk size of an existing queue wins over `chunk_size`.
    pub fn open<P: AsRef<Utf8Path>>(path: P, chunk_size: NonZeroUsize) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        let info = match Self::load_info(&path)? {
            Some(info) => {
                Self::reconcile(&path, &info)?;
                info
            }
            None => {
                Self::remove_chunks(&path, |_| true)?;
                FifoInfo::new(chunk_size)
            }
        };
        log::trace!("Open fifo queue at {path} with {info:?}");
        let head_file = Self::open_chunk(&path, info.head.0)?;
        let tail_file = Self::open_chunk(&path, info.tail.0)?;
        Ok(Self {
            path,
            info,
            head_file: Some(head_file),
            tail_file: Some(tail_file),
        })
    }

    /// Opens the queue with [DEFAULT_CHUNK_SIZE].
    pub fn open_default<P: AsRef<Utf8Path>>(path: P) -> Result<Self, QueueError> {
        Self::open(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.info.chunksize
    }

    fn info_path(path: &Utf8Path) -> Utf8PathBuf {
        path.join(INFO_FILE_NAME)
    }

    fn chunk_path(path: &Utf8Path, chunk: u64) -> Utf8PathBuf {
        path.join(format!("q{chunk:05}"))
    }

    fn is_chunk_name(name: &str) -> bool {
        Self::chunk_number(name).is_some()
    }

    fn chunk_number(name: &str) -> Option<u64> {
        let digits = name.strip_prefix('q')?;
        if digits.is_empty() || !digits.bytes().all(|value| value.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Removes every chunk file whose number matches `filter`.
    fn remove_chunks<F>(path: &Utf8Path, filter: F) -> Result<(), QueueError>
    where
        F: Fn(u64) -> bool,
    {
        for entry in path.read_dir_utf8()? {
            let entry = entry?;
            if let Some(chunk) = Self::chunk_number(entry.file_name()) {
                if filter(chunk) {
                    log::warn!("Remove the unindexed chunk {}", entry.path());
                    std::fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }

    /// Drops everything written after the index was saved: chunks behind the
    /// write end and records past the indexed ones in the head chunk.
    fn reconcile(path: &Utf8Path, info: &FifoInfo) -> Result<(), QueueError> {
        let head = info.head.0;
        Self::remove_chunks(path, |chunk| chunk > head)?;
        let chunk_path = Self::chunk_path(path, head);
        let file = match OpenOptions::new().read(true).write(true).open(&chunk_path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(&file);
        let mut indexed_len = 0u64;
        for _ in 0..info.head.1 {
            let len = match read_record_len(&mut reader) {
                Ok(len) => len,
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    log::warn!("The chunk {chunk_path} holds fewer records than indexed.");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };
            indexed_len += RECORD_HEADER_SIZE + len as u64;
            reader.seek_relative(len as i64)?;
        }
        drop(reader);
        if indexed_len < file_len {
            log::warn!(
                "Drop {} unindexed bytes at the end of {chunk_path}",
                file_len - indexed_len
            );
            file.set_len(indexed_len)?;
        }
        Ok(())
    }

    fn open_chunk(path: &Utf8Path, chunk: u64) -> Result<File, QueueError> {
        Ok(OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(Self::chunk_path(path, chunk))?)
    }

    fn load_info(path: &Utf8Path) -> Result<Option<FifoInfo>, QueueError> {
        let info_path = Self::info_path(path);
        match File::open(&info_path) {
            Ok(file) => {
                let info: FifoInfo = serde_json::from_reader(BufReader::new(file))?;
                if info.chunksize == 0 {
                    return Err(QueueError::corrupt(info_path, 0, "the chunk size is zero"));
                }
                if info.tail.0 > info.head.0 {
                    return Err(QueueError::corrupt(
                        info_path,
                        0,
                        "the read end is behind the write end",
                    ));
                }
                Ok(Some(info))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save_info(&self) -> Result<(), QueueError> {
        let info_path = Self::info_path(&self.path);
        let tmp_path = self.path.join(INFO_TMP_FILE_NAME);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, &self.info)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(tmp_path, info_path)?;
        Ok(())
    }

    /// Removes every chunk and the index, and the directory if nothing else is left.
    fn cleanup(&self) -> Result<(), QueueError> {
        log::debug!("Remove the empty fifo queue at {}", self.path);
        for entry in self.path.read_dir_utf8()? {
            let entry = entry?;
            let name = entry.file_name();
            if Self::is_chunk_name(name)
                || name == INFO_FILE_NAME
                || name == INFO_TMP_FILE_NAME
            {
                std::fs::remove_file(entry.path())?;
            }
        }
        if self.path.read_dir_utf8()?.next().is_none() {
            std::fs::remove_dir(&self.path)?;
        }
        Ok(())
    }

    /// Reads the record at the read end without moving it.
    fn read_tail(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        if !self.info.has_unread() {
            return Ok(None);
        }
        let (chunk, _, offset) = self.info.tail;
        let file = self.tail_file.as_mut().ok_or(QueueError::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        let chunk_path = || Self::chunk_path(&self.path, chunk);
        let len = read_record_len(file).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => {
                QueueError::corrupt(chunk_path(), offset, "truncated record header")
            }
            _ => err.into(),
        })?;
        let mut data = vec![0u8; len as usize];
        file.read_exact(&mut data).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => {
                QueueError::corrupt(chunk_path(), offset, "truncated record payload")
            }
            _ => err.into(),
        })?;
        Ok(Some(data))
    }

    #[inline]
    fn check_open(&self) -> Result<(), QueueError> {
        if self.head_file.is_none() {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Queue<Vec<u8>> for FifoDiskQueue {
    fn push(&mut self, value: Vec<u8>) -> Result<(), QueueError> {
        self.check_open()?;
        let len = u32::try_from(value.len()).map_err(|_| QueueError::RecordTooLarge(value.len()))?;
        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE as usize + value.len());
        record.write_u32::<BigEndian>(len)?;
        record.extend_from_slice(&value);

        let (mut chunk, mut count) = self.info.head;
        let file = self.head_file.as_mut().ok_or(QueueError::Closed)?;
        file.write_all(&record)?;
        count += 1;
        if count == self.info.chunksize {
            chunk += 1;
            count = 0;
            log::debug!("Start chunk {chunk} in {}", self.path);
            self.head_file = Some(Self::open_chunk(&self.path, chunk)?);
        }
        self.info.head = (chunk, count);
        self.info.size += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        self.check_open()?;
        let data = match self.read_tail()? {
            None => return Ok(None),
            Some(data) => data,
        };
        let (mut chunk, mut count, mut offset) = self.info.tail;
        count += 1;
        offset += RECORD_HEADER_SIZE + data.len() as u64;
        if count == self.info.chunksize && chunk < self.info.head.0 {
            self.tail_file = None;
            let consumed = Self::chunk_path(&self.path, chunk);
            log::debug!("Remove the consumed chunk {consumed}");
            std::fs::remove_file(consumed)?;
            chunk += 1;
            count = 0;
            offset = 0;
            self.tail_file = Some(Self::open_chunk(&self.path, chunk)?);
        }
        self.info.tail = (chunk, count, offset);
        self.info.size -= 1;
        Ok(Some(data))
    }

    fn peek(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        self.check_open()?;
        self.read_tail()
    }

    #[inline]
    fn len(&self) -> usize {
        self.info.size
    }

    fn flush(&mut self) -> Result<(), QueueError> {
        let file = self.head_file.as_mut().ok_or(QueueError::Closed)?;
        file.sync_data()?;
        self.save_info()
    }

    fn close(&mut self) -> Result<(), QueueError> {
        let head_file = match self.head_file.take() {
            None => return Ok(()),
            Some(file) => file,
        };
        self.tail_file = None;
        head_file.sync_all()?;
        drop(head_file);
        if self.info.size == 0 {
            self.cleanup()
        } else {
            log::trace!("Close fifo queue at {} with {:?}", self.path, self.info);
            self.save_info()
        }
    }
}

impl Drop for FifoDiskQueue {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Failed to close the fifo queue at {}: {err}", self.path);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::queue::{FifoDiskQueue, Queue, QueueError};
    use camino_tempfile::Utf8TempDir;
    use std::num::NonZeroUsize;

    fn chunks(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).unwrap()
    }

    #[test]
    fn serves_in_insertion_order() {
        let dir = Utf8TempDir::new().unwrap();
        let mut queue = FifoDiskQueue::open_default(dir.path().join("queue")).unwrap();
        assert_eq!(None, queue.pop().unwrap());
        queue.push(b"first".to_vec()).unwrap();
        queue.push(Vec::new()).unwrap();
        queue.push(b"third".to_vec()).unwrap();
        assert_eq!(3, queue.len());
        assert_eq!(Some(b"first".to_vec()), queue.peek().unwrap());
        assert_eq!(Some(b"first".to_vec()), queue.pop().unwrap());
        assert_eq!(Some(Vec::new()), queue.pop().unwrap());
        assert_eq!(Some(b"third".to_vec()), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn rolls_over_and_removes_consumed_chunks() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open(&path, chunks(2)).unwrap();
        for i in 0u8..5 {
            queue.push(vec![i; i as usize + 1]).unwrap();
        }
        assert!(path.join("q00000").exists());
        assert!(path.join("q00001").exists());
        assert!(path.join("q00002").exists());

        assert_eq!(Some(vec![0]), queue.pop().unwrap());
        assert!(path.join("q00000").exists());
        assert_eq!(Some(vec![1, 1]), queue.pop().unwrap());
        assert!(!path.join("q00000").exists());

        for i in 2u8..5 {
            assert_eq!(Some(vec![i; i as usize + 1]), queue.pop().unwrap());
        }
        assert_eq!(None, queue.pop().unwrap());
        queue.push(b"late".to_vec()).unwrap();
        assert_eq!(Some(b"late".to_vec()), queue.pop().unwrap());
    }

    #[test]
    fn survives_reopening() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open(&path, chunks(3)).unwrap();
        for value in ["a", "b", "c", "d", "e"] {
            queue.push(value.as_bytes().to_vec()).unwrap();
        }
        assert_eq!(Some(b"a".to_vec()), queue.pop().unwrap());
        queue.close().unwrap();
        assert!(path.join("info.json").exists());
        drop(queue);

        let mut queue = FifoDiskQueue::open(&path, chunks(100)).unwrap();
        assert_eq!(3, queue.chunk_size());
        assert_eq!(4, queue.len());
        queue.push(b"f".to_vec()).unwrap();
        let mut found = Vec::new();
        while let Some(value) = queue.pop().unwrap() {
            found.push(String::from_utf8(value).unwrap());
        }
        assert_eq!(vec!["b", "c", "d", "e", "f"], found);
    }

    #[test]
    fn closing_an_empty_queue_removes_the_directory() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open(&path, chunks(2)).unwrap();
        queue.push(b"value".to_vec()).unwrap();
        queue.pop().unwrap();
        queue.close().unwrap();
        assert!(!path.exists());
        assert!(matches!(queue.push(Vec::new()), Err(QueueError::Closed)));
    }

    #[test]
    fn foreign_files_keep_the_directory() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open_default(&path).unwrap();
        std::fs::write(path.join("notes.txt"), "keep me").unwrap();
        queue.close().unwrap();
        assert!(path.join("notes.txt").exists());
        assert!(!path.join("q00000").exists());
        assert!(!path.join("info.json").exists());
    }

    #[test]
    fn flush_persists_the_index() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open_default(&path).unwrap();
        queue.push(b"one".to_vec()).unwrap();
        queue.push(b"two".to_vec()).unwrap();
        queue.flush().unwrap();
        let info: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path.join("info.json")).unwrap())
                .unwrap();
        assert_eq!(2, info["size"]);
        assert_eq!(serde_json::json!([0, 2]), info["head"]);
        assert_eq!(serde_json::json!([0, 0, 0]), info["tail"]);
    }

    #[test]
    fn truncated_chunks_are_reported() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open_default(&path).unwrap();
        queue.push(b"some longer value".to_vec()).unwrap();
        queue.close().unwrap();
        drop(queue);

        let chunk = path.join("q00000");
        let content = std::fs::read(&chunk).unwrap();
        std::fs::write(&chunk, &content[..6]).unwrap();

        let mut queue = FifoDiskQueue::open_default(&path).unwrap();
        assert!(matches!(
            queue.pop(),
            Err(QueueError::CorruptRecord { offset: 0, .. })
        ));
    }

    #[test]
    fn unindexed_chunks_are_dropped_on_open() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open(&path, chunks(2)).unwrap();
        queue.push(b"stale-a".to_vec()).unwrap();
        queue.push(b"stale-b".to_vec()).unwrap();
        queue.push(b"stale-c".to_vec()).unwrap();
        std::mem::forget(queue);

        let mut queue = FifoDiskQueue::open(&path, chunks(2)).unwrap();
        assert_eq!(0, queue.len());
        assert!(!path.join("q00001").exists());
        queue.push(b"fresh".to_vec()).unwrap();
        assert_eq!(Some(b"fresh".to_vec()), queue.pop().unwrap());
        assert_eq!(None, queue.pop().unwrap());
    }

    #[test]
    fn records_after_the_last_flush_are_dropped_on_open() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let mut queue = FifoDiskQueue::open(&path, chunks(3)).unwrap();
        queue.push(b"a".to_vec()).unwrap();
        queue.flush().unwrap();
        queue.push(b"lost-1".to_vec()).unwrap();
        queue.push(b"lost-2".to_vec()).unwrap();
        queue.push(b"lost-3".to_vec()).unwrap();
        std::mem::forget(queue);
        assert!(path.join("q00001").exists());

        let mut queue = FifoDiskQueue::open(&path, chunks(3)).unwrap();
        assert_eq!(1, queue.len());
        assert!(!path.join("q00001").exists());
        queue.push(b"b".to_vec()).unwrap();
        let mut found = Vec::new();
        while let Some(value) = queue.pop().unwrap() {
            found.push(String::from_utf8(value).unwrap());
        }
        assert_eq!(vec!["a", "b"], found);
    }
}
