// Copyright 2025 jonefeewang@gmail.com
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

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use super::decoder::{Mark, PacketDecoder};
use super::field::{FieldKind, PendingField};
use crate::log::direct_io::{open_file, read_only};
use crate::service::{MetricsRegistry, DEFAULT_MAX_RESPONSE_SIZE};
use crate::{AppError, AppResult};

const METRIC_LABEL: &str = "file";

/// A [`PacketDecoder`] reading straight from an open file.
///
/// The cursor is the file's own position. Reads that fail put it back where it
/// was, so a reader tailing a segment that is still being written can retry the
/// same call once more bytes land.
#[derive(Debug)]
pub struct FileDecoder {
    file: File,
    path: PathBuf,
    /// pending fields with their absolute slot positions and stored values
    stack: Vec<(PendingField, u32)>,
    registry: Option<Arc<MetricsRegistry>>,
    max_response_size: i32,
}

impl FileDecoder {
    /// Opens `path` read-only, bypassing the page cache when `direct` is set.
    ///
    /// On Linux a direct handle only accepts reads whose buffer, offset and
    /// length are aligned to [`crate::log::ALIGN_SIZE`]. The small field reads
    /// this decoder issues are not, so most filesystems fail them with `EINVAL`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        direct: bool,
        registry: Option<Arc<MetricsRegistry>>,
    ) -> AppResult<Self> {
        let path = path.as_ref();
        let file = open_file(path, direct, read_only(), 0o600)?;
        trace!("opened {} for decoding, direct: {}", path.display(), direct);
        Ok(Self::from_file(file, path, registry))
    }

    pub fn from_file<P: AsRef<Path>>(
        file: File,
        path: P,
        registry: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        FileDecoder {
            file,
            path: path.as_ref().to_path_buf(),
            stack: Vec::new(),
            registry,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    pub fn with_max_response_size(mut self, max_response_size: i32) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&mut self) -> AppResult<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Moves the cursor to an absolute file offset and drops pending fields.
    pub fn seek_to(&mut self, position: u64) -> AppResult<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.stack.clear();
        Ok(())
    }

    /// Fills `buf` from the current position. Interrupted reads are retried and
    /// end of file is reported as missing data.
    fn fill(&mut self, buf: &mut [u8]) -> AppResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => return Err(AppError::InsufficientData),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Reads `length` bytes at an absolute position and returns to where the
    /// cursor was.
    fn read_at(&mut self, position: u64, length: usize) -> AppResult<Bytes> {
        let mark = self.mark()?;
        let read = self
            .file
            .seek(SeekFrom::Start(position))
            .map_err(AppError::from)
            .and_then(|_| {
                let mut buf = BytesMut::zeroed(length);
                self.fill(&mut buf)?;
                Ok(buf.freeze())
            });
        let restored = self.file.seek(SeekFrom::Start(mark.position as u64));
        match (read, restored) {
            (Ok(bytes), Ok(_)) => Ok(bytes),
            (Err(e), Ok(_)) => Err(e),
            (Ok(_), Err(restore)) => Err(restore.into()),
            (Err(e), Err(restore)) => Err(AppError::PositionRestore {
                cause: Box::new(e),
                restore,
            }),
        }
    }

    fn record_bytes_read(&self, bytes: usize) {
        if let Some(registry) = &self.registry {
            registry.record_bytes_read(METRIC_LABEL, bytes);
        }
    }
}

impl PacketDecoder for FileDecoder {
    fn get_raw_bytes(&mut self, length: usize) -> AppResult<Bytes> {
        if length > self.max_response_size.max(0) as usize {
            return Err(AppError::InvalidByteSliceLength(length as i64));
        }
        if length > self.remaining()? {
            return Err(AppError::InsufficientData);
        }
        let start = self.file.stream_position()?;
        let mut buf = BytesMut::zeroed(length);
        if let Err(e) = self.fill(&mut buf) {
            return match self.file.seek(SeekFrom::Start(start)) {
                Ok(_) => Err(e),
                Err(restore) => Err(AppError::PositionRestore {
                    cause: Box::new(e),
                    restore,
                }),
            };
        }
        self.record_bytes_read(length);
        Ok(buf.freeze())
    }

    fn peek_bytes(&mut self, offset: usize, length: usize) -> AppResult<Bytes> {
        let needed = offset
            .checked_add(length)
            .ok_or(AppError::InsufficientData)?;
        if needed > self.remaining()? {
            return Err(AppError::InsufficientData);
        }
        let start = self.file.stream_position()? + offset as u64;
        self.read_at(start, length)
    }

    fn remaining(&self) -> AppResult<usize> {
        let mut file = &self.file;
        let len = file.metadata()?.len();
        let position = file.stream_position()?;
        Ok(len.saturating_sub(position) as usize)
    }

    fn mark(&mut self) -> AppResult<Mark> {
        Ok(Mark {
            position: self.file.stream_position()? as usize,
            pending: self.stack.len(),
        })
    }

    fn reset(&mut self, mark: Mark) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(mark.position as u64))?;
        self.stack.truncate(mark.pending);
        if let Some(registry) = &self.registry {
            registry.record_rollback(METRIC_LABEL);
        }
        debug!(
            "rolled {} back to position {}",
            self.path.display(),
            mark.position
        );
        Ok(())
    }

    fn push(&mut self, kind: FieldKind) -> AppResult<u32> {
        let start = self.file.stream_position()? as usize;
        let stored = self.get_i32()? as u32;
        self.stack.push((PendingField::new(kind, start), stored));
        Ok(stored)
    }

    fn pop(&mut self) -> AppResult<()> {
        let (field, stored) = self
            .stack
            .pop()
            .ok_or_else(|| AppError::PacketDecoding("pop without a matching push".to_string()))?;
        let end = self.file.stream_position()? as usize;
        let from = field.covered_from();
        let covered = self.read_at(from as u64, end.saturating_sub(from))?;
        if let Err(e) = field.check(stored, &covered) {
            self.stack.push((field, stored));
            return Err(e);
        }
        Ok(())
    }

    fn max_response_size(&self) -> i32 {
        self.max_response_size
    }

    fn metric_registry(&self) -> Option<&Arc<MetricsRegistry>> {
        self.registry.as_ref()
    }

    fn skip(&mut self, length: usize) -> AppResult<()> {
        if length > self.remaining()? {
            return Err(AppError::InsufficientData);
        }
        self.file.seek(SeekFrom::Current(length as i64))?;
        Ok(())
    }
}
