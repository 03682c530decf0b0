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

use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::message::{RecordBatch, RecordBatchHeader};
use crate::protocol::{with_pos_saver, FileDecoder, PacketDecoder};
use crate::service::MetricsRegistry;
use crate::{AppError, AppResult};

/// Reads record batches straight out of a log segment file.
///
/// End of file between batches is the end of the stream. A batch cut short by
/// the end of file fails with [`AppError::InsufficientData`] and leaves the
/// reader in front of it, so a reader tailing an active segment can call again
/// once the writer has appended more bytes.
#[derive(Debug)]
pub struct SegmentReader {
    decoder: FileDecoder,
}

impl SegmentReader {
    /// Opens a segment for reading. With `direct` set on Linux, reads need the
    /// alignment described on [`FileDecoder::open`], so unaligned header reads
    /// may fail with `EINVAL`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        direct: bool,
        registry: Option<Arc<MetricsRegistry>>,
    ) -> AppResult<Self> {
        Ok(SegmentReader {
            decoder: FileDecoder::open(path, direct, registry)?,
        })
    }

    pub fn from_decoder(decoder: FileDecoder) -> Self {
        SegmentReader { decoder }
    }

    pub fn decoder(&self) -> &FileDecoder {
        &self.decoder
    }

    pub fn position(&mut self) -> AppResult<u64> {
        self.decoder.position()
    }

    /// Decodes the next batch with its records.
    pub fn next_batch(&mut self) -> AppResult<Option<RecordBatch>> {
        if self.decoder.remaining()? == 0 {
            return Ok(None);
        }
        RecordBatch::decode(&mut self.decoder).map(Some)
    }

    /// Decodes only the next header and skips over the batch payload.
    pub fn next_header(&mut self) -> AppResult<Option<RecordBatchHeader>> {
        if self.decoder.remaining()? == 0 {
            return Ok(None);
        }
        with_pos_saver(&mut self.decoder, |pd| {
            let header = RecordBatchHeader::decode(pd)?;
            if header.record_len < 0 {
                return Err(AppError::InvalidByteSliceLength(header.record_len as i64));
            }
            pd.skip(header.record_len as usize)?;
            Ok(Some(header))
        })
    }

    /// Moves to the start of the batch holding `target_offset`, walking headers
    /// from the current position. Returns the file position of that batch, or
    /// `None` if the segment ends first (the reader is then at end of file).
    pub fn seek_to_offset(&mut self, target_offset: i64) -> AppResult<Option<u64>> {
        loop {
            let position = self.decoder.position()?;
            match self.next_header()? {
                None => return Ok(None),
                Some(header) if header.last_offset() >= target_offset => {
                    self.decoder.seek_to(position)?;
                    trace!(
                        "offset {} found in batch at position {} of {}",
                        target_offset,
                        position,
                        self.decoder.path().display()
                    );
                    return Ok(Some(position));
                }
                Some(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordBatchBuilder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_segment(file: &mut NamedTempFile, first_offsets: &[i64]) -> AppResult<Vec<u64>> {
        let mut positions = Vec::new();
        let mut position = 0u64;
        for &offset in first_offsets {
            let mut builder = RecordBatchBuilder::new();
            builder
                .append_value(offset, "a")
                .append_value(offset + 1, "b");
            let raw = builder.build()?.to_bytes()?;
            file.write_all(&raw)?;
            positions.push(position);
            position += raw.len() as u64;
        }
        file.flush()?;
        Ok(positions)
    }

    #[test]
    fn test_reads_batches_until_eof() -> AppResult<()> {
        let mut temp = NamedTempFile::new()?;
        write_segment(&mut temp, &[0, 2, 4])?;

        let mut reader = SegmentReader::open(temp.path(), false, None)?;
        let mut first_offsets = Vec::new();
        while let Some(batch) = reader.next_batch()? {
            assert_eq!(batch.records().len(), 2);
            first_offsets.push(batch.header.first_offset);
        }
        assert_eq!(first_offsets, vec![0, 2, 4]);
        assert!(reader.next_batch()?.is_none());
        Ok(())
    }

    #[test]
    fn test_headers_skip_payload() -> AppResult<()> {
        let mut temp = NamedTempFile::new()?;
        write_segment(&mut temp, &[10, 12])?;

        let mut reader = SegmentReader::open(temp.path(), false, None)?;
        let first = reader.next_header()?.expect("header");
        let second = reader.next_header()?.expect("header");
        assert_eq!(first.first_offset, 10);
        assert_eq!(second.last_offset(), 13);
        assert!(reader.next_header()?.is_none());
        Ok(())
    }

    #[test]
    fn test_seek_to_offset() -> AppResult<()> {
        let mut temp = NamedTempFile::new()?;
        let positions = write_segment(&mut temp, &[0, 2, 4])?;

        let mut reader = SegmentReader::open(temp.path(), false, None)?;
        assert_eq!(reader.seek_to_offset(3)?, Some(positions[1]));
        assert_eq!(reader.next_batch()?.expect("batch").header.first_offset, 2);

        assert_eq!(reader.seek_to_offset(100)?, None);
        Ok(())
    }

    #[test]
    fn test_partial_tail_can_be_retried() -> AppResult<()> {
        let mut builder = RecordBatchBuilder::new();
        builder.append_value(0, "tail");
        let raw = builder.build()?.to_bytes()?;

        let mut temp = NamedTempFile::new()?;
        temp.write_all(&raw[..30])?;
        temp.flush()?;

        let mut reader = SegmentReader::open(temp.path(), false, None)?;
        assert!(matches!(
            reader.next_batch(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(reader.position()?, 0);

        temp.write_all(&raw[30..])?;
        temp.flush()?;
        let batch = reader.next_batch()?.expect("batch");
        assert_eq!(batch.records()[0].value.as_deref(), Some(&b"tail"[..]));
        Ok(())
    }
}
