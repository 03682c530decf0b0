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

use bytes::Bytes;

use super::record_batch::RecordBatch;
use crate::protocol::BufferDecoder;
use crate::AppResult;

/// Forward-only stream of batches packed back to back in one buffer.
///
/// Each step advances by the batch's full wire length, so payload bytes never
/// have to be walked record by record. Reaching the end of the buffer between
/// batches ends the stream; a batch cut short is an error. After an error the
/// reader yields nothing more. To start over, build a new reader.
#[derive(Debug, Clone)]
pub struct RecordBatchReader {
    raw: Bytes,
    off: usize,
    done: bool,
}

impl RecordBatchReader {
    pub fn new(raw: Bytes) -> Self {
        Self::at(raw, 0)
    }

    pub fn at(raw: Bytes, offset: usize) -> Self {
        RecordBatchReader {
            raw,
            off: offset,
            done: false,
        }
    }

    pub fn offset(&self) -> usize {
        self.off
    }

    pub fn next_batch(&mut self) -> AppResult<Option<RecordBatch>> {
        if self.done || self.off >= self.raw.len() {
            return Ok(None);
        }
        let mut pd = BufferDecoder::at(self.raw.clone(), self.off);
        match RecordBatch::decode(&mut pd) {
            Ok(batch) => {
                self.off += batch.raw_batch_length;
                Ok(Some(batch))
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }
}

impl Iterator for RecordBatchReader {
    type Item = AppResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
