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

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, Utc};

use super::compression::CompressionCodec;
use super::constants::*;
use super::timestamp;
use crate::protocol::{with_pos_saver, PacketDecoder, PacketEncoder};
use crate::{AppError, AppResult};

/// The fixed 61 byte prefix of a record batch, with attributes unpacked.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RecordBatchHeader {
    pub first_offset: i64,
    /// wire batch length minus [`RECORD_BATCH_OVERHEAD`]: bytes of record payload
    pub record_len: i32,
    pub partition_leader_epoch: i32,
    pub version: i8,
    pub codec: CompressionCodec,
    pub control: bool,
    pub log_append_time: bool,
    pub is_transactional: bool,
    pub last_offset_delta: i32,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub max_timestamp: Option<DateTime<Utc>>,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub first_sequence: i32,
    /// record count; `-1` when unknown
    pub record_size: i32,
}

impl Default for RecordBatchHeader {
    fn default() -> Self {
        RecordBatchHeader {
            first_offset: 0,
            record_len: 0,
            partition_leader_epoch: NO_PARTITION_LEADER_EPOCH,
            version: MAGIC,
            codec: CompressionCodec::None,
            control: false,
            log_append_time: false,
            is_transactional: false,
            last_offset_delta: 0,
            first_timestamp: None,
            max_timestamp: None,
            producer_id: NO_PRODUCER_ID,
            producer_epoch: NO_PRODUCER_EPOCH,
            first_sequence: NO_SEQUENCE,
            record_size: 0,
        }
    }
}

impl RecordBatchHeader {
    /// Reads the header in wire order. The CRC is read and discarded and the
    /// version is taken as found.
    pub fn decode<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<Self> {
        with_pos_saver(pd, |pd| {
            let first_offset = pd.get_i64()?;
            let batch_len = pd.get_i32()?;
            let partition_leader_epoch = pd.get_i32()?;
            let version = pd.get_i8()?;
            let _crc = pd.get_i32()?;
            Self::decode_after_crc(pd, first_offset, batch_len, partition_leader_epoch, version)
        })
    }

    /// Reads attributes through record count, the part of the header after
    /// the CRC slot.
    pub(crate) fn decode_after_crc<D: PacketDecoder + ?Sized>(
        pd: &mut D,
        first_offset: i64,
        batch_len: i32,
        partition_leader_epoch: i32,
        version: i8,
    ) -> AppResult<Self> {
        let attributes = pd.get_i16()?;
        let codec = CompressionCodec::from((attributes & COMPRESSION_CODEC_MASK) as i8);
        let last_offset_delta = pd.get_i32()?;
        let first_timestamp = timestamp::decode(pd)?;
        let max_timestamp = timestamp::decode(pd)?;
        let producer_id = pd.get_i64()?;
        let producer_epoch = pd.get_i16()?;
        let first_sequence = pd.get_i32()?;
        let record_size = pd.get_array_length()?;

        Ok(RecordBatchHeader {
            first_offset,
            record_len: batch_len.saturating_sub(RECORD_BATCH_OVERHEAD),
            partition_leader_epoch,
            version,
            codec,
            control: attributes & CONTROL_MASK != 0,
            log_append_time: attributes & TIMESTAMP_TYPE_MASK != 0,
            is_transactional: attributes & TRANSACTIONAL_MASK != 0,
            last_offset_delta,
            first_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            first_sequence,
            record_size,
        })
    }

    /// Writes the header. The length is derived from `record_len` and the CRC
    /// is left as zero for whoever wraps the payload to fill in.
    pub fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) -> AppResult<()> {
        self.check_version()?;
        let batch_len = RECORD_BATCH_OVERHEAD
            .checked_add(self.record_len)
            .ok_or_else(|| {
                AppError::PacketEncoding(format!("record length overflow: {}", self.record_len))
            })?;
        let first_timestamp = timestamp::to_millis(self.first_timestamp)?;
        let max_timestamp = timestamp::to_millis(self.max_timestamp)?;

        pe.put_i64(self.first_offset);
        pe.put_i32(batch_len);
        pe.put_i32(self.partition_leader_epoch);
        pe.put_i8(self.version);
        pe.put_i32(0);
        self.encode_after_crc(pe, first_timestamp, max_timestamp, self.record_size);
        Ok(())
    }

    pub(crate) fn encode_after_crc<E: PacketEncoder + ?Sized>(
        &self,
        pe: &mut E,
        first_timestamp: i64,
        max_timestamp: i64,
        record_size: i32,
    ) {
        pe.put_i16(self.compute_attributes());
        pe.put_i32(self.last_offset_delta);
        pe.put_i64(first_timestamp);
        pe.put_i64(max_timestamp);
        pe.put_i64(self.producer_id);
        pe.put_i16(self.producer_epoch);
        pe.put_i32(self.first_sequence);
        pe.put_i32(record_size);
    }

    pub(crate) fn check_version(&self) -> AppResult<()> {
        if self.version != MAGIC {
            return Err(AppError::PacketEncoding(format!(
                "unsupported record batch version ({})",
                self.version
            )));
        }
        Ok(())
    }

    pub fn compute_attributes(&self) -> i16 {
        let mut attributes = (self.codec.bits() as i16) & COMPRESSION_CODEC_MASK;
        if self.control {
            attributes |= CONTROL_MASK;
        }
        if self.log_append_time {
            attributes |= TIMESTAMP_TYPE_MASK;
        }
        if self.is_transactional {
            attributes |= TRANSACTIONAL_MASK;
        }
        attributes
    }

    /// Offset of the last record the batch claims to hold.
    pub fn last_offset(&self) -> i64 {
        self.first_offset + self.last_offset_delta as i64
    }

    /// Bytes the whole batch occupies, header included.
    pub fn raw_batch_length(&self) -> usize {
        (self.record_len as i64 + RECORD_BATCH_OVERHEAD as i64 + LOG_OVERHEAD as i64).max(0)
            as usize
    }
}

impl Display for RecordBatchHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let first_timestamp = self.first_timestamp.map(|t| t.with_timezone(&Local));
        let max_timestamp = self.max_timestamp.map(|t| t.with_timezone(&Local));
        f.debug_struct("RecordBatchHeader")
            .field("first_offset", &self.first_offset)
            .field("record_len", &self.record_len)
            .field("partition_leader_epoch", &self.partition_leader_epoch)
            .field("version", &self.version)
            .field("codec", &self.codec.to_string())
            .field("control", &self.control)
            .field("log_append_time", &self.log_append_time)
            .field("is_transactional", &self.is_transactional)
            .field("last_offset_delta", &self.last_offset_delta)
            .field("first_timestamp", &first_timestamp)
            .field("max_timestamp", &max_timestamp)
            .field("producer_id", &self.producer_id)
            .field("producer_epoch", &self.producer_epoch)
            .field("first_sequence", &self.first_sequence)
            .field("record_size", &self.record_size)
            .finish()
    }
}
