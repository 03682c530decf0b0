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

//! Full record batch codec: header, records, CRC and length.
//!
//! The length and CRC are handled with pending fields, so both are verified
//! on decode and back-patched on encode. Payloads of compressed batches are
//! carried through untouched.

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use integer_encoding::VarInt;

use super::batch_header::RecordBatchHeader;
use super::compression::CompressionCodec;
use super::constants::*;
use super::record::{Record, RecordHeader};
use super::timestamp;
use crate::protocol::{
    with_pos_saver, BufferDecoder, BufferEncoder, FieldKind, PacketDecoder, PacketEncoder,
};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRecords {
    Decoded(Vec<Record>),
    /// still compressed with the header's codec
    Compressed(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    pub header: RecordBatchHeader,
    pub records: BatchRecords,
    /// bytes the batch occupies on the wire, header included
    pub raw_batch_length: usize,
}

impl RecordBatch {
    /// Decodes one whole batch, verifying its length field and CRC. On any
    /// failure the decoder is left where the batch started.
    pub fn decode<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<Self> {
        with_pos_saver(pd, |pd| {
            let first_offset = pd.get_i64()?;
            let batch_len = pd.push(FieldKind::Length)? as i32;
            let partition_leader_epoch = pd.get_i32()?;
            let version = pd.get_i8()?;
            if version != MAGIC {
                return Err(AppError::PacketDecoding(format!(
                    "unsupported record batch version ({})",
                    version
                )));
            }
            pd.push(FieldKind::Crc32c)?;
            let header = RecordBatchHeader::decode_after_crc(
                pd,
                first_offset,
                batch_len,
                partition_leader_epoch,
                version,
            )?;
            if header.record_len < 0 {
                return Err(AppError::InvalidByteSliceLength(header.record_len as i64));
            }
            let payload = pd.get_raw_bytes(header.record_len as usize)?;
            pd.pop()?;
            pd.pop()?;

            let records = match header.codec.check_known()? {
                CompressionCodec::None => {
                    BatchRecords::Decoded(decode_records(payload, header.record_size)?)
                }
                _ => BatchRecords::Compressed(payload),
            };

            Ok(RecordBatch {
                raw_batch_length: batch_len as usize + LOG_OVERHEAD,
                header,
                records,
            })
        })
    }

    /// Encodes the batch, computing length, CRC and (for uncompressed batches)
    /// the record count from the records themselves.
    pub fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) -> AppResult<()> {
        self.header.check_version()?;
        if let CompressionCodec::Unknown(bits) = self.header.codec {
            return Err(AppError::PacketEncoding(format!(
                "unknown compression codec: {}",
                bits
            )));
        }
        let first_timestamp = timestamp::to_millis(self.header.first_timestamp)?;
        let max_timestamp = timestamp::to_millis(self.header.max_timestamp)?;

        let (record_size, payload) = match &self.records {
            BatchRecords::Decoded(records) => {
                let count = i32::try_from(records.len()).map_err(|_| {
                    AppError::PacketEncoding(format!("too many records: {}", records.len()))
                })?;
                let mut body = BufferEncoder::new();
                for record in records {
                    record.encode(&mut body)?;
                }
                (count, body.into_bytes()?)
            }
            BatchRecords::Compressed(raw) => (self.header.record_size, raw.clone()),
        };

        pe.put_i64(self.header.first_offset);
        pe.push(FieldKind::Length);
        pe.put_i32(self.header.partition_leader_epoch);
        pe.put_i8(self.header.version);
        pe.push(FieldKind::Crc32c);
        self.header
            .encode_after_crc(pe, first_timestamp, max_timestamp, record_size);
        pe.put_raw_bytes(&payload);
        pe.pop()?;
        pe.pop()
    }

    pub fn to_bytes(&self) -> AppResult<Bytes> {
        let mut pe = BufferEncoder::with_capacity(RECORD_BATCH_HEADER_SIZE);
        self.encode(&mut pe)?;
        pe.into_bytes()
    }

    /// Decoded records, empty for compressed batches.
    pub fn records(&self) -> &[Record] {
        match &self.records {
            BatchRecords::Decoded(records) => records,
            BatchRecords::Compressed(_) => &[],
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.records, BatchRecords::Compressed(_))
    }
}

fn decode_records(payload: Bytes, count: i32) -> AppResult<Vec<Record>> {
    let mut pd = BufferDecoder::new(payload);
    let mut records = Vec::with_capacity(count.clamp(0, 1024) as usize);
    for _ in 0..count.max(0) {
        records.push(Record::decode(&mut pd)?);
    }
    let trailing = pd.remaining()?;
    if trailing != 0 {
        return Err(AppError::PacketDecoding(format!(
            "{} bytes left after {} records",
            trailing, count
        )));
    }
    Ok(records)
}

/// Assembles an uncompressed batch record by record.
pub struct RecordBatchBuilder {
    base_offset: Option<i64>,
    last_offset: i64,
    base_timestamp: Option<DateTime<Utc>>,
    max_timestamp: Option<DateTime<Utc>>,
    partition_leader_epoch: i32,
    records: Vec<Record>,
}

impl Default for RecordBatchBuilder {
    fn default() -> Self {
        RecordBatchBuilder {
            base_offset: None,
            last_offset: 0,
            base_timestamp: None,
            max_timestamp: None,
            partition_leader_epoch: NO_PARTITION_LEADER_EPOCH,
            records: Vec::new(),
        }
    }
}

impl RecordBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_leader_epoch(mut self, epoch: i32) -> Self {
        self.partition_leader_epoch = epoch;
        self
    }

    fn next_offset(&self) -> i64 {
        match self.base_offset {
            None => 0,
            Some(_) => self.last_offset + 1,
        }
    }

    /// Appends a record. A missing offset continues from the previous one; a
    /// missing timestamp uses the current time. Timestamps keep millisecond
    /// precision, as on the wire.
    pub fn append_record<K: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        offset: Option<i64>,
        timestamp: Option<DateTime<Utc>>,
        key: Option<K>,
        value: Option<V>,
        headers: Vec<RecordHeader>,
    ) -> &mut Self {
        let offset = offset.unwrap_or_else(|| self.next_offset());
        let base_offset = *self.base_offset.get_or_insert(offset);
        self.last_offset = offset;

        let timestamp = timestamp.unwrap_or_else(Utc::now).trunc_subsecs(3);
        let base_timestamp = *self.base_timestamp.get_or_insert(timestamp);
        if self.max_timestamp.map_or(true, |max| timestamp > max) {
            self.max_timestamp = Some(timestamp);
        }

        self.records.push(Record {
            attributes: 0,
            timestamp_delta: (timestamp - base_timestamp).num_milliseconds(),
            offset_delta: offset - base_offset,
            key: key.map(|k| Bytes::copy_from_slice(k.as_ref())),
            value: value.map(|v| Bytes::copy_from_slice(v.as_ref())),
            headers,
        });
        self
    }

    pub fn append_value<V: AsRef<[u8]>>(&mut self, offset: i64, value: V) -> &mut Self {
        self.append_record(Some(offset), None, None::<&[u8]>, Some(value), Vec::new())
    }

    pub fn build(&mut self) -> AppResult<RecordBatch> {
        let records = std::mem::take(&mut self.records);
        let base_offset = self.base_offset.take().unwrap_or(0);
        let payload_len: usize = records
            .iter()
            .map(|r| {
                let size = r.size();
                (size as i64).required_space() + size
            })
            .sum();
        let record_len = i32::try_from(payload_len)
            .map_err(|_| AppError::PacketEncoding(format!("batch too large: {}", payload_len)))?;

        let header = RecordBatchHeader {
            first_offset: base_offset,
            record_len,
            partition_leader_epoch: self.partition_leader_epoch,
            last_offset_delta: (self.last_offset - base_offset) as i32,
            first_timestamp: self.base_timestamp.take(),
            max_timestamp: self.max_timestamp.take(),
            record_size: records.len() as i32,
            ..Default::default()
        };
        self.last_offset = 0;
        Ok(RecordBatch {
            raw_batch_length: header.raw_batch_length(),
            header,
            records: BatchRecords::Decoded(records),
        })
    }
}
