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

use std::time::Duration;

use bytes::{Buf, Bytes};
use tracing::debug;

use super::errors::KafkaCode;
use super::fetch::MAX_FETCH_VERSION;
use crate::message::constants::{LENGTH_OFFSET, LOG_OVERHEAD};
use crate::message::{RecordBatch, RecordBatchReader};
use crate::protocol::{with_pos_saver, PacketDecoder, PacketEncoder};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponseBlock {
    pub partition: i32,
    pub error: KafkaCode,
    pub high_water_mark: i64,
    /// version 4 and later, otherwise -1
    pub last_stable_offset: i64,
    /// version 5 and later, otherwise -1
    pub log_start_offset: i64,
    pub aborted_transactions: Vec<AbortedTransaction>,
    /// version 11 and later, otherwise -1
    pub preferred_read_replica: i32,
    /// batches exactly as the broker sent them
    pub records: Bytes,
}

/// Batches decoded out of one response block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedRecords {
    pub batches: Vec<RecordBatch>,
    /// the broker cut the last batch short at the partition's byte limit
    pub partial_trailing: bool,
}

impl FetchResponseBlock {
    /// Decodes the block's batches. A final batch whose declared length runs
    /// past the end of the block is dropped and flagged instead of failing the
    /// whole block; any other error fails, including missing data inside a
    /// batch that is fully present.
    pub fn record_batches(&self) -> AppResult<DecodedRecords> {
        let mut reader = RecordBatchReader::new(self.records.clone());
        let mut decoded = DecodedRecords::default();
        loop {
            match reader.next_batch() {
                Ok(Some(batch)) => decoded.batches.push(batch),
                Ok(None) => break,
                Err(e) if e.is_insufficient_data() && !self.runs_past_end(reader.offset()) => {
                    return Err(AppError::PacketDecoding(format!(
                        "partition {}: batch at byte {} is short of its own length: {}",
                        self.partition,
                        reader.offset(),
                        e
                    )));
                }
                Err(e) if e.is_insufficient_data() => {
                    debug!(
                        "partition {}: dropping partial batch at byte {} of {}",
                        self.partition,
                        reader.offset(),
                        self.records.len()
                    );
                    decoded.partial_trailing = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(decoded)
    }

    /// True when the batch starting at `offset` claims more bytes than remain,
    /// or when not even its length field is present.
    fn runs_past_end(&self, offset: usize) -> bool {
        let rest = self.records.get(offset..).unwrap_or_default();
        if rest.len() < LOG_OVERHEAD {
            return true;
        }
        let mut length_field = &rest[LENGTH_OFFSET..LOG_OVERHEAD];
        let batch_len = length_field.get_i32();
        LOG_OVERHEAD as i64 + batch_len as i64 > rest.len() as i64
    }

    fn decode<D: PacketDecoder + ?Sized>(pd: &mut D, version: i16) -> AppResult<Self> {
        let partition = pd.get_i32()?;
        let error = KafkaCode::from(pd.get_i16()?);
        let high_water_mark = pd.get_i64()?;

        let mut last_stable_offset = -1;
        let mut log_start_offset = -1;
        let mut aborted_transactions = Vec::new();
        if version >= 4 {
            last_stable_offset = pd.get_i64()?;
            if version >= 5 {
                log_start_offset = pd.get_i64()?;
            }
            let count = pd.get_array_length()?;
            for _ in 0..count.max(0) {
                aborted_transactions.push(AbortedTransaction {
                    producer_id: pd.get_i64()?,
                    first_offset: pd.get_i64()?,
                });
            }
        }

        let preferred_read_replica = if version >= 11 { pd.get_i32()? } else { -1 };
        let records = pd.get_bytes()?.unwrap_or_default();

        Ok(FetchResponseBlock {
            partition,
            error,
            high_water_mark,
            last_stable_offset,
            log_start_offset,
            aborted_transactions,
            preferred_read_replica,
            records,
        })
    }

    fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E, version: i16) -> AppResult<()> {
        pe.put_i32(self.partition);
        pe.put_i16(self.error.code());
        pe.put_i64(self.high_water_mark);
        if version >= 4 {
            pe.put_i64(self.last_stable_offset);
            if version >= 5 {
                pe.put_i64(self.log_start_offset);
            }
            pe.put_array_length(self.aborted_transactions.len())?;
            for txn in &self.aborted_transactions {
                pe.put_i64(txn.producer_id);
                pe.put_i64(txn.first_offset);
            }
        }
        if version >= 11 {
            pe.put_i32(self.preferred_read_replica);
        }
        pe.put_bytes(Some(self.records.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponseTopic {
    pub topic: String,
    pub partitions: Vec<FetchResponseBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub version: i16,
    /// version 1 and later
    pub throttle_time: Duration,
    /// version 7 and later
    pub error: Option<KafkaCode>,
    /// version 7 and later
    pub session_id: i32,
    pub topics: Vec<FetchResponseTopic>,
}

impl FetchResponse {
    /// Decodes a response body of the given version. The decoder is left
    /// untouched if anything fails.
    pub fn decode<D: PacketDecoder + ?Sized>(pd: &mut D, version: i16) -> AppResult<Self> {
        if !(0..=MAX_FETCH_VERSION).contains(&version) {
            return Err(AppError::PacketDecoding(format!(
                "unsupported fetch response version {}",
                version
            )));
        }
        with_pos_saver(pd, |pd| {
            let mut response = FetchResponse {
                version,
                ..Default::default()
            };
            if version >= 1 {
                let throttle_ms = pd.get_i32()?;
                response.throttle_time = Duration::from_millis(throttle_ms.max(0) as u64);
            }
            if version >= 7 {
                response.error = Some(KafkaCode::from(pd.get_i16()?));
                response.session_id = pd.get_i32()?;
            }

            let topic_count = pd.get_array_length()?;
            for _ in 0..topic_count.max(0) {
                let topic = pd.get_string()?;
                let partition_count = pd.get_array_length()?;
                let mut partitions = Vec::with_capacity(partition_count.clamp(0, 1024) as usize);
                for _ in 0..partition_count.max(0) {
                    partitions.push(FetchResponseBlock::decode(pd, version)?);
                }
                response.topics.push(FetchResponseTopic { topic, partitions });
            }
            Ok(response)
        })
    }

    pub fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) -> AppResult<()> {
        if self.version >= 1 {
            let throttle_ms = i32::try_from(self.throttle_time.as_millis()).unwrap_or(i32::MAX);
            pe.put_i32(throttle_ms);
        }
        if self.version >= 7 {
            pe.put_i16(self.error.unwrap_or(KafkaCode::None).code());
            pe.put_i32(self.session_id);
        }
        pe.put_array_length(self.topics.len())?;
        for topic in &self.topics {
            pe.put_string(&topic.topic)?;
            pe.put_array_length(topic.partitions.len())?;
            for block in &topic.partitions {
                block.encode(pe, self.version)?;
            }
        }
        Ok(())
    }

    pub fn block(&self, topic: &str, partition: i32) -> Option<&FetchResponseBlock> {
        self.topics
            .iter()
            .find(|t| t.topic == topic)?
            .partitions
            .iter()
            .find(|b| b.partition == partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::constants::{ATTRIBUTES_OFFSET, CRC_OFFSET, RECORD_COUNT_OFFSET};
    use crate::message::RecordBatchBuilder;
    use crate::protocol::{BufferDecoder, BufferEncoder};
    use bytes::BytesMut;

    fn two_batches() -> AppResult<Bytes> {
        let mut raw = BytesMut::new();
        for base in [0i64, 5] {
            let mut builder = RecordBatchBuilder::new();
            builder.append_value(base, "payload");
            raw.extend_from_slice(&builder.build()?.to_bytes()?);
        }
        Ok(raw.freeze())
    }

    fn response(version: i16, records: Bytes) -> FetchResponse {
        FetchResponse {
            version,
            throttle_time: if version >= 1 {
                Duration::from_millis(20)
            } else {
                Duration::ZERO
            },
            error: (version >= 7).then_some(KafkaCode::None),
            session_id: 0,
            topics: vec![FetchResponseTopic {
                topic: "events".to_string(),
                partitions: vec![FetchResponseBlock {
                    partition: 3,
                    error: KafkaCode::None,
                    high_water_mark: 10,
                    last_stable_offset: if version >= 4 { 9 } else { -1 },
                    log_start_offset: if version >= 5 { 0 } else { -1 },
                    aborted_transactions: if version >= 4 {
                        vec![AbortedTransaction {
                            producer_id: 7,
                            first_offset: 2,
                        }]
                    } else {
                        Vec::new()
                    },
                    preferred_read_replica: if version >= 11 { 1 } else { -1 },
                    records,
                }],
            }],
        }
    }

    #[test]
    fn test_decode_each_version() -> AppResult<()> {
        let records = two_batches()?;
        for version in [0i16, 1, 4, 5, 7, 11] {
            let expected = response(version, records.clone());
            let mut pe = BufferEncoder::new();
            expected.encode(&mut pe)?;
            let mut pd = BufferDecoder::new(pe.into_bytes()?);
            let decoded = FetchResponse::decode(&mut pd, version)?;
            assert_eq!(decoded, expected, "version {}", version);
            assert_eq!(pd.remaining()?, 0);
        }
        Ok(())
    }

    #[test]
    fn test_record_batches_drop_partial_tail() -> AppResult<()> {
        let records = two_batches()?;
        let full = response(4, records.clone());
        let decoded = full.block("events", 3).unwrap().record_batches()?;
        assert_eq!(decoded.batches.len(), 2);
        assert!(!decoded.partial_trailing);

        let cut = response(4, records.slice(..records.len() - 4));
        let decoded = cut.block("events", 3).unwrap().record_batches()?;
        assert_eq!(decoded.batches.len(), 1);
        assert_eq!(decoded.batches[0].header.first_offset, 0);
        assert!(decoded.partial_trailing);
        Ok(())
    }

    #[test]
    fn test_corrupt_batch_is_an_error() -> AppResult<()> {
        let mut records = two_batches()?.to_vec();
        records[30] ^= 0x01;
        let resp = response(4, Bytes::from(records));
        assert!(resp.block("events", 3).unwrap().record_batches().is_err());
        Ok(())
    }

    #[test]
    fn test_short_data_inside_whole_batch_is_an_error() -> AppResult<()> {
        let mut builder = RecordBatchBuilder::new();
        builder.append_value(0, "payload");
        let mut raw = builder.build()?.to_bytes()?.to_vec();
        // claim two records while the payload holds one, keeping the crc valid
        raw[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4].copy_from_slice(&2i32.to_be_bytes());
        let crc = crc32c::crc32c(&raw[ATTRIBUTES_OFFSET..]);
        raw[CRC_OFFSET..ATTRIBUTES_OFFSET].copy_from_slice(&crc.to_be_bytes());

        let resp = response(4, Bytes::from(raw));
        match resp.block("events", 3).unwrap().record_batches() {
            Err(AppError::PacketDecoding(msg)) => assert!(msg.contains("byte 0")),
            other => panic!("expected corruption, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_partial_length_field_is_a_partial_tail() -> AppResult<()> {
        let records = two_batches()?;
        let first_len = RecordBatchReader::new(records.clone())
            .next_batch()?
            .map(|batch| batch.raw_batch_length)
            .unwrap();
        let cut = response(4, records.slice(..first_len + 10));
        let decoded = cut.block("events", 3).unwrap().record_batches()?;
        assert_eq!(decoded.batches.len(), 1);
        assert!(decoded.partial_trailing);
        Ok(())
    }

    #[test]
    fn test_truncated_response_rolls_back() -> AppResult<()> {
        let mut pe = BufferEncoder::new();
        response(5, two_batches()?).encode(&mut pe)?;
        let raw = pe.into_bytes()?;
        let mut pd = BufferDecoder::new(raw.slice(..raw.len() / 2));
        assert!(FetchResponse::decode(&mut pd, 5).is_err());
        assert_eq!(pd.position(), 0);
        Ok(())
    }

    #[test]
    fn test_missing_block() {
        let resp = response(0, Bytes::new());
        assert!(resp.block("events", 9).is_none());
        assert!(resp.block("other", 3).is_none());
    }
}
