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

//! Record batch layout constants.
//!
//! A batch on the wire or on disk is:
//!
//! - first offset (8 bytes)
//! - length (4 bytes), counting everything after itself
//! - partition leader epoch (4 bytes)
//! - magic (1 byte)
//! - crc (4 bytes), CRC-32C from attributes to the end of the batch
//! - attributes (2 bytes)
//! - last offset delta (4 bytes)
//! - first timestamp (8 bytes)
//! - max timestamp (8 bytes)
//! - producer id (8 bytes)
//! - producer epoch (2 bytes)
//! - first sequence (4 bytes)
//! - record count (4 bytes)
//! - records (variable length)

/// Bytes in front of the length-covered part of a batch: first offset and length.
pub const LOG_OVERHEAD: usize = 8 + 4;

// byte positions of the fixed fields, counted from the start of the batch
pub const LENGTH_OFFSET: usize = 8;
pub const PARTITION_LEADER_EPOCH_OFFSET: usize = LENGTH_OFFSET + 4;
pub const MAGIC_OFFSET: usize = PARTITION_LEADER_EPOCH_OFFSET + 4;
pub const CRC_OFFSET: usize = MAGIC_OFFSET + 1;
pub const ATTRIBUTES_OFFSET: usize = CRC_OFFSET + 4;
/// attributes, last offset delta, two timestamps, producer id/epoch, first sequence
const CRC_COVERED_HEADER: usize = 2 + 4 + 8 + 8 + 8 + 2 + 4;
pub const RECORD_COUNT_OFFSET: usize = ATTRIBUTES_OFFSET + CRC_COVERED_HEADER;

/// Size of the fixed prefix in front of the records: 61 bytes.
pub const RECORD_BATCH_HEADER_SIZE: usize = RECORD_COUNT_OFFSET + 4;
/// Part of the length field taken by the header itself: 49 bytes.
pub const RECORD_BATCH_OVERHEAD: i32 = (RECORD_BATCH_HEADER_SIZE - LOG_OVERHEAD) as i32;

// attribute bits
pub const COMPRESSION_CODEC_MASK: i16 = 0x07;
pub const TIMESTAMP_TYPE_MASK: i16 = 0x08;
pub const TRANSACTIONAL_MASK: i16 = 0x10;
pub const CONTROL_MASK: i16 = 0x20;

/// The only batch format this crate reads and writes
pub const MAGIC: i8 = 2;
pub const NO_PRODUCER_ID: i64 = -1;
pub const NO_PRODUCER_EPOCH: i16 = -1;
pub const NO_SEQUENCE: i32 = -1;
pub const NO_PARTITION_LEADER_EPOCH: i32 = -1;
pub const NO_TIMESTAMP: i64 = -1;
