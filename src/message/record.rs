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
use integer_encoding::VarInt;

use crate::protocol::{with_pos_saver, BufferEncoder, PacketDecoder, PacketEncoder};
use crate::{AppError, AppResult};

/// One entry of an uncompressed batch.
///
/// Wire layout: varint length, attributes (i8), varint timestamp delta, varint
/// offset delta, varint-length key and value (`-1` for null), varint header
/// count and the headers themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub attributes: i8,
    /// milliseconds after the batch's first timestamp
    pub timestamp_delta: i64,
    pub offset_delta: i64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: Vec<RecordHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl RecordHeader {
    pub fn new<K: AsRef<[u8]>, V: AsRef<[u8]>>(key: K, value: V) -> RecordHeader {
        RecordHeader {
            key: Some(Bytes::copy_from_slice(key.as_ref())),
            value: Some(Bytes::copy_from_slice(value.as_ref())),
        }
    }

    fn decode<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<Self> {
        Ok(RecordHeader {
            key: pd.get_varint_bytes()?,
            value: pd.get_varint_bytes()?,
        })
    }

    fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) {
        pe.put_varint_bytes(self.key.as_deref());
        pe.put_varint_bytes(self.value.as_deref());
    }

    pub fn size(&self) -> usize {
        varint_bytes_size(self.key.as_deref()) + varint_bytes_size(self.value.as_deref())
    }
}

fn varint_bytes_size(bytes: Option<&[u8]>) -> usize {
    match bytes {
        None => (-1i64).required_space(),
        Some(b) => (b.len() as i64).required_space() + b.len(),
    }
}

impl Record {
    /// Reads one length-prefixed record. The whole record must fit in its
    /// declared length; leftover bytes are a format error.
    pub fn decode<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<Self> {
        with_pos_saver(pd, |pd| {
            let length = pd.get_varint()?;
            if length < 0 {
                return Err(AppError::InvalidByteSliceLength(length));
            }
            let mut body = pd.get_subset(length as usize)?;

            let attributes = body.get_i8()?;
            let timestamp_delta = body.get_varint()?;
            let offset_delta = body.get_varint()?;
            let key = body.get_varint_bytes()?;
            let value = body.get_varint_bytes()?;

            let header_count = body.get_varint()?;
            let mut headers = Vec::new();
            if header_count > 0 {
                headers.reserve(header_count.min(64) as usize);
                for _ in 0..header_count {
                    headers.push(RecordHeader::decode(&mut body)?);
                }
            }

            let trailing = body.remaining()?;
            if trailing != 0 {
                return Err(AppError::PacketDecoding(format!(
                    "record has {} unread trailing bytes",
                    trailing
                )));
            }

            Ok(Record {
                attributes,
                timestamp_delta,
                offset_delta,
                key,
                value,
                headers,
            })
        })
    }

    pub fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) -> AppResult<()> {
        let mut body = BufferEncoder::with_capacity(self.size());
        body.put_i8(self.attributes);
        body.put_varint(self.timestamp_delta);
        body.put_varint(self.offset_delta);
        body.put_varint_bytes(self.key.as_deref());
        body.put_varint_bytes(self.value.as_deref());
        body.put_varint(self.headers.len() as i64);
        for header in &self.headers {
            header.encode(&mut body);
        }
        let body = body.into_bytes()?;

        pe.put_varint(body.len() as i64);
        pe.put_raw_bytes(&body);
        Ok(())
    }

    /// Encoded size of the record body, without its own length prefix.
    pub fn size(&self) -> usize {
        1 + self.timestamp_delta.required_space()
            + self.offset_delta.required_space()
            + varint_bytes_size(self.key.as_deref())
            + varint_bytes_size(self.value.as_deref())
            + (self.headers.len() as i64).required_space()
            + self.headers.iter().map(RecordHeader::size).sum::<usize>()
    }
}
