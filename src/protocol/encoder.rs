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

use bytes::{BufMut, Bytes, BytesMut};
use integer_encoding::VarInt;

use super::field::{FieldKind, PendingField};
use crate::{AppError, AppResult};

/// Write side of the wire format, mirroring [`super::PacketDecoder`].
pub trait PacketEncoder {
    fn put_raw_bytes(&mut self, bytes: &[u8]);

    /// Bytes written so far.
    fn offset(&self) -> usize;

    /// Reserves a 4 byte slot for a length or CRC resolved on [`PacketEncoder::pop`].
    fn push(&mut self, kind: FieldKind);

    fn pop(&mut self) -> AppResult<()>;

    fn put_i8(&mut self, value: i8) {
        self.put_raw_bytes(&value.to_be_bytes());
    }

    fn put_i16(&mut self, value: i16) {
        self.put_raw_bytes(&value.to_be_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.put_raw_bytes(&value.to_be_bytes());
    }

    fn put_i64(&mut self, value: i64) {
        self.put_raw_bytes(&value.to_be_bytes());
    }

    fn put_f64(&mut self, value: f64) {
        self.put_raw_bytes(&value.to_be_bytes());
    }

    fn put_varint(&mut self, value: i64) {
        self.put_raw_bytes(&value.encode_var_vec());
    }

    fn put_uvarint(&mut self, value: u64) {
        self.put_raw_bytes(&value.encode_var_vec());
    }

    fn put_bool(&mut self, value: bool) {
        self.put_i8(value as i8);
    }

    fn put_array_length(&mut self, length: usize) -> AppResult<()> {
        let length = i32::try_from(length)
            .map_err(|_| AppError::PacketEncoding(format!("array too long: {}", length)))?;
        self.put_i32(length);
        Ok(())
    }

    fn put_compact_array_length(&mut self, length: usize) {
        self.put_uvarint(length as u64 + 1);
    }

    fn put_bytes(&mut self, bytes: Option<&[u8]>) -> AppResult<()> {
        match bytes {
            None => self.put_i32(-1),
            Some(bytes) => {
                self.put_array_length(bytes.len())?;
                self.put_raw_bytes(bytes);
            }
        }
        Ok(())
    }

    fn put_varint_bytes(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            None => self.put_varint(-1),
            Some(bytes) => {
                self.put_varint(bytes.len() as i64);
                self.put_raw_bytes(bytes);
            }
        }
    }

    fn put_compact_bytes(&mut self, bytes: &[u8]) {
        self.put_uvarint(bytes.len() as u64 + 1);
        self.put_raw_bytes(bytes);
    }

    fn put_string(&mut self, value: &str) -> AppResult<()> {
        let length = i16::try_from(value.len())
            .map_err(|_| AppError::PacketEncoding(format!("string too long: {}", value.len())))?;
        self.put_i16(length);
        self.put_raw_bytes(value.as_bytes());
        Ok(())
    }

    fn put_nullable_string(&mut self, value: Option<&str>) -> AppResult<()> {
        match value {
            None => {
                self.put_i16(-1);
                Ok(())
            }
            Some(value) => self.put_string(value),
        }
    }

    fn put_compact_string(&mut self, value: &str) {
        self.put_compact_bytes(value.as_bytes());
    }

    fn put_nullable_compact_string(&mut self, value: Option<&str>) {
        match value {
            None => self.put_uvarint(0),
            Some(value) => self.put_compact_string(value),
        }
    }

    fn put_int32_array(&mut self, values: &[i32]) -> AppResult<()> {
        self.put_array_length(values.len())?;
        values.iter().for_each(|v| self.put_i32(*v));
        Ok(())
    }

    fn put_int64_array(&mut self, values: &[i64]) -> AppResult<()> {
        self.put_array_length(values.len())?;
        values.iter().for_each(|v| self.put_i64(*v));
        Ok(())
    }

    fn put_string_array(&mut self, values: &[String]) -> AppResult<()> {
        self.put_array_length(values.len())?;
        for value in values {
            self.put_string(value)?;
        }
        Ok(())
    }

    fn put_empty_tagged_field_array(&mut self) {
        self.put_uvarint(0);
    }
}

/// Encoder writing into a growable in-memory buffer.
#[derive(Debug, Default)]
pub struct BufferEncoder {
    buf: BytesMut,
    stack: Vec<PendingField>,
}

impl BufferEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BufferEncoder {
            buf: BytesMut::with_capacity(capacity),
            stack: Vec::new(),
        }
    }

    /// Finishes encoding. Fails if a pushed field was never popped.
    pub fn into_bytes(self) -> AppResult<Bytes> {
        if !self.stack.is_empty() {
            return Err(AppError::PacketEncoding(format!(
                "{} pending field(s) never popped",
                self.stack.len()
            )));
        }
        Ok(self.buf.freeze())
    }
}

impl PacketEncoder for BufferEncoder {
    fn put_raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    fn offset(&self) -> usize {
        self.buf.len()
    }

    fn push(&mut self, kind: FieldKind) {
        self.stack.push(PendingField::new(kind, self.buf.len()));
        self.buf.put_u32(0);
    }

    fn pop(&mut self) -> AppResult<()> {
        let field = self
            .stack
            .pop()
            .ok_or_else(|| AppError::PacketEncoding("pop without a matching push".to_string()))?;
        let value = field.compute(&self.buf[field.covered_from()..])?;
        self.buf[field.start..field.covered_from()].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BufferDecoder, PacketDecoder};

    #[test]
    fn test_nested_length_and_crc_patching() -> AppResult<()> {
        let mut pe = BufferEncoder::new();
        pe.push(FieldKind::Length);
        pe.push(FieldKind::Crc32c);
        pe.put_string("topic")?;
        pe.pop()?;
        pe.pop()?;
        let raw = pe.into_bytes()?;

        assert_eq!(&raw[..4], &11i32.to_be_bytes());
        assert_eq!(&raw[4..8], &crc32c::crc32c(&raw[8..]).to_be_bytes());

        let mut pd = BufferDecoder::new(raw);
        pd.push(FieldKind::Length)?;
        pd.push(FieldKind::Crc32c)?;
        assert_eq!(pd.get_string()?, "topic");
        pd.pop()?;
        pd.pop()?;
        Ok(())
    }

    #[test]
    fn test_unbalanced_push_is_rejected() {
        let mut pe = BufferEncoder::new();
        assert!(pe.pop().is_err());
        pe.push(FieldKind::Length);
        assert!(matches!(pe.into_bytes(), Err(AppError::PacketEncoding(_))));
    }

    #[test]
    fn test_nullable_and_compact_forms() -> AppResult<()> {
        let mut pe = BufferEncoder::new();
        pe.put_nullable_string(None)?;
        pe.put_bytes(None)?;
        pe.put_varint_bytes(Some(b"kv"));
        pe.put_nullable_compact_string(Some("c"));
        pe.put_empty_tagged_field_array();
        let raw = pe.into_bytes()?;
        assert_eq!(
            raw.as_ref(),
            &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x04, b'k', b'v', 0x02, b'c', 0x00]
        );
        Ok(())
    }

    #[test]
    fn test_oversized_string() {
        let mut pe = BufferEncoder::new();
        let long = "x".repeat(i16::MAX as usize + 1);
        assert!(pe.put_string(&long).is_err());
    }
}
