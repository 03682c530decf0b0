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

use super::decoder::{Mark, PacketDecoder};
use super::field::{FieldKind, PendingField};
use crate::service::DEFAULT_MAX_RESPONSE_SIZE;
use crate::{AppError, AppResult};

/// A [`PacketDecoder`] over bytes already in memory.
///
/// Cloning the underlying [`Bytes`] is cheap, so subsets and peeks share the
/// same allocation as the decoder they were taken from.
#[derive(Debug, Clone)]
pub struct BufferDecoder {
    raw: Bytes,
    off: usize,
    stack: Vec<(PendingField, u32)>,
    max_response_size: i32,
}

impl BufferDecoder {
    pub fn new(raw: Bytes) -> Self {
        BufferDecoder {
            raw,
            off: 0,
            stack: Vec::new(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Decoder positioned `offset` bytes into `raw`, clamped to its end.
    pub fn at(raw: Bytes, offset: usize) -> Self {
        let off = offset.min(raw.len());
        BufferDecoder {
            off,
            ..Self::new(raw)
        }
    }

    pub fn with_max_response_size(mut self, max_response_size: i32) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn position(&self) -> usize {
        self.off
    }

    pub fn is_empty(&self) -> bool {
        self.off >= self.raw.len()
    }

    /// Everything after the cursor, without consuming it.
    pub fn rest(&self) -> Bytes {
        self.raw.slice(self.off..)
    }
}

impl PacketDecoder for BufferDecoder {
    fn get_raw_bytes(&mut self, length: usize) -> AppResult<Bytes> {
        if length > self.max_response_size.max(0) as usize {
            return Err(AppError::InvalidByteSliceLength(length as i64));
        }
        let end = self
            .off
            .checked_add(length)
            .ok_or(AppError::InsufficientData)?;
        if end > self.raw.len() {
            return Err(AppError::InsufficientData);
        }
        let out = self.raw.slice(self.off..end);
        self.off = end;
        Ok(out)
    }

    fn peek_bytes(&mut self, offset: usize, length: usize) -> AppResult<Bytes> {
        let start = self
            .off
            .checked_add(offset)
            .ok_or(AppError::InsufficientData)?;
        let end = start.checked_add(length).ok_or(AppError::InsufficientData)?;
        if end > self.raw.len() {
            return Err(AppError::InsufficientData);
        }
        Ok(self.raw.slice(start..end))
    }

    fn remaining(&self) -> AppResult<usize> {
        Ok(self.raw.len().saturating_sub(self.off))
    }

    fn mark(&mut self) -> AppResult<Mark> {
        Ok(Mark {
            position: self.off,
            pending: self.stack.len(),
        })
    }

    fn reset(&mut self, mark: Mark) -> std::io::Result<()> {
        self.off = mark.position.min(self.raw.len());
        self.stack.truncate(mark.pending);
        Ok(())
    }

    fn push(&mut self, kind: FieldKind) -> AppResult<u32> {
        let start = self.off;
        let stored = self.get_i32()? as u32;
        self.stack.push((PendingField::new(kind, start), stored));
        Ok(stored)
    }

    fn pop(&mut self) -> AppResult<()> {
        let (field, stored) = self
            .stack
            .pop()
            .ok_or_else(|| AppError::PacketDecoding("pop without a matching push".to_string()))?;
        let covered = self.raw.slice(field.covered_from()..self.off);
        if let Err(e) = field.check(stored, &covered) {
            self.stack.push((field, stored));
            return Err(e);
        }
        Ok(())
    }

    fn max_response_size(&self) -> i32 {
        self.max_response_size
    }

    fn skip(&mut self, length: usize) -> AppResult<()> {
        let end = self
            .off
            .checked_add(length)
            .ok_or(AppError::InsufficientData)?;
        if end > self.raw.len() {
            return Err(AppError::InsufficientData);
        }
        self.off = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decoder(raw: &[u8]) -> BufferDecoder {
        BufferDecoder::new(Bytes::copy_from_slice(raw))
    }

    #[test]
    fn test_fixed_width_reads() -> AppResult<()> {
        let mut pd = decoder(&[
            0xff, 0x01, 0x02, 0x00, 0x00, 0x00, 0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x00,
        ]);
        assert_eq!(pd.get_i8()?, -1);
        assert_eq!(pd.get_i16()?, 0x0102);
        assert_eq!(pd.get_i32()?, 42);
        assert_eq!(pd.get_i64()?, 256);
        assert_eq!(pd.remaining()?, 0);
        Ok(())
    }

    #[rstest]
    #[case::i8("i8", 1)]
    #[case::i16("i16", 2)]
    #[case::i32("i32", 4)]
    #[case::i64("i64", 8)]
    #[case::f64("f64", 8)]
    fn test_short_read_leaves_cursor(#[case] kind: &str, #[case] width: usize) -> AppResult<()> {
        let mut pd = decoder(&vec![0u8; width - 1]);
        let result = match kind {
            "i8" => pd.get_i8().map(|_| ()),
            "i16" => pd.get_i16().map(|_| ()),
            "i32" => pd.get_i32().map(|_| ()),
            "i64" => pd.get_i64().map(|_| ()),
            _ => pd.get_f64().map(|_| ()),
        };
        assert!(matches!(result, Err(AppError::InsufficientData)));
        assert_eq!(pd.position(), 0);
        assert_eq!(pd.remaining()?, width - 1);
        Ok(())
    }

    #[test]
    fn test_f64() -> AppResult<()> {
        let mut raw = 1.5f64.to_be_bytes().to_vec();
        raw.extend_from_slice(&(-0.25f64).to_be_bytes());
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_f64()?, 1.5);
        assert_eq!(pd.position(), 8);
        assert_eq!(pd.get_f64()?, -0.25);
        assert_eq!(pd.position(), 16);

        let mut short = decoder(&1.5f64.to_be_bytes()[..7]);
        assert!(matches!(short.get_f64(), Err(AppError::InsufficientData)));
        assert_eq!(short.position(), 0);
        assert_eq!(short.remaining()?, 7);
        Ok(())
    }

    #[rstest]
    #[case::absent(&[0x00], Some(None), 1)]
    #[case::empty(&[0x01], Some(Some(0)), 1)]
    #[case::three(&[0x04], Some(Some(3)), 1)]
    #[case::two_byte_varint(&[0x81, 0x01], Some(Some(128)), 2)]
    #[case::truncated_varint(&[0x80], None, 0)]
    #[case::over_limit(&[0x82, 0x02], None, 0)]
    fn test_compact_array_length(
        #[case] raw: &[u8],
        #[case] expected: Option<Option<usize>>,
        #[case] position: usize,
    ) {
        let mut pd = decoder(raw).with_max_response_size(200);
        let result = pd.get_compact_array_length();
        match expected {
            Some(length) => assert_eq!(result.unwrap(), length),
            None => assert!(result.is_err()),
        }
        assert_eq!(pd.position(), position);
    }

    #[test]
    fn test_compact_array_length_bound() {
        let mut pd = decoder(&[0x0a]).with_max_response_size(8);
        assert!(matches!(
            pd.get_compact_array_length(),
            Err(AppError::InvalidArrayLength(9))
        ));
        assert_eq!(pd.position(), 0);
    }

    #[rstest]
    #[case::null(&[0x00], Some(None), 1)]
    #[case::empty(&[0x01], Some(Some("")), 1)]
    #[case::text(&[0x03, b'o', b'k'], Some(Some("ok")), 3)]
    #[case::short(&[0x05, b'o', b'k'], None, 0)]
    fn test_compact_nullable_string(
        #[case] raw: &[u8],
        #[case] expected: Option<Option<&str>>,
        #[case] position: usize,
    ) {
        let mut pd = decoder(raw);
        let result = pd.get_compact_nullable_string();
        match expected {
            Some(value) => assert_eq!(result.unwrap().as_deref(), value),
            None => assert!(matches!(result, Err(AppError::InsufficientData))),
        }
        assert_eq!(pd.position(), position);
    }

    #[test]
    fn test_compact_bytes() -> AppResult<()> {
        let mut pd = decoder(&[0x03, 0x0a, 0x0b, 0x01, 0x7f]);
        assert_eq!(&pd.get_compact_bytes()?[..], &[0x0a, 0x0b][..]);
        assert_eq!(pd.position(), 3);
        assert!(pd.get_compact_bytes()?.is_empty());
        assert_eq!(pd.position(), 4);

        let mut zero = decoder(&[0x00]);
        assert!(matches!(
            zero.get_compact_bytes(),
            Err(AppError::InvalidByteSliceLength(-1))
        ));
        assert_eq!(zero.position(), 0);

        let mut short = decoder(&[0x04, 0x0a]);
        assert!(matches!(
            short.get_compact_bytes(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(short.position(), 0);
        Ok(())
    }

    #[test]
    fn test_int64_array() -> AppResult<()> {
        let mut raw = 2i32.to_be_bytes().to_vec();
        raw.extend_from_slice(&(-5i64).to_be_bytes());
        raw.extend_from_slice(&(1i64 << 40).to_be_bytes());
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_int64_array()?, vec![-5, 1 << 40]);
        assert_eq!(pd.position(), 20);

        let mut short = decoder(&raw[..19]);
        assert!(matches!(
            short.get_int64_array(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(short.position(), 0);

        let mut negative = decoder(&(-1i32).to_be_bytes());
        assert!(matches!(
            negative.get_int64_array(),
            Err(AppError::InvalidArrayLength(-1))
        ));
        assert_eq!(negative.position(), 0);
        Ok(())
    }

    #[test]
    fn test_string_array() -> AppResult<()> {
        let raw = [
            0x00, 0x00, 0x00, 0x02, // count
            0x00, 0x02, b'h', b'i', // "hi"
            0xff, 0xff, // null reads as empty
        ];
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_string_array()?, vec!["hi".to_string(), String::new()]);
        assert_eq!(pd.position(), raw.len());

        let mut short = decoder(&raw[..7]);
        assert!(matches!(
            short.get_string_array(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(short.position(), 0);
        Ok(())
    }

    #[test]
    fn test_compact_int32_array() -> AppResult<()> {
        let mut pd = decoder(&[
            0x00, // absent
            0x01, // empty
            0x03, 0x00, 0x00, 0x00, 0x07, 0xff, 0xff, 0xff, 0xff,
        ]);
        assert_eq!(pd.get_compact_int32_array()?, None);
        assert_eq!(pd.position(), 1);
        assert_eq!(pd.get_compact_int32_array()?, Some(Vec::new()));
        assert_eq!(pd.position(), 2);
        assert_eq!(pd.get_compact_int32_array()?, Some(vec![7, -1]));
        assert!(pd.is_empty());

        let mut short = decoder(&[0x03, 0x00, 0x00, 0x00, 0x07, 0xff]);
        assert!(matches!(
            short.get_compact_int32_array(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(short.position(), 0);
        Ok(())
    }

    #[test]
    fn test_varints() -> AppResult<()> {
        // 300 zigzag encodes to 600 = 0xd8 0x04
        let mut pd = decoder(&[0xd8, 0x04, 0x01, 0x96, 0x01]);
        assert_eq!(pd.get_varint()?, 300);
        assert_eq!(pd.get_varint()?, -1);
        assert_eq!(pd.get_uvarint()?, 150);
        assert!(pd.is_empty());

        let mut truncated = decoder(&[0x80, 0x80]);
        assert!(matches!(
            truncated.get_uvarint(),
            Err(AppError::InsufficientData)
        ));
        assert_eq!(truncated.position(), 0);

        let mut overflow = decoder(&[0xff; 11]);
        assert!(matches!(overflow.get_varint(), Err(AppError::VarintOverflow)));
        assert_eq!(overflow.position(), 0);
        Ok(())
    }

    #[test]
    fn test_bool() -> AppResult<()> {
        let mut pd = decoder(&[0x01, 0x00, 0x02]);
        assert!(pd.get_bool()?);
        assert!(!pd.get_bool()?);
        assert!(matches!(pd.get_bool(), Err(AppError::InvalidBool(2))));
        assert_eq!(pd.position(), 2);
        Ok(())
    }

    #[test]
    fn test_strings() -> AppResult<()> {
        let mut pd = decoder(&[0x00, 0x03, b'a', b'b', b'c', 0xff, 0xff, 0x04, b'x', b'y', b'z']);
        assert_eq!(pd.get_string()?, "abc");
        assert_eq!(pd.get_nullable_string()?, None);
        assert_eq!(pd.get_compact_string()?, "xyz");

        let mut bad = decoder(&[0xff, 0xfe]);
        assert!(matches!(
            bad.get_string(),
            Err(AppError::InvalidStringLength(-2))
        ));

        let mut short = decoder(&[0x00, 0x05, b'a']);
        assert!(matches!(short.get_string(), Err(AppError::InsufficientData)));
        assert_eq!(short.position(), 0);
        Ok(())
    }

    #[test]
    fn test_bytes_and_arrays() -> AppResult<()> {
        let mut pd = decoder(&[
            0xff, 0xff, 0xff, 0xff, // null bytes
            0x00, 0x00, 0x00, 0x02, 0x0a, 0x0b, // two bytes
            0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x08,
        ]);
        assert_eq!(pd.get_bytes()?, None);
        assert_eq!(pd.get_bytes()?.as_deref(), Some(&[0x0a, 0x0b][..]));
        assert_eq!(pd.get_int32_array()?, vec![7, 8]);

        let mut bad = decoder(&[0xff, 0xff, 0xff, 0xfe]);
        assert!(matches!(
            bad.get_bytes(),
            Err(AppError::InvalidByteSliceLength(-2))
        ));
        assert_eq!(bad.position(), 0);
        Ok(())
    }

    #[test]
    fn test_array_length_bounds() {
        let mut pd = decoder(&[0x00, 0x00, 0x00, 0x10]).with_max_response_size(8);
        assert!(matches!(
            pd.get_array_length(),
            Err(AppError::InvalidArrayLength(16))
        ));
        assert_eq!(pd.position(), 0);

        let mut null = decoder(&[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(null.get_array_length().unwrap(), -1);
    }

    #[test]
    fn test_tagged_fields_are_skipped() -> AppResult<()> {
        // two tags: (0, len 2) and (5, len 0), then a trailing byte
        let mut pd = decoder(&[0x02, 0x00, 0x02, 0xaa, 0xbb, 0x05, 0x00, 0x7f]);
        pd.get_empty_tagged_field_array()?;
        assert_eq!(pd.get_i8()?, 0x7f);

        let mut short = decoder(&[0x01, 0x00, 0x04, 0xaa]);
        assert!(short.get_empty_tagged_field_array().is_err());
        assert_eq!(short.position(), 0);
        Ok(())
    }

    #[test]
    fn test_subset_and_peek() -> AppResult<()> {
        let mut pd = decoder(&[1, 2, 3, 4, 5]);
        assert_eq!(pd.peek_i8(3)?, 4);
        let mut peeked = pd.peek(1, 2)?;
        assert_eq!(peeked.get_i16()?, 0x0203);
        assert_eq!(pd.position(), 0);

        let mut subset = pd.get_subset(3)?;
        assert_eq!(pd.position(), 3);
        assert_eq!(subset.remaining()?, 3);
        subset.skip(2)?;
        assert_eq!(subset.get_i8()?, 3);
        assert!(matches!(subset.get_i8(), Err(AppError::InsufficientData)));
        Ok(())
    }

    #[test]
    fn test_push_pop_length_and_crc() -> AppResult<()> {
        let body = b"hello";
        let crc = crc32c::crc32c(body);
        let mut raw = Vec::new();
        raw.extend_from_slice(&9i32.to_be_bytes());
        raw.extend_from_slice(&crc.to_be_bytes());
        raw.extend_from_slice(body);

        let mut pd = decoder(&raw);
        assert_eq!(pd.push(FieldKind::Length)?, 9);
        assert_eq!(pd.push(FieldKind::Crc32c)?, crc);
        pd.skip(body.len())?;
        pd.pop()?;
        pd.pop()?;
        assert!(pd.pop().is_err());
        Ok(())
    }

    #[test]
    fn test_crc_mismatch() -> AppResult<()> {
        let mut raw = 0u32.to_be_bytes().to_vec();
        raw.extend_from_slice(b"data");
        let mut pd = decoder(&raw);
        pd.push(FieldKind::Crc32c)?;
        pd.skip(4)?;
        assert!(matches!(pd.pop(), Err(AppError::PacketDecoding(_))));
        Ok(())
    }

    #[test]
    fn test_raw_bytes_over_limit() {
        let mut pd = decoder(&[0; 16]).with_max_response_size(4);
        assert!(matches!(
            pd.get_raw_bytes(8),
            Err(AppError::InvalidByteSliceLength(8))
        ));
        assert_eq!(pd.position(), 0);
    }
}
