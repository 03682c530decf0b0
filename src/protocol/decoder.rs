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

//! The packet decoder capability.
//!
//! A [`PacketDecoder`] is a forward cursor over protocol bytes. Implementors only
//! provide raw byte access, cursor marks and the push/pop field stack; every typed
//! read is built on top of those here, so the in-memory and the file-backed
//! decoders share one definition of the wire format.
//!
//! Every read is atomic with respect to the cursor: it either consumes exactly the
//! bytes of the value it returns, or fails and leaves the cursor (and the pending
//! field stack) where it was before the call. Callers can retry a failed read once
//! more data is available without tracking positions themselves.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use integer_encoding::VarInt;

use super::buffer_decoder::BufferDecoder;
use super::field::FieldKind;
use crate::service::MetricsRegistry;
use crate::{AppError, AppResult};

/// Longest encoding of a 64 bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// A saved cursor: byte position plus depth of the pending field stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub position: usize,
    pub pending: usize,
}

/// Runs `f` and puts the decoder back at its starting mark if `f` fails.
///
/// When the rollback itself fails, both errors are returned in
/// [`AppError::PositionRestore`].
pub fn with_pos_saver<D, T, F>(decoder: &mut D, f: F) -> AppResult<T>
where
    D: PacketDecoder + ?Sized,
    F: FnOnce(&mut D) -> AppResult<T>,
{
    let mark = decoder.mark()?;
    match f(decoder) {
        Ok(value) => Ok(value),
        Err(err) => match decoder.reset(mark) {
            Ok(()) => Err(err),
            Err(restore) => Err(AppError::PositionRestore {
                cause: Box::new(err),
                restore,
            }),
        },
    }
}

/// Number of bytes the varint at the start of `buf` occupies.
pub(crate) fn varint_len(buf: &[u8]) -> AppResult<usize> {
    match buf.iter().take(MAX_VARINT_LEN).position(|b| b & 0x80 == 0) {
        Some(last) => Ok(last + 1),
        None if buf.len() >= MAX_VARINT_LEN => Err(AppError::VarintOverflow),
        None => Err(AppError::InsufficientData),
    }
}

pub trait PacketDecoder {
    /// Reads exactly `length` bytes and advances past them.
    fn get_raw_bytes(&mut self, length: usize) -> AppResult<Bytes>;

    /// Returns `length` bytes starting `offset` bytes past the cursor, without
    /// moving it.
    fn peek_bytes(&mut self, offset: usize, length: usize) -> AppResult<Bytes>;

    /// Bytes left between the cursor and the end of the medium.
    fn remaining(&self) -> AppResult<usize>;

    fn mark(&mut self) -> AppResult<Mark>;

    fn reset(&mut self, mark: Mark) -> std::io::Result<()>;

    /// Opens a length or CRC field at the cursor: reads the stored 4 byte value,
    /// remembers where the covered bytes start and returns the stored value.
    fn push(&mut self, kind: FieldKind) -> AppResult<u32>;

    /// Closes the most recently pushed field and verifies it against the bytes
    /// read since.
    fn pop(&mut self) -> AppResult<()>;

    /// Upper bound for any array length read off the wire.
    fn max_response_size(&self) -> i32;

    fn metric_registry(&self) -> Option<&Arc<MetricsRegistry>> {
        None
    }

    fn skip(&mut self, length: usize) -> AppResult<()> {
        self.get_raw_bytes(length).map(|_| ())
    }

    // primitives

    fn get_i8(&mut self) -> AppResult<i8> {
        Ok(self.get_raw_bytes(1)?.get_i8())
    }

    fn get_i16(&mut self) -> AppResult<i16> {
        Ok(self.get_raw_bytes(2)?.get_i16())
    }

    fn get_i32(&mut self) -> AppResult<i32> {
        Ok(self.get_raw_bytes(4)?.get_i32())
    }

    fn get_i64(&mut self) -> AppResult<i64> {
        Ok(self.get_raw_bytes(8)?.get_i64())
    }

    fn get_f64(&mut self) -> AppResult<f64> {
        Ok(self.get_raw_bytes(8)?.get_f64())
    }

    /// Zigzag encoded signed varint.
    fn get_varint(&mut self) -> AppResult<i64> {
        let window = self.remaining()?.min(MAX_VARINT_LEN);
        let head = self.peek_bytes(0, window)?;
        let n = varint_len(&head)?;
        let (value, _) = i64::decode_var(&head[..n]).ok_or(AppError::VarintOverflow)?;
        self.skip(n)?;
        Ok(value)
    }

    fn get_uvarint(&mut self) -> AppResult<u64> {
        let window = self.remaining()?.min(MAX_VARINT_LEN);
        let head = self.peek_bytes(0, window)?;
        let n = varint_len(&head)?;
        let (value, _) = u64::decode_var(&head[..n]).ok_or(AppError::VarintOverflow)?;
        self.skip(n)?;
        Ok(value)
    }

    fn get_bool(&mut self) -> AppResult<bool> {
        with_pos_saver(self, |pd| match pd.get_i8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(AppError::InvalidBool(other)),
        })
    }

    // lengths

    /// Plain i32 array length. `-1` is a null array.
    fn get_array_length(&mut self) -> AppResult<i32> {
        with_pos_saver(self, |pd| {
            let length = pd.get_i32()?;
            if length < -1 || length > pd.max_response_size() {
                return Err(AppError::InvalidArrayLength(length as i64));
            }
            Ok(length)
        })
    }

    /// Compact array length: wire value minus one, `None` for a wire zero.
    fn get_compact_array_length(&mut self) -> AppResult<Option<usize>> {
        with_pos_saver(self, |pd| {
            let n = pd.get_uvarint()?;
            if n == 0 {
                return Ok(None);
            }
            let length = n - 1;
            if length > pd.max_response_size() as u64 {
                return Err(AppError::InvalidArrayLength(length as i64));
            }
            Ok(Some(length as usize))
        })
    }

    /// Skips a tagged field section: a tag count, then per tag an id and a
    /// length prefixed payload. Tags are not interpreted.
    fn get_empty_tagged_field_array(&mut self) -> AppResult<()> {
        with_pos_saver(self, |pd| {
            let tag_count = pd.get_uvarint()?;
            for _ in 0..tag_count {
                pd.get_uvarint()?;
                let length = pd.get_uvarint()?;
                pd.skip(length as usize)?;
            }
            Ok(())
        })
    }

    // byte arrays

    /// i32 length prefixed bytes, `None` for length `-1`.
    fn get_bytes(&mut self) -> AppResult<Option<Bytes>> {
        with_pos_saver(self, |pd| {
            let length = pd.get_i32()?;
            match length {
                -1 => Ok(None),
                n if n < -1 => Err(AppError::InvalidByteSliceLength(n as i64)),
                n => pd.get_raw_bytes(n as usize).map(Some),
            }
        })
    }

    /// Signed varint length prefixed bytes, `None` for length `-1`.
    fn get_varint_bytes(&mut self) -> AppResult<Option<Bytes>> {
        with_pos_saver(self, |pd| {
            let length = pd.get_varint()?;
            match length {
                -1 => Ok(None),
                n if n < -1 => Err(AppError::InvalidByteSliceLength(n)),
                n => pd.get_raw_bytes(n as usize).map(Some),
            }
        })
    }

    /// Compact bytes: the wire length is the byte count plus one.
    fn get_compact_bytes(&mut self) -> AppResult<Bytes> {
        with_pos_saver(self, |pd| {
            let n = pd.get_uvarint()?;
            if n == 0 {
                return Err(AppError::InvalidByteSliceLength(-1));
            }
            pd.get_raw_bytes((n - 1) as usize)
        })
    }

    // strings

    /// Reads an i16 string length and checks it against the remaining bytes.
    fn get_string_length(&mut self) -> AppResult<i16> {
        with_pos_saver(self, |pd| {
            let length = pd.get_i16()?;
            if length < -1 {
                return Err(AppError::InvalidStringLength(length as i64));
            }
            if length > 0 && length as usize > pd.remaining()? {
                return Err(AppError::InsufficientData);
            }
            Ok(length)
        })
    }

    /// Non-nullable string; a null on the wire reads as an empty string.
    fn get_string(&mut self) -> AppResult<String> {
        self.get_nullable_string().map(Option::unwrap_or_default)
    }

    fn get_nullable_string(&mut self) -> AppResult<Option<String>> {
        with_pos_saver(self, |pd| {
            let length = pd.get_string_length()?;
            if length == -1 {
                return Ok(None);
            }
            let raw = pd.get_raw_bytes(length as usize)?;
            utf8(raw).map(Some)
        })
    }

    fn get_compact_string(&mut self) -> AppResult<String> {
        with_pos_saver(self, |pd| {
            let n = pd.get_uvarint()?;
            if n == 0 {
                return Err(AppError::InvalidByteSliceLength(-1));
            }
            let raw = pd.get_raw_bytes((n - 1) as usize)?;
            utf8(raw)
        })
    }

    fn get_compact_nullable_string(&mut self) -> AppResult<Option<String>> {
        with_pos_saver(self, |pd| {
            let n = pd.get_uvarint()?;
            if n == 0 {
                return Ok(None);
            }
            let raw = pd.get_raw_bytes((n - 1) as usize)?;
            utf8(raw).map(Some)
        })
    }

    // arrays

    fn get_compact_int32_array(&mut self) -> AppResult<Option<Vec<i32>>> {
        with_pos_saver(self, |pd| match pd.get_compact_array_length()? {
            None => Ok(None),
            Some(count) => {
                let mut values = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    values.push(pd.get_i32()?);
                }
                Ok(Some(values))
            }
        })
    }

    fn get_int32_array(&mut self) -> AppResult<Vec<i32>> {
        with_pos_saver(self, |pd| {
            let count = fixed_array_count(pd)?;
            let raw = pd.get_raw_bytes(count * 4)?;
            Ok(raw.chunks_exact(4).map(|mut c| c.get_i32()).collect())
        })
    }

    fn get_int64_array(&mut self) -> AppResult<Vec<i64>> {
        with_pos_saver(self, |pd| {
            let count = fixed_array_count(pd)?;
            let raw = pd.get_raw_bytes(count * 8)?;
            Ok(raw.chunks_exact(8).map(|mut c| c.get_i64()).collect())
        })
    }

    fn get_string_array(&mut self) -> AppResult<Vec<String>> {
        with_pos_saver(self, |pd| {
            let count = fixed_array_count(pd)?;
            let mut values = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                values.push(pd.get_string()?);
            }
            Ok(values)
        })
    }

    // views

    /// Consumes the next `length` bytes and returns them as an independent
    /// decoder bounded to exactly those bytes.
    fn get_subset(&mut self, length: usize) -> AppResult<BufferDecoder> {
        let raw = self.get_raw_bytes(length)?;
        Ok(BufferDecoder::new(raw).with_max_response_size(self.max_response_size()))
    }

    /// Like [`PacketDecoder::get_subset`] but starting `offset` bytes past the
    /// cursor and without consuming anything.
    fn peek(&mut self, offset: usize, length: usize) -> AppResult<BufferDecoder> {
        let raw = self.peek_bytes(offset, length)?;
        Ok(BufferDecoder::new(raw).with_max_response_size(self.max_response_size()))
    }

    fn peek_i8(&mut self, offset: usize) -> AppResult<i8> {
        Ok(self.peek_bytes(offset, 1)?.get_i8())
    }
}

fn fixed_array_count<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<usize> {
    let count = pd.get_i32()?;
    if count < 0 || count > pd.max_response_size() {
        return Err(AppError::InvalidArrayLength(count as i64));
    }
    Ok(count as usize)
}

fn utf8(raw: Bytes) -> AppResult<String> {
    String::from_utf8(raw.to_vec())
        .map_err(|e| AppError::PacketDecoding(format!("invalid utf-8 string: {}", e)))
}
