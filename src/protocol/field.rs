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

use crate::{AppError, AppResult};

/// What a reserved 4 byte slot holds once the bytes after it are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// big-endian i32 counting every byte written after the slot
    Length,
    /// CRC-32C (Castagnoli) over every byte written after the slot
    Crc32c,
}

impl FieldKind {
    /// Bytes the slot occupies on the wire.
    pub const fn reserve_length(&self) -> usize {
        4
    }
}

/// A slot opened by `push` and closed by the matching `pop`.
///
/// Encoders and decoders keep these in a `Vec` in push order; `pop` always
/// resolves the most recent one, so nested length/CRC fields resolve inside out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingField {
    pub kind: FieldKind,
    /// absolute offset of the slot itself
    pub start: usize,
}

impl PendingField {
    pub fn new(kind: FieldKind, start: usize) -> Self {
        PendingField { kind, start }
    }

    /// Offset of the first byte covered by this field.
    pub fn covered_from(&self) -> usize {
        self.start + self.kind.reserve_length()
    }

    /// Value the slot must hold for `covered`, the bytes following it.
    pub fn compute(&self, covered: &[u8]) -> AppResult<u32> {
        match self.kind {
            FieldKind::Length => {
                let length = i32::try_from(covered.len()).map_err(|_| {
                    AppError::PacketEncoding(format!(
                        "length field overflow: {} bytes",
                        covered.len()
                    ))
                })?;
                Ok(length as u32)
            }
            FieldKind::Crc32c => Ok(crc32c::crc32c(covered)),
        }
    }

    /// Verifies a value read off the wire against the bytes it covers.
    pub fn check(&self, stored: u32, covered: &[u8]) -> AppResult<()> {
        let expected = match self.kind {
            FieldKind::Length => covered.len() as u32,
            FieldKind::Crc32c => crc32c::crc32c(covered),
        };
        if expected == stored {
            return Ok(());
        }
        match self.kind {
            FieldKind::Length => Err(AppError::PacketDecoding(format!(
                "length field invalid: declared {} but {} bytes follow",
                stored as i32, expected
            ))),
            FieldKind::Crc32c => Err(AppError::PacketDecoding(format!(
                "CRC didn't match: expected {:#010x}, got {:#010x}",
                expected, stored
            ))),
        }
    }
}
