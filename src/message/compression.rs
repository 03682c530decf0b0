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

use crate::{AppError, AppResult};

/// Codec named by the low three attribute bits of a batch.
///
/// Only the selection is tracked; payloads of compressed batches stay opaque.
/// Bit patterns with no assigned codec are kept as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionCodec {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
    Unknown(i8),
}

impl CompressionCodec {
    /// Value stored in the attribute bits.
    pub fn bits(self) -> i8 {
        match self {
            CompressionCodec::None => 0,
            CompressionCodec::Gzip => 1,
            CompressionCodec::Snappy => 2,
            CompressionCodec::Lz4 => 3,
            CompressionCodec::Zstd => 4,
            CompressionCodec::Unknown(bits) => bits,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, CompressionCodec::Unknown(_))
    }

    /// Fails for codecs no payload can be handled with.
    pub fn check_known(self) -> AppResult<Self> {
        match self {
            CompressionCodec::Unknown(bits) => Err(AppError::PacketDecoding(format!(
                "unknown compression codec: {}",
                bits
            ))),
            known => Ok(known),
        }
    }
}

impl From<i8> for CompressionCodec {
    fn from(value: i8) -> Self {
        match value {
            0 => CompressionCodec::None,
            1 => CompressionCodec::Gzip,
            2 => CompressionCodec::Snappy,
            3 => CompressionCodec::Lz4,
            4 => CompressionCodec::Zstd,
            other => CompressionCodec::Unknown(other),
        }
    }
}

impl Display for CompressionCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionCodec::None => "none",
            CompressionCodec::Gzip => "gzip",
            CompressionCodec::Snappy => "snappy",
            CompressionCodec::Lz4 => "lz4",
            CompressionCodec::Zstd => "zstd",
            CompressionCodec::Unknown(bits) => return write!(f, "unknown({})", bits),
        };
        write!(f, "{}", name)
    }
}
