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

use std::path::PathBuf;

use crate::request::KafkaCode;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// i/o errors, propagated unchanged
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    DetailedIoError(String),

    /// the underlying medium holds fewer bytes than the field needs
    #[error("insufficient data to decode packet, more bytes expected")]
    InsufficientData,

    /// format violations
    #[error("invalid boolean value: {0}")]
    InvalidBool(i8),

    #[error("invalid string length: {0}")]
    InvalidStringLength(i64),

    #[error("invalid byteslice length: {0}")]
    InvalidByteSliceLength(i64),

    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    #[error("varint overflow")]
    VarintOverflow,

    #[error("packet encoding error: {0}")]
    PacketEncoding(String),

    #[error("packet decoding error: {0}")]
    PacketDecoding(String),

    /// resource errors
    #[error("failed to disable page cache for {path:?}: {source}")]
    DirectIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{cause}, failed to restore position: {restore}")]
    PositionRestore {
        cause: Box<AppError>,
        restore: std::io::Error,
    },

    /// client errors
    #[error("tried to use a client that was closed")]
    ClosedClient,

    #[error("broker returned error: {0:?}")]
    Broker(KafkaCode),

    /// configuration errors
    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl AppError {
    /// Whether the error only means the medium ran out of bytes. Stream readers
    /// use this to tell a truncated trailing batch from a corrupt one.
    pub fn is_insufficient_data(&self) -> bool {
        match self {
            AppError::InsufficientData => true,
            AppError::PositionRestore { cause, .. } => cause.is_insufficient_data(),
            _ => false,
        }
    }
}
