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

/// Error codes a broker can put in a fetch or metadata response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum KafkaCode {
    Unknown = -1,
    None = 0,
    OffsetOutOfRange = 1,
    CorruptMessage = 2,
    UnknownTopicOrPartition = 3,
    InvalidFetchSize = 4,
    LeaderNotAvailable = 5,
    NotLeaderForPartition = 6,
    RequestTimedOut = 7,
    BrokerNotAvailable = 8,
    ReplicaNotAvailable = 9,
    MessageTooLarge = 10,
    NetworkException = 13,
    TopicAuthorizationFailed = 29,
    UnsupportedVersion = 35,
    InvalidRequest = 42,
    UnsupportedForMessageFormat = 43,
    FetchSessionIdNotFound = 70,
    InvalidFetchSessionEpoch = 71,
    KafkaStorageError = 56,
    FencedLeaderEpoch = 74,
    UnknownLeaderEpoch = 75,
    OffsetNotAvailable = 78,
}

impl KafkaCode {
    pub fn message(&self) -> &'static str {
        match self {
            KafkaCode::Unknown => {
                "The server experienced an unexpected error when processing the request"
            }
            KafkaCode::None => "",
            KafkaCode::OffsetOutOfRange => {
                "The requested offset is not within the range of offsets maintained by the server"
            }
            KafkaCode::CorruptMessage => {
                "This message has failed its CRC checksum, exceeds the valid size, or is otherwise corrupt"
            }
            KafkaCode::UnknownTopicOrPartition => "This server does not host this topic-partition",
            KafkaCode::InvalidFetchSize => "The requested fetch size is invalid",
            KafkaCode::LeaderNotAvailable => {
                "There is no leader for this topic-partition as we are in the middle of a leadership election"
            }
            KafkaCode::NotLeaderForPartition => {
                "This server is not the leader for that topic-partition"
            }
            KafkaCode::RequestTimedOut => "The request timed out",
            KafkaCode::BrokerNotAvailable => "The broker is not available",
            KafkaCode::ReplicaNotAvailable => {
                "The replica is not available for the requested topic-partition"
            }
            KafkaCode::MessageTooLarge => {
                "The request included a message larger than the max message size the server will accept"
            }
            KafkaCode::NetworkException => "The server disconnected before a response was received",
            KafkaCode::TopicAuthorizationFailed => "Topic authorization failed",
            KafkaCode::UnsupportedVersion => "The version of API is not supported",
            KafkaCode::InvalidRequest => "The request is malformed or was sent to an incompatible broker",
            KafkaCode::UnsupportedForMessageFormat => {
                "The message format version on the broker does not support the request"
            }
            KafkaCode::FetchSessionIdNotFound => "The fetch session ID was not found",
            KafkaCode::InvalidFetchSessionEpoch => "The fetch session epoch is invalid",
            KafkaCode::KafkaStorageError => "Disk error when trying to access log file on the disk",
            KafkaCode::FencedLeaderEpoch => {
                "The leader epoch in the request is older than the epoch on the broker"
            }
            KafkaCode::UnknownLeaderEpoch => {
                "The leader epoch in the request is newer than the epoch on the broker"
            }
            KafkaCode::OffsetNotAvailable => {
                "The leader high watermark has not caught up from a recent leader election"
            }
        }
    }

    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn is_error(&self) -> bool {
        *self != KafkaCode::None
    }
}

impl From<i16> for KafkaCode {
    fn from(code: i16) -> Self {
        match code {
            0 => KafkaCode::None,
            1 => KafkaCode::OffsetOutOfRange,
            2 => KafkaCode::CorruptMessage,
            3 => KafkaCode::UnknownTopicOrPartition,
            4 => KafkaCode::InvalidFetchSize,
            5 => KafkaCode::LeaderNotAvailable,
            6 => KafkaCode::NotLeaderForPartition,
            7 => KafkaCode::RequestTimedOut,
            8 => KafkaCode::BrokerNotAvailable,
            9 => KafkaCode::ReplicaNotAvailable,
            10 => KafkaCode::MessageTooLarge,
            13 => KafkaCode::NetworkException,
            29 => KafkaCode::TopicAuthorizationFailed,
            35 => KafkaCode::UnsupportedVersion,
            42 => KafkaCode::InvalidRequest,
            43 => KafkaCode::UnsupportedForMessageFormat,
            56 => KafkaCode::KafkaStorageError,
            70 => KafkaCode::FetchSessionIdNotFound,
            71 => KafkaCode::InvalidFetchSessionEpoch,
            74 => KafkaCode::FencedLeaderEpoch,
            75 => KafkaCode::UnknownLeaderEpoch,
            78 => KafkaCode::OffsetNotAvailable,
            _ => KafkaCode::Unknown,
        }
    }
}

impl Display for KafkaCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "kafka error {} ({:?}): {}", self.code(), self, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(KafkaCode::from(0), KafkaCode::None);
        assert_eq!(KafkaCode::from(74), KafkaCode::FencedLeaderEpoch);
        assert_eq!(KafkaCode::from(999), KafkaCode::Unknown);
        assert_eq!(KafkaCode::NotLeaderForPartition.code(), 6);
        assert!(!KafkaCode::None.is_error());
        assert!(KafkaCode::OffsetOutOfRange
            .to_string()
            .contains("OffsetOutOfRange"));
    }
}
