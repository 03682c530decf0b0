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

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::protocol::{BufferEncoder, PacketEncoder};
use crate::{AppError, AppResult};

pub const FETCH_API_KEY: i16 = 1;
pub const MAX_FETCH_VERSION: i16 = 11;
/// Replica id used by consumers.
pub const CONSUMER_REPLICA_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadUncommitted = 0,
    ReadCommitted = 1,
}

impl TryFrom<i8> for IsolationLevel {
    type Error = AppError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IsolationLevel::ReadUncommitted),
            1 => Ok(IsolationLevel::ReadCommitted),
            other => Err(AppError::InvalidValue(format!(
                "invalid isolation level: {}",
                other
            ))),
        }
    }
}

/// Fetch session fields, carried from version 7 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSession {
    pub id: i32,
    pub epoch: i32,
}

impl FetchSession {
    /// Asks the broker not to create a session.
    pub const NONE: FetchSession = FetchSession { id: 0, epoch: -1 };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestBlock {
    pub partition: i32,
    /// sent from version 9 on
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    /// sent from version 5 on; consumers send -1
    pub log_start_offset: i64,
    pub max_bytes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTopic {
    pub topic: String,
    pub partitions: Vec<FetchRequestBlock>,
}

/// A fetch request at one wire version. Optional fields are `None` when the
/// chosen version does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchRequest {
    pub version: i16,
    pub max_wait_time: Duration,
    pub min_bytes: i32,
    /// version 3 and later
    pub max_bytes: Option<i32>,
    /// version 4 and later
    pub isolation: Option<IsolationLevel>,
    /// version 7 and later
    pub session: Option<FetchSession>,
    /// version 11 and later
    pub rack_id: Option<String>,
    pub topics: Vec<FetchTopic>,
}

impl FetchRequest {
    /// Adds a partition to fetch. Blocks keep insertion order, which brokers
    /// honour from version 3 on.
    pub fn add_block(
        &mut self,
        topic: &str,
        partition: i32,
        fetch_offset: i64,
        max_bytes: i32,
        leader_epoch: i32,
    ) {
        let block = FetchRequestBlock {
            partition,
            current_leader_epoch: leader_epoch,
            fetch_offset,
            log_start_offset: -1,
            max_bytes,
        };
        match self.topics.iter_mut().find(|t| t.topic == topic) {
            Some(existing) => existing.partitions.push(block),
            None => self.topics.push(FetchTopic {
                topic: topic.to_string(),
                partitions: vec![block],
            }),
        }
    }

    pub fn block_count(&self) -> usize {
        self.topics.iter().map(|t| t.partitions.len()).sum()
    }

    pub fn encode<E: PacketEncoder + ?Sized>(&self, pe: &mut E) -> AppResult<()> {
        if !(0..=MAX_FETCH_VERSION).contains(&self.version) {
            return Err(AppError::PacketEncoding(format!(
                "unsupported fetch request version {}",
                self.version
            )));
        }
        let max_wait = i32::try_from(self.max_wait_time.as_millis()).map_err(|_| {
            AppError::PacketEncoding(format!("max wait time too long: {:?}", self.max_wait_time))
        })?;

        pe.put_i32(CONSUMER_REPLICA_ID);
        pe.put_i32(max_wait);
        pe.put_i32(self.min_bytes);
        if self.version >= 3 {
            pe.put_i32(self.max_bytes.unwrap_or(i32::MAX));
        }
        if self.version >= 4 {
            pe.put_i8(self.isolation.unwrap_or_default() as i8);
        }
        if self.version >= 7 {
            let session = self.session.unwrap_or(FetchSession::NONE);
            pe.put_i32(session.id);
            pe.put_i32(session.epoch);
        }

        pe.put_array_length(self.topics.len())?;
        for topic in &self.topics {
            pe.put_string(&topic.topic)?;
            pe.put_array_length(topic.partitions.len())?;
            for block in &topic.partitions {
                pe.put_i32(block.partition);
                if self.version >= 9 {
                    pe.put_i32(block.current_leader_epoch);
                }
                pe.put_i64(block.fetch_offset);
                if self.version >= 5 {
                    pe.put_i64(block.log_start_offset);
                }
                pe.put_i32(block.max_bytes);
            }
        }

        if self.version >= 7 {
            // forgotten topics, only meaningful inside a session
            pe.put_array_length(0)?;
        }
        if self.version >= 11 {
            pe.put_string(self.rack_id.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> AppResult<Bytes> {
        let mut pe = BufferEncoder::new();
        self.encode(&mut pe)?;
        pe.into_bytes()
    }
}
