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

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};
use crate::request::{IsolationLevel, KafkaVersion};

/// Default bound on any array or byte length read off the wire, and the
/// `max_bytes` sent with fetch requests from version 3 on.
pub const DEFAULT_MAX_RESPONSE_SIZE: i32 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// minimum bytes the broker should accumulate before answering
    pub min: i32,
    /// per-partition upper bound attached to each fetch block
    pub max: i32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            min: 1,
            max: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub fetch: FetchConfig,
    pub max_wait_time_ms: u64,
    pub isolation_level: IsolationLevel,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            fetch: FetchConfig::default(),
            max_wait_time_ms: 500,
            isolation_level: IsolationLevel::ReadUncommitted,
        }
    }
}

impl ConsumerConfig {
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_millis(self.max_wait_time_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// protocol version negotiated with the cluster
    pub version: KafkaVersion,
    pub consumer: ConsumerConfig,
    pub rack_id: String,
    pub max_response_size: i32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            version: KafkaVersion::default(),
            consumer: ConsumerConfig::default(),
            rack_id: String::new(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ReaderConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;

        let reader_config: ReaderConfig = config.try_deserialize()?;
        reader_config.validate()?;

        Ok(reader_config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_response_size <= 0 {
            return Err(AppError::InvalidValue(format!(
                "max_response_size must be positive, got {}",
                self.max_response_size
            )));
        }
        if self.consumer.fetch.min < 0 || self.consumer.fetch.max < 0 {
            return Err(AppError::InvalidValue(format!(
                "fetch bounds must be non-negative, got min={} max={}",
                self.consumer.fetch.min, self.consumer.fetch.max
            )));
        }
        Ok(())
    }
}
