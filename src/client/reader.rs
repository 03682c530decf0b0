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

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::Client;
use crate::request::{
    FetchRequest, FetchResponse, FetchSession, KafkaVersion, TopicMetadata,
};
use crate::service::ReaderConfig;
use crate::{AppError, AppResult};

/// Builds the fetch request matching the configured protocol version.
///
/// Each release threshold that is met raises the wire version and turns on the
/// fields introduced with it; later thresholds keep everything earlier ones
/// enabled. Versions 1, 2, 6, 8 and 10 add nothing the reader sends.
pub fn make_fetch_request(config: &ReaderConfig) -> FetchRequest {
    let version = config.version;
    let mut request = FetchRequest {
        version: 0,
        min_bytes: config.consumer.fetch.min,
        max_wait_time: config.consumer.max_wait_time(),
        ..Default::default()
    };

    if version.is_at_least(KafkaVersion::V0_9_0_0) {
        request.version = 1;
    }
    // requires handling of message format 1
    if version.is_at_least(KafkaVersion::V0_10_0_0) {
        request.version = 2;
    }
    if version.is_at_least(KafkaVersion::V0_10_1_0) {
        request.version = 3;
        request.max_bytes = Some(config.max_response_size);
    }
    // 5 also carries the log start offset per partition
    if version.is_at_least(KafkaVersion::V0_11_0_0) {
        request.version = 5;
        request.isolation = Some(config.consumer.isolation_level);
    }
    if version.is_at_least(KafkaVersion::V1_0_0_0) {
        request.version = 6;
    }
    // incremental fetch sessions are not used
    if version.is_at_least(KafkaVersion::V1_1_0_0) {
        request.version = 7;
        request.session = Some(FetchSession::NONE);
    }
    if version.is_at_least(KafkaVersion::V2_0_0_0) {
        request.version = 8;
    }
    // 9 adds the current leader epoch, 10 allows zstd
    if version.is_at_least(KafkaVersion::V2_1_0_0) {
        request.version = 10;
    }
    if version.is_at_least(KafkaVersion::V2_3_0_0) {
        request.version = 11;
        request.rack_id = Some(config.rack_id.clone());
    }
    request
}

/// Fetches batches from partition leaders through a [`Client`].
///
/// Every operation takes the same lock, so one reader handles one call at a
/// time. Use several readers for parallel fetches.
pub struct Reader {
    config: Arc<ReaderConfig>,
    client: Mutex<Option<Box<dyn Client>>>,
}

impl Reader {
    pub fn new(client: Box<dyn Client>, config: ReaderConfig) -> Self {
        Reader {
            config: Arc::new(config),
            client: Mutex::new(Some(client)),
        }
    }

    /// Creates a client for `addrs` with `connect` and wraps it. A missing
    /// config means the defaults.
    pub fn connect<F>(addrs: &[String], config: Option<ReaderConfig>, connect: F) -> AppResult<Self>
    where
        F: FnOnce(&[String], &ReaderConfig) -> AppResult<Box<dyn Client>>,
    {
        let config = config.unwrap_or_default();
        config.validate()?;
        let client = connect(addrs, &config)?;
        debug!("reader connected to {:?}, version {}", addrs, config.version);
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Fetches from `topic`/`partition` starting at `offset`, returning the
    /// leader's response as is.
    pub fn read(&self, topic: &str, partition: i32, offset: i64) -> AppResult<FetchResponse> {
        let guard = self.client.lock();
        let client = guard.as_ref().ok_or(AppError::ClosedClient)?;

        let (leader, epoch) = client.leader_and_epoch(topic, partition)?;
        let mut request = make_fetch_request(&self.config);
        request.add_block(
            topic,
            partition,
            offset,
            self.config.consumer.fetch.max,
            epoch,
        );
        trace!(
            "fetch v{} {}-{} at {} from {} (epoch {})",
            request.version,
            topic,
            partition,
            offset,
            leader.addr(),
            epoch
        );
        leader.fetch(&request)
    }

    pub fn topic_metadata(&self) -> AppResult<Vec<TopicMetadata>> {
        let guard = self.client.lock();
        let client = guard.as_ref().ok_or(AppError::ClosedClient)?;
        client.topic_metadata()
    }

    /// Closes the client. Later calls do nothing. If closing fails the client
    /// is kept, so the close can be retried.
    pub fn close(&self) -> AppResult<()> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_mut() {
            client.close()?;
            *guard = None;
            debug!("reader closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.client.lock().is_none()
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
