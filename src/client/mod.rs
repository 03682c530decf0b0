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

//! The consuming side: collaborator traits a transport implements and the
//! [`Reader`] facade issuing fetches through them.

use std::fmt::Debug;
use std::sync::Arc;

use crate::request::{FetchRequest, FetchResponse, TopicMetadata};
use crate::AppResult;

mod reader;

pub use reader::{make_fetch_request, Reader};

/// A broker connection able to answer fetch requests.
pub trait Broker: Send + Sync + Debug {
    fn addr(&self) -> &str;

    /// Sends the request and blocks until the decoded response arrives.
    /// Timeouts, if any, are the implementation's business.
    fn fetch(&self, request: &FetchRequest) -> AppResult<FetchResponse>;
}

/// Cluster-level operations: leadership and metadata lookups.
pub trait Client: Send {
    /// Current leader of a partition and its leader epoch.
    fn leader_and_epoch(&self, topic: &str, partition: i32) -> AppResult<(Arc<dyn Broker>, i32)>;

    fn topic_metadata(&self) -> AppResult<Vec<TopicMetadata>>;

    fn close(&mut self) -> AppResult<()>;
}
