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

//! Fetch protocol types: the request, its response, and what a collaborator
//! reports about topics.

mod errors;
mod fetch;
mod fetch_response;
mod metadata;
mod version;

pub use errors::KafkaCode;
pub use fetch::{
    FetchRequest, FetchRequestBlock, FetchSession, FetchTopic, IsolationLevel,
    CONSUMER_REPLICA_ID, FETCH_API_KEY, MAX_FETCH_VERSION,
};
pub use fetch_response::{
    AbortedTransaction, DecodedRecords, FetchResponse, FetchResponseBlock, FetchResponseTopic,
};
pub use metadata::{PartitionMetadata, TopicMetadata};
pub use version::KafkaVersion;
