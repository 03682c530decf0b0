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

//! Reading record batches of the Kafka log format: a packet decoder over
//! memory or files with atomic rollback, the v2 record batch codec, segment
//! streaming and a fetch client facade.

pub mod client;
pub mod log;
pub mod message;
pub mod protocol;
pub mod request;
pub mod service;

pub use client::{make_fetch_request, Broker, Client, Reader};
pub use log::SegmentReader;
pub use message::{RecordBatch, RecordBatchHeader, RecordBatchReader};
pub use protocol::{BufferDecoder, FileDecoder, PacketDecoder};
pub use service::{setup_local_tracing, setup_tracing, AppError, AppResult, ReaderConfig};
