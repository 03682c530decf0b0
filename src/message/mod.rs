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

pub use batch_header::RecordBatchHeader;
pub use batch_reader::RecordBatchReader;
pub use compression::CompressionCodec;
pub use record::{Record, RecordHeader};
pub use record_batch::{BatchRecords, RecordBatch, RecordBatchBuilder};

mod batch_header;
mod batch_reader;
mod compression;
pub mod constants;
mod record;
mod record_batch;
pub mod timestamp;
