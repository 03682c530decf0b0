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

//! Log segment access: opening segment files (optionally bypassing the page
//! cache) and streaming the record batches they hold.

pub mod direct_io;
mod segment_reader;

pub use direct_io::{open_file, read_only, ALIGN_SIZE, BLOCK_SIZE};
pub use segment_reader::SegmentReader;

/// Suffix of log segment files
pub const LOG_FILE_SUFFIX: &str = "log";
