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

//! Wire-level building blocks: the decoder capability, its in-memory and
//! file-backed implementations, and the matching encoder.

pub use buffer_decoder::BufferDecoder;
pub use decoder::{with_pos_saver, Mark, PacketDecoder, MAX_VARINT_LEN};
pub use encoder::{BufferEncoder, PacketEncoder};
pub use field::{FieldKind, PendingField};
pub use file_decoder::FileDecoder;

mod buffer_decoder;
mod decoder;
mod encoder;
mod field;
mod file_decoder;
