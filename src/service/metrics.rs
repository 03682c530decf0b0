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

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;

pub const BYTES_READ_METRIC: &str = "stonemq_reader.decoder.bytes_read";
pub const ROLLBACKS_METRIC: &str = "stonemq_reader.decoder.rollbacks";
pub const DECODER_ATTRIBUTE: &str = "decoder";

/// Instruments shared by decoders that want to report what they read.
///
/// Held behind an `Arc` by every decoder that was handed one; it lives as long
/// as the longest-lived holder.
#[derive(Clone)]
pub struct MetricsRegistry {
    meter: Meter,
    bytes_read: Counter<u64>,
    rollbacks: Counter<u64>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("bytes_read", &BYTES_READ_METRIC)
            .field("rollbacks", &ROLLBACKS_METRIC)
            .finish()
    }
}

impl MetricsRegistry {
    pub fn new(meter: Meter) -> Self {
        let bytes_read = meter
            .u64_counter(BYTES_READ_METRIC)
            .with_description("bytes consumed by packet decoders")
            .init();
        let rollbacks = meter
            .u64_counter(ROLLBACKS_METRIC)
            .with_description("reads rolled back to their start position after a failure")
            .init();
        MetricsRegistry {
            meter,
            bytes_read,
            rollbacks,
        }
    }

    /// Registry backed by whatever meter provider is installed globally.
    pub fn global() -> Self {
        Self::new(opentelemetry::global::meter(env!("CARGO_PKG_NAME")))
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn record_bytes_read(&self, decoder: &'static str, bytes: usize) {
        self.bytes_read
            .add(bytes as u64, &[KeyValue::new(DECODER_ATTRIBUTE, decoder)]);
    }

    pub fn record_rollback(&self, decoder: &'static str) {
        self.rollbacks
            .add(1, &[KeyValue::new(DECODER_ATTRIBUTE, decoder)]);
    }
}
