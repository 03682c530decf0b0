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

//! Millisecond timestamps as carried in batch headers.
//!
//! `None` travels as `-1`. Any negative value read off the wire decodes to
//! `None`; times before the Unix epoch cannot be written.

use chrono::{DateTime, Utc};

use super::constants::NO_TIMESTAMP;
use crate::protocol::{PacketDecoder, PacketEncoder};
use crate::{AppError, AppResult};

pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis < 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

pub fn to_millis(timestamp: Option<DateTime<Utc>>) -> AppResult<i64> {
    match timestamp {
        None => Ok(NO_TIMESTAMP),
        Some(ts) => {
            let millis = ts.timestamp_millis();
            if millis < 0 {
                return Err(AppError::PacketEncoding(format!(
                    "invalid timestamp before epoch: {}",
                    ts
                )));
            }
            Ok(millis)
        }
    }
}

pub fn decode<D: PacketDecoder + ?Sized>(pd: &mut D) -> AppResult<Option<DateTime<Utc>>> {
    Ok(from_millis(pd.get_i64()?))
}

pub fn encode<E: PacketEncoder + ?Sized>(
    pe: &mut E,
    timestamp: Option<DateTime<Utc>>,
) -> AppResult<()> {
    pe.put_i64(to_millis(timestamp)?);
    Ok(())
}
