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

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// A broker release, used to pick request versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KafkaVersion([u32; 4]);

impl KafkaVersion {
    pub const V0_8_2_0: KafkaVersion = KafkaVersion([0, 8, 2, 0]);
    pub const V0_9_0_0: KafkaVersion = KafkaVersion([0, 9, 0, 0]);
    pub const V0_10_0_0: KafkaVersion = KafkaVersion([0, 10, 0, 0]);
    pub const V0_10_1_0: KafkaVersion = KafkaVersion([0, 10, 1, 0]);
    pub const V0_11_0_0: KafkaVersion = KafkaVersion([0, 11, 0, 0]);
    pub const V1_0_0_0: KafkaVersion = KafkaVersion([1, 0, 0, 0]);
    pub const V1_1_0_0: KafkaVersion = KafkaVersion([1, 1, 0, 0]);
    pub const V2_0_0_0: KafkaVersion = KafkaVersion([2, 0, 0, 0]);
    pub const V2_1_0_0: KafkaVersion = KafkaVersion([2, 1, 0, 0]);
    pub const V2_2_0_0: KafkaVersion = KafkaVersion([2, 2, 0, 0]);
    pub const V2_3_0_0: KafkaVersion = KafkaVersion([2, 3, 0, 0]);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        KafkaVersion([major, minor, patch, 0])
    }

    pub fn is_at_least(&self, other: KafkaVersion) -> bool {
        *self >= other
    }
}

impl Default for KafkaVersion {
    fn default() -> Self {
        KafkaVersion::V2_1_0_0
    }
}

impl FromStr for KafkaVersion {
    type Err = AppError;

    /// Accepts `major.minor.patch`, or four components for 0.x releases
    /// such as `0.10.1.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::InvalidValue(format!("invalid version {}: {}", s, e)))?;
        match parts.as_slice() {
            [0, minor, patch, build] => Ok(KafkaVersion([0, *minor, *patch, *build])),
            [major, minor, patch] => Ok(KafkaVersion([*major, *minor, *patch, 0])),
            _ => Err(AppError::InvalidValue(format!("invalid version {}", s))),
        }
    }
}

impl TryFrom<String> for KafkaVersion {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KafkaVersion> for String {
    fn from(version: KafkaVersion) -> Self {
        version.to_string()
    }
}

impl Display for KafkaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [major, minor, patch, build] = self.0;
        if major == 0 {
            write!(f, "{}.{}.{}.{}", major, minor, patch, build)
        } else {
            write!(f, "{}.{}.{}", major, minor, patch)
        }
    }
}
