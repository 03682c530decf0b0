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

use super::errors::KafkaCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error: KafkaCode,
    pub partition_id: i32,
    pub leader: i32,
    pub leader_epoch: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

/// One topic as a client collaborator reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error: KafkaCode,
    pub topic: String,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicMetadata {
    pub fn partition(&self, partition_id: i32) -> Option<&PartitionMetadata> {
        self.partitions
            .iter()
            .find(|p| p.partition_id == partition_id)
    }
}

impl Display for TopicMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [", self.topic)?;
        for (i, p) in self.partitions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}: leader={} epoch={} isr={:?}",
                p.partition_id, p.leader, p.leader_epoch, p.isr
            )?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_lookup_and_display() {
        let metadata = TopicMetadata {
            error: KafkaCode::None,
            topic: "events".to_string(),
            is_internal: false,
            partitions: vec![PartitionMetadata {
                error: KafkaCode::None,
                partition_id: 0,
                leader: 1,
                leader_epoch: 4,
                replicas: vec![1, 2],
                isr: vec![1],
            }],
        };
        assert_eq!(metadata.partition(0).map(|p| p.leader), Some(1));
        assert!(metadata.partition(1).is_none());
        assert_eq!(metadata.to_string(), "events [0: leader=1 epoch=4 isr=[1]]");
    }
}
