use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use stonemq_reader::message::RecordBatchBuilder;
use stonemq_reader::protocol::{BufferDecoder, BufferEncoder};
use stonemq_reader::request::{
    FetchRequest, FetchResponse, FetchResponseBlock, FetchResponseTopic, KafkaCode, KafkaVersion,
    PartitionMetadata, TopicMetadata,
};
use stonemq_reader::{AppError, AppResult, Broker, Client, Reader, ReaderConfig};

/// Serves fetches out of an in-memory log, passing every response through
/// the wire codec.
#[derive(Debug)]
struct MemoryBroker {
    log: Bytes,
    seen: Mutex<Vec<FetchRequest>>,
}

impl Broker for MemoryBroker {
    fn addr(&self) -> &str {
        "memory:9092"
    }

    fn fetch(&self, request: &FetchRequest) -> AppResult<FetchResponse> {
        self.seen.lock().push(request.clone());
        let topic = &request.topics[0];
        let block = &topic.partitions[0];
        let records = self
            .log
            .slice(..self.log.len().min(block.max_bytes as usize));

        let response = FetchResponse {
            version: request.version,
            topics: vec![FetchResponseTopic {
                topic: topic.topic.clone(),
                partitions: vec![FetchResponseBlock {
                    partition: block.partition,
                    error: KafkaCode::None,
                    high_water_mark: 6,
                    last_stable_offset: 6,
                    log_start_offset: 0,
                    aborted_transactions: Vec::new(),
                    preferred_read_replica: -1,
                    records,
                }],
            }],
            ..Default::default()
        };
        let mut pe = BufferEncoder::new();
        response.encode(&mut pe)?;
        let mut pd = BufferDecoder::new(pe.into_bytes()?);
        FetchResponse::decode(&mut pd, request.version)
    }
}

struct MemoryClient {
    leaders: HashMap<(String, i32), (Arc<dyn Broker>, i32)>,
}

impl Client for MemoryClient {
    fn leader_and_epoch(&self, topic: &str, partition: i32) -> AppResult<(Arc<dyn Broker>, i32)> {
        self.leaders
            .get(&(topic.to_string(), partition))
            .cloned()
            .ok_or(AppError::Broker(KafkaCode::UnknownTopicOrPartition))
    }

    fn topic_metadata(&self) -> AppResult<Vec<TopicMetadata>> {
        Ok(self
            .leaders
            .iter()
            .map(|((topic, partition), (_, epoch))| TopicMetadata {
                error: KafkaCode::None,
                topic: topic.clone(),
                is_internal: false,
                partitions: vec![PartitionMetadata {
                    error: KafkaCode::None,
                    partition_id: *partition,
                    leader: 1,
                    leader_epoch: *epoch,
                    replicas: vec![1],
                    isr: vec![1],
                }],
            })
            .collect())
    }

    fn close(&mut self) -> AppResult<()> {
        self.leaders.clear();
        Ok(())
    }
}

fn log_of(batches: i64) -> AppResult<Bytes> {
    let mut raw = BytesMut::new();
    for i in 0..batches {
        let mut builder = RecordBatchBuilder::new();
        builder
            .append_value(i * 2, format!("v{}", i * 2))
            .append_value(i * 2 + 1, format!("v{}", i * 2 + 1));
        raw.extend_from_slice(&builder.build()?.to_bytes()?);
    }
    Ok(raw.freeze())
}

fn reader(log: Bytes, config: ReaderConfig) -> (Reader, Arc<MemoryBroker>) {
    let broker = Arc::new(MemoryBroker {
        log,
        seen: Mutex::new(Vec::new()),
    });
    let leader: Arc<dyn Broker> = broker.clone();
    let mut leaders = HashMap::new();
    leaders.insert(("events".to_string(), 0), (leader, 5));
    (Reader::new(Box::new(MemoryClient { leaders }), config), broker)
}

#[test]
fn test_read_decodes_batches_end_to_end() -> AppResult<()> {
    let (reader, broker) = reader(log_of(3)?, ReaderConfig::default());
    let response = reader.read("events", 0, 0)?;
    let block = response.block("events", 0).expect("block");
    assert_eq!(block.error, KafkaCode::None);

    let decoded = block.record_batches()?;
    assert!(!decoded.partial_trailing);
    let values: Vec<_> = decoded
        .batches
        .iter()
        .flat_map(|b| b.records().iter())
        .filter_map(|r| r.value.clone())
        .collect();
    assert_eq!(values.len(), 6);
    assert_eq!(&values[5][..], b"v5");

    let seen = broker.seen.lock();
    assert_eq!(seen[0].version, 10);
    assert_eq!(seen[0].topics[0].partitions[0].current_leader_epoch, 5);
    Ok(())
}

#[test]
fn test_byte_limit_cuts_last_batch() -> AppResult<()> {
    let log = log_of(3)?;
    let mut config = ReaderConfig::default();
    config.consumer.fetch.max = (log.len() - 10) as i32;
    let (reader, _) = reader(log, config);

    let response = reader.read("events", 0, 0)?;
    let decoded = response.block("events", 0).expect("block").record_batches()?;
    assert_eq!(decoded.batches.len(), 2);
    assert!(decoded.partial_trailing);
    Ok(())
}

#[test]
fn test_old_protocol_version() -> AppResult<()> {
    let config = ReaderConfig {
        version: KafkaVersion::V0_10_0_0,
        ..Default::default()
    };
    let (reader, broker) = reader(log_of(1)?, config);
    let response = reader.read("events", 0, 0)?;
    assert_eq!(response.version, 2);
    let block = response.block("events", 0).expect("block");
    assert_eq!(block.last_stable_offset, -1);
    assert_eq!(block.record_batches()?.batches.len(), 1);
    assert_eq!(broker.seen.lock()[0].max_bytes, None);
    Ok(())
}

#[test]
fn test_unknown_partition_and_close() -> AppResult<()> {
    let (reader, broker) = reader(log_of(1)?, ReaderConfig::default());
    assert!(matches!(
        reader.read("events", 7, 0),
        Err(AppError::Broker(KafkaCode::UnknownTopicOrPartition))
    ));
    assert!(broker.seen.lock().is_empty());

    let metadata = reader.topic_metadata()?;
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].partition(0).map(|p| p.leader_epoch), Some(5));

    reader.close()?;
    reader.close()?;
    assert!(matches!(reader.read("events", 0, 0), Err(AppError::ClosedClient)));
    Ok(())
}
