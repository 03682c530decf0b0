use std::io::Write;

use chrono::{TimeZone, Utc};
use stonemq_reader::message::{RecordBatchBuilder, RecordHeader};
use stonemq_reader::{AppResult, RecordBatchReader, SegmentReader};
use tempfile::NamedTempFile;

fn segment(batches: usize) -> AppResult<Vec<u8>> {
    let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let mut raw = Vec::new();
    for i in 0..batches {
        let base = (i * 3) as i64;
        let mut builder = RecordBatchBuilder::new().partition_leader_epoch(i as i32);
        for n in 0..3 {
            builder.append_record(
                Some(base + n),
                Some(start + chrono::Duration::milliseconds(n * 10)),
                Some(format!("key-{}", base + n)),
                Some(format!("value-{}", base + n)),
                vec![RecordHeader::new("trace", "abc")],
            );
        }
        raw.extend_from_slice(&builder.build()?.to_bytes()?);
    }
    Ok(raw)
}

#[test]
fn test_file_and_memory_readers_agree() -> AppResult<()> {
    let raw = segment(4)?;
    let mut file = NamedTempFile::new()?;
    file.write_all(&raw)?;
    file.flush()?;

    let from_memory = RecordBatchReader::new(raw.into())
        .collect::<AppResult<Vec<_>>>()?;

    let mut reader = SegmentReader::open(file.path(), false, None)?;
    let mut from_file = Vec::new();
    while let Some(batch) = reader.next_batch()? {
        from_file.push(batch);
    }

    assert_eq!(from_file.len(), 4);
    assert_eq!(from_file, from_memory);
    let last = &from_file[3];
    assert_eq!(last.header.partition_leader_epoch, 3);
    assert_eq!(last.header.last_offset(), 11);
    assert_eq!(last.records()[2].timestamp_delta, 20);
    assert_eq!(last.records()[0].headers[0].key.as_deref(), Some(&b"trace"[..]));
    Ok(())
}

#[test]
fn test_tailing_a_growing_segment() -> AppResult<()> {
    let raw = segment(2)?;
    let split = raw.len() - 7;
    let mut file = NamedTempFile::new()?;
    file.write_all(&raw[..split])?;
    file.flush()?;

    let mut reader = SegmentReader::open(file.path(), false, None)?;
    assert!(reader.next_batch()?.is_some());
    let before = reader.position()?;
    let err = reader.next_batch().unwrap_err();
    assert!(err.is_insufficient_data());
    assert_eq!(reader.position()?, before);

    file.write_all(&raw[split..])?;
    file.flush()?;
    let batch = reader.next_batch()?.expect("second batch");
    assert_eq!(batch.header.first_offset, 3);
    assert!(reader.next_batch()?.is_none());
    Ok(())
}

#[test]
fn test_corrupt_batch_stops_memory_reader() -> AppResult<()> {
    let mut raw = segment(3)?;
    let second = raw.len() / 3;
    // inside the second batch's records
    raw[second + 70] ^= 0x40;

    let mut reader = RecordBatchReader::new(raw.into());
    assert!(reader.next_batch()?.is_some());
    assert!(reader.next_batch().is_err());
    assert!(reader.next().is_none());
    Ok(())
}
