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

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use stonemq_reader::log::SegmentReader;
use stonemq_reader::message::BatchRecords;
use stonemq_reader::service::{setup_local_tracing, setup_tracing, MetricsRegistry};
use stonemq_reader::{AppError, AppResult};
use tracing::{error, info, warn, Level};

/// Prints the record batches stored in a log segment file.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// segment file to read
    #[arg(short, long)]
    file: PathBuf,
    /// bypass the page cache
    #[arg(long)]
    direct: bool,
    /// print batch headers only, skipping the records
    #[arg(long)]
    headers_only: bool,
    /// print every record, with its value as text
    #[arg(long)]
    records: bool,
    /// export traces and decoder metrics over OTLP
    #[arg(long)]
    otel: bool,
    /// directory for log files when exporting over OTLP
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let _guard = if cli.otel {
        Some(setup_tracing(&cli.log_dir, cli.log_level()).await?)
    } else {
        setup_local_tracing(cli.log_level())?;
        None
    };
    let registry = cli.otel.then(|| Arc::new(MetricsRegistry::global()));

    let result = tokio::task::spawn_blocking(move || dump(&cli, registry))
        .await
        .map_err(|e| AppError::DetailedIoError(format!("dump task failed: {}", e)))?;
    if let Err(e) = &result {
        error!("segment dump failed: {}", e);
    }
    result
}

fn dump(cli: &Cli, registry: Option<Arc<MetricsRegistry>>) -> AppResult<()> {
    let mut reader = SegmentReader::open(&cli.file, cli.direct, registry)?;
    info!("reading segment {}", cli.file.display());

    let mut batches = 0usize;
    loop {
        let position = reader.position()?;
        let next = if cli.headers_only {
            reader
                .next_header()
                .map(|h| h.map(|header| (header, None)))
        } else {
            reader
                .next_batch()
                .map(|b| b.map(|batch| (batch.header.clone(), Some(batch))))
        };
        let (header, batch) = match next {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(e) if e.is_insufficient_data() => {
                warn!("partial batch at position {}, stopping", position);
                break;
            }
            Err(e) => return Err(e),
        };
        batches += 1;
        println!("position: {} {}", position, header);

        let Some(batch) = batch else { continue };
        match &batch.records {
            BatchRecords::Compressed(payload) => {
                println!("  {} compressed bytes ({})", payload.len(), header.codec);
            }
            BatchRecords::Decoded(records) => {
                println!("  {} records", records.len());
                if !cli.records {
                    continue;
                }
                for record in records {
                    println!(
                        "  offset: {} key: {} bytes headers: {} value: {}",
                        header.first_offset + record.offset_delta,
                        record.key.as_ref().map_or(0, |k| k.len()),
                        record.headers.len(),
                        record
                            .value
                            .as_ref()
                            .map_or("null".into(), |v| String::from_utf8_lossy(v))
                    );
                }
            }
        }
    }
    info!("{} batches in {}", batches, cli.file.display());
    Ok(())
}
