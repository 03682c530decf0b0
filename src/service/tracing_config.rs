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

use std::path::Path;
use std::time::Duration;

use dotenv::dotenv;
use opentelemetry::{global, Key, KeyValue};
use opentelemetry_sdk::metrics::reader::{DefaultAggregationSelector, DefaultTemporalitySelector};
use opentelemetry_sdk::metrics::{
    Instrument, MeterProviderBuilder, PeriodicReader, SdkMeterProvider, Stream,
};
use opentelemetry_sdk::trace::{BatchConfigBuilder, RandomIdGenerator, Sampler, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::{
    resource::{SERVICE_NAME, SERVICE_VERSION},
    SCHEMA_URL,
};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::metrics::{BYTES_READ_METRIC, DECODER_ATTRIBUTE, ROLLBACKS_METRIC};
use super::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const LOG_FILE_PREFIX: &str = "segment-dump.log";
const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

fn resource() -> Resource {
    Resource::from_schema_url(
        [
            KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ],
        SCHEMA_URL,
    )
}

/// `RUST_LOG` wins; without it everything at `level` and above is logged.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn init_error<E: std::fmt::Display>(what: &str, e: E) -> AppError {
    AppError::InvalidValue(format!("{}: {}", what, e))
}

fn init_meter_provider() -> AppResult<SdkMeterProvider> {
    let otlp = opentelemetry_otlp::new_exporter()
        .tonic()
        .build_metrics_exporter(
            Box::new(DefaultAggregationSelector::new()),
            Box::new(DefaultTemporalitySelector::new()),
        )
        .map_err(|e| init_error("otlp metrics exporter", e))?;
    let otlp_reader = PeriodicReader::builder(otlp, runtime::Tokio)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();
    let stdout_reader = PeriodicReader::builder(
        opentelemetry_stdout::MetricsExporter::default(),
        runtime::Tokio,
    )
    .with_interval(METRIC_EXPORT_INTERVAL)
    .build();

    // decoder counters only carry the decoder kind
    let decoder_counters = |instrument: &Instrument| -> Option<Stream> {
        let counted = instrument.name == BYTES_READ_METRIC || instrument.name == ROLLBACKS_METRIC;
        counted.then(|| Stream::new().allowed_attribute_keys([Key::from(DECODER_ATTRIBUTE)]))
    };

    let provider = MeterProviderBuilder::default()
        .with_resource(resource())
        .with_reader(otlp_reader)
        .with_reader(stdout_reader)
        .with_view(decoder_counters)
        .build();
    global::set_meter_provider(provider.clone());
    Ok(provider)
}

fn init_tracer() -> AppResult<Tracer> {
    let trace_config = opentelemetry_sdk::trace::Config::default()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource());
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(5))
                .build(),
        )
        .with_trace_config(trace_config)
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .install_batch(runtime::Tokio)
        .map_err(|e| init_error("otlp tracer", e))
}

/// Keeps the exporters and the log file writer alive. Dropping it flushes
/// pending metrics and spans.
pub struct OtelGuard {
    meter_provider: SdkMeterProvider,
    _worker_guard: WorkerGuard,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.meter_provider.shutdown() {
            eprintln!("meter provider shutdown: {err:?}");
        }
        global::shutdown_tracer_provider();
    }
}

/// Logs to stdout only.
pub fn setup_local_tracing(level: Level) -> AppResult<()> {
    dotenv().ok();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(level))
        .try_init()
        .map_err(|e| init_error("tracing subscriber", e))
}

/// Logs to stdout and an hourly file under `log_dir`, and exports spans and
/// metrics over OTLP. Needs a running tokio runtime.
pub async fn setup_tracing<P: AsRef<Path>>(log_dir: P, level: Level) -> AppResult<OtelGuard> {
    dotenv().ok();
    let file_appender = tracing_appender::rolling::hourly(log_dir.as_ref(), LOG_FILE_PREFIX);
    let (file_writer, worker_guard) = tracing_appender::non_blocking(file_appender);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(file_writer.and(std::io::stdout));

    let meter_provider = init_meter_provider()?;
    let tracer = init_tracer()?;

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(MetricsLayer::new(meter_provider.clone()))
        .with(OpenTelemetryLayer::new(tracer))
        .with(env_filter(level))
        .try_init()
        .map_err(|e| init_error("tracing subscriber", e))?;

    Ok(OtelGuard {
        meter_provider,
        _worker_guard: worker_guard,
    })
}
