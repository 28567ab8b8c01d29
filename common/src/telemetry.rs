// Telemetry module for structured logging, metrics, and tracing

use crate::errors::DispatchError;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

const SERVICE_NAME: &str = "medication-reminders";

/// Initialize structured JSON logging, with an OpenTelemetry layer when an
/// OTLP endpoint is configured
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// OTLP span exporter with the service name as a resource attribute
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    Ok(tracer_provider.tracer(SERVICE_NAME))
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus recorder, serve it on `metrics_port` and describe
/// the reminder metrics. Must be called from within a tokio runtime.
///
/// The returned handle renders the same registry for the `/metrics` route.
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build Prometheus exporter: {}", e))?;
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder)
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    tokio::spawn(async move {
        if exporter.await.is_err() {
            tracing::error!(metrics_port, "Prometheus exporter stopped");
        }
    });

    describe_counter!("reminder_fired_total", "Total number of reminder timer fires");
    describe_counter!(
        "reminder_dispatch_total",
        "Notification delivery attempts by outcome"
    );
    describe_counter!(
        "reminder_schedule_failures_total",
        "Active reminders that could not be scheduled"
    );
    describe_gauge!("reminder_jobs_scheduled", "Live timers in the job registry");

    tracing::info!(
        metrics_port = metrics_port,
        "Prometheus metrics exporter initialized"
    );

    Ok(handle)
}

#[inline]
pub fn record_reminder_fired(reminder_id: &Uuid) {
    counter!("reminder_fired_total", "reminder_id" => reminder_id.to_string()).increment(1);
}

#[inline]
pub fn record_dispatch_success(reminder_id: &Uuid) {
    counter!(
        "reminder_dispatch_total",
        "reminder_id" => reminder_id.to_string(),
        "outcome" => "success"
    )
    .increment(1);
}

#[inline]
pub fn record_dispatch_failure(reminder_id: &Uuid, error: &DispatchError) {
    let reason = match error {
        DispatchError::ClientBuild(_) => "client",
        DispatchError::Transport(_) => "transport",
        DispatchError::Rejected { .. } => "rejected",
    };
    counter!(
        "reminder_dispatch_total",
        "reminder_id" => reminder_id.to_string(),
        "outcome" => "failure",
        "reason" => reason
    )
    .increment(1);
}

#[inline]
pub fn record_schedule_failure(reminder_id: &Uuid) {
    counter!("reminder_schedule_failures_total", "reminder_id" => reminder_id.to_string())
        .increment(1);
}

#[inline]
pub fn update_scheduled_jobs(count: usize) {
    gauge!("reminder_jobs_scheduled").set(count as f64);
}
