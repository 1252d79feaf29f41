//! Telemetry initialization

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize console logging.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once, only
/// the first call installs a subscriber.
pub fn init_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init();

        if installed.is_ok() {
            tracing::info!(service.name = service_name, "Telemetry initialized");
        }
    });

    Ok(())
}

/// Initialize console logging plus OTLP span export.
///
/// The export pipeline is only built by the first initialization; later
/// calls return `Ok` without touching the network.
///
/// # Arguments
/// * `service_name` - reported as the `service.name` resource attribute
/// * `endpoint` - OTLP collector endpoint (e.g. `http://localhost:4317`)
pub fn init_with_otlp(
    service_name: &str,
    endpoint: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use tracing_opentelemetry::OpenTelemetryLayer;

    let mut outcome: Result<(), Box<dyn std::error::Error>> = Ok(());
    INIT.call_once(|| {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
                opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )]),
            ))
            .install_batch(opentelemetry_sdk::runtime::Tokio);
        let tracer = match tracer {
            Ok(tracer) => tracer,
            Err(err) => {
                outcome = Err(err.into());
                return;
            }
        };

        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
            .with(OpenTelemetryLayer::new(tracer))
            .try_init();

        if installed.is_ok() {
            tracing::info!(
                service.name = service_name,
                otlp.endpoint = endpoint,
                "Telemetry initialized with OpenTelemetry"
            );
        }
    });

    outcome
}

/// Flush pending spans before exit.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
