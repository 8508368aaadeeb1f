//! Tracing bootstrap for the gesture pipeline.
//!
//! [`init_tracing`] wires the global `tracing` subscriber once at process
//! startup.  The poll loop, lifecycle tracker and classifiers all log
//! through `tracing`; when an OTLP collector is configured their spans are
//! exported as well.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `GESTURA_LOG_FORMAT=json` | Newline-delimited JSON logs instead of compact console output. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL; enables the OTLP/HTTP span exporter. |

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Console log rendering, selected by `GESTURA_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("GESTURA_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Without `OTEL_EXPORTER_OTLP_ENDPOINT` this is a plain console subscriber.
/// With it, spans are additionally exported over OTLP/HTTP, tagged with the
/// service name and crate version so one collector can tell pipeline
/// deployments apart.
///
/// The returned [`TracerProviderGuard`] must be held for the lifetime of the
/// process; dropping it flushes pending span batches.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let provider = build_provider(service_name);
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer("gestura-poll-loop"))
    });

    // `Option<Layer>` composes as a no-op when no collector is configured.
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);
    match LogFormat::from_env() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Compact => {
            registry.with(tracing_subscriber::fmt::layer().compact()).init();
        }
    }

    TracerProviderGuard(provider)
}

/// Flushes and shuts down the OTel [`SdkTracerProvider`] on drop.
///
/// Hold an instance in `main` for the entire program lifetime; dropping it
/// earlier silently stops span export.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[gestura] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

/// Build the exporting provider when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// Returns `None` when the env-var is absent or the exporter fails to
/// initialise; either way the console subscriber still comes up, so a broken
/// collector never takes the pipeline down with it.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[gestura] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    // The simple exporter flushes synchronously, so init_tracing stays safe
    // to call before any Tokio runtime exists.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
