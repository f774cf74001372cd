use crate::config::Environment;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: env filter, the given OpenTelemetry layer,
/// and a pretty (development) or JSON (production) formatter.
pub(crate) fn install<L>(environment: Environment, otel_layer: L)
where
    L: tracing_subscriber::Layer<tracing_subscriber::layer::Layered<EnvFilter, Registry>>
        + Send
        + Sync
        + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
///
/// Also adds an OpenTelemetry layer that exports traces if a global tracer provider
/// has been initialized (e.g. via `TelemetryGuard::init`).
pub fn setup_logging(environment: Environment) {
    install(environment, tracing_opentelemetry::layer());
}
