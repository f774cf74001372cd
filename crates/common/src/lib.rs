pub mod config;
pub mod logging;
pub mod telemetry;

pub use config::Environment;
pub use logging::setup_logging;
pub use telemetry::TelemetryGuard;

/// Enter an info-level span for the rest of the scope.
///
/// ```ignore
/// let _s = common::span!("decode", bytes = encoded.len());
/// ```
#[macro_export]
macro_rules! span {
    ($name:literal $(, $($fields:tt)+)?) => {
        tracing::info_span!($name $(, $($fields)+)?).entered()
    };
}

/// Debug-level variant of [`span!`], for per-candidate hot loops.
#[macro_export]
macro_rules! span_debug {
    ($name:literal $(, $($fields:tt)+)?) => {
        tracing::debug_span!($name $(, $($fields)+)?).entered()
    };
}
