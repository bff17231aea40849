use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber for binary entrypoints.
///
/// The library itself never initializes logging; it only emits `tracing`
/// events. `RUST_LOG` overrides the configured default level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}
