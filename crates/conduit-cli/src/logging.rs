//! Logging init (SPEC_FULL.md §A.1): `tracing-subscriber` with an
//! `EnvFilter` and the default `fmt` layer. Grounded on the narrowed form of
//! `examples/querymt-querymt/crates/utils/src/telemetry.rs`'s subscriber
//! setup, with the OTLP export layer dropped (see DESIGN.md) since this
//! system carries no tracing-collector dependency.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `level_override` takes precedence over
/// `RUST_LOG`; absent both, the filter defaults to `info`.
pub fn init_logging(level_override: Option<&str>) {
    let filter = match level_override {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt().with_env_filter(filter).with_target(true).init();
}
