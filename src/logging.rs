// src/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. lopdf logs every text decode at
/// info.
pub const DEFAULT_FILTER: &str = "info,lopdf=warn";

/// Install the global fmt subscriber. Call once, first thing in `main`.
pub fn init() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_target(false)
        .init();
}

/// Subscriber that writes through the test harness; safe to call from
/// every test.
pub fn init_for_tests() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug,lopdf=warn"));
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_test_writer()
        .try_init();
}
