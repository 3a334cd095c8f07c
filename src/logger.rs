pub use tracing::{debug, error, info, warn, trace, instrument};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Default filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

fn build_filter() -> (EnvFilter, bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Span timings are only interesting when someone asked for debug output.
    let is_debug = env_filter.to_string().contains("debug") ||
                   std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    (env_filter, is_debug)
}

/// Install the global subscriber. Panics if one is already installed.
pub fn init() {
    if !try_init() {
        panic!("a global tracing subscriber is already installed");
    }
}

/// Install the global subscriber, returning `false` if one was already set.
///
/// Benches use this since criterion may run several groups in one process.
pub fn try_init() -> bool {
    let (env_filter, is_debug) = build_filter();

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
