//! Diagnostics go to stderr so stdout carries only orchestration output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding the log filter, e.g. `debug` or `agilecentral=trace`.
pub const LOG_ENV: &str = "AGILE_CENTRAL_LOG";
const DEFAULT_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init() {
    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(false)
            .with_filter(filter()),
    );

    // Tests may have installed one already.
    if subscriber.try_init().is_err() {
        tracing::debug!("global tracing subscriber already set");
    }
}
