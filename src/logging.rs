use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive; wins over the config.
pub const LOG_ENV: &str = "NWS_LOG";

/// Filter from `NWS_LOG`, else `fallback`, else `info`.
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the stderr subscriber. Returns false if one was already set.
pub fn init(fallback: &str) -> bool {
    let subscriber = tracing_subscriber::registry().with(filter(fallback)).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );

    if subscriber.try_init().is_err() {
        return false;
    }

    tracing::debug!(fallback, "tracing initialized");
    true
}
