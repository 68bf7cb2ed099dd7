use crate::config::ObservabilityConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Map a configured level name onto a tracing level.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global fmt subscriber. Returns `false` when one was already
/// installed, which leaves the existing subscriber in place.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let level = parse_level(&config.log_level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level.unwrap_or(Level::INFO))
        .finish();
    let installed = tracing::subscriber::set_global_default(subscriber).is_ok();

    if installed && level.is_none() {
        tracing::warn!(
            "Unknown log level '{}', falling back to info",
            config.log_level
        );
    }
    installed
}
