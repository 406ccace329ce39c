//! Shared tracing setup for the pill binaries.
//!
//! The filter honours `RUST_LOG`; when unset, the default level comes from
//! the caller's verbosity. `PILL_LOG_FORMAT=json` switches to JSON lines.

use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "PILL_LOG_FORMAT";

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Map a `-v` count to the default level filter.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber.
pub fn init(verbosity: u8) -> Result<(), TryInitError> {
    let requested = var(FORMAT_ENV).ok().map(|name| normalize_name(&name));
    let format = requested.as_deref().map(LogFormat::from_name).unwrap_or_default();
    initialize_tracing(level_for(verbosity), format)?;

    if let Some(name) = requested.filter(|name| !is_known_name(name)) {
        warn!("Unknown {FORMAT_ENV} value `{name}`, using compact output");
    }
    Ok(())
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn is_known_name(name: &str) -> bool {
    matches!(normalize_name(name).as_str(), "json" | "compact" | "")
}

fn initialize_tracing(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}
