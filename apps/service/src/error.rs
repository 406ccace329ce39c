use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

use crate::monitoring::ScheduleError;

/// Startup configuration problems; all of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration path available (set XDG_CONFIG_HOME or HOME)")]
    PathUnavailable,

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid schedule `{expression}` for {scope}: {source}")]
    InvalidSchedule {
        scope: String,
        expression: String,
        #[source]
        source: ScheduleError,
    },

    #[error("Duplicate target {0}")]
    DuplicateTarget(String),

    #[error("Invalid target `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("Invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
