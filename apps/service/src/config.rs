use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::alerting::AlertPolicy;
use crate::alerting::slack::{DEFAULT_ICON, DEFAULT_USERNAME};
use crate::error::ConfigError;
use crate::monitoring::validation::{
    validate_http_target, validate_pacing_interval, validate_timeout,
};
use crate::monitoring::{DEFAULT_PACING_INTERVAL, ScheduleSpec, Target};

const DEFAULT_SCHEDULE: &str = "0 */5 * * * *";

fn default_schedule() -> String {
    DEFAULT_SCHEDULE.into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_pacing_interval() -> Duration {
    DEFAULT_PACING_INTERVAL
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_username() -> String {
    DEFAULT_USERNAME.into()
}

fn default_icon() -> String {
    DEFAULT_ICON.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schedule for sites without their own
    #[serde(default = "default_schedule")]
    pub cron_expression: String,

    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_pacing_interval")]
    pub pacing_interval: Duration,

    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,

    #[serde(default)]
    pub alert_policy: AlertPolicy,

    pub slack: SlackConfig,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook: String,
    /// Channel for sites without their own
    pub channel: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_icon")]
    pub icon_emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pill/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("pill/config.toml"))
}

/// Resolve an optional user-supplied path to the file actually used
pub fn resolve_path(optional_path: Option<impl AsRef<path::Path>>) -> Result<path::PathBuf, ConfigError> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

/// Treat blank overrides as absent
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Probing")?;
        write_1(f, "Default Schedule", &self.cron_expression)?;
        write_1(f, "Timeout", &humantime::format_duration(self.timeout))?;
        write_1(f, "Pacing Interval", &humantime::format_duration(self.pacing_interval))?;
        write_1(f, "Shutdown Grace", &humantime::format_duration(self.shutdown_grace))?;
        write_1(f, "Alert Policy", &self.alert_policy)?;
        write_title_1(f, "Slack")?;
        write_1(f, "Channel", &self.slack.channel)?;
        write_1(f, "Username", &self.slack.username)?;
        write_title_1(f, "Sites")?;
        for site in &self.sites {
            write_1(f, "URL", &site.url)?;
            if let Some(channel) = non_blank(&site.channel) {
                write_2(f, "Channel", &channel)?;
            }
            if let Some(schedule) = non_blank(&site.cron_expression) {
                write_2(f, "Schedule", &schedule)?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load the configuration from `optional_path` or the default location.
    ///
    /// A missing or unreadable file is an error; `pill init` writes a sample.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = resolve_path(optional_path)?;

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
        Self::parse(&raw_string)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    /// Starting point written by `pill init`
    pub fn sample() -> Self {
        Self {
            cron_expression: default_schedule(),
            timeout: default_timeout(),
            pacing_interval: default_pacing_interval(),
            shutdown_grace: default_shutdown_grace(),
            alert_policy: AlertPolicy::default(),
            slack: SlackConfig {
                webhook: "https://hooks.slack.com/services/CHANGE/ME".into(),
                channel: "#alerts".into(),
                username: default_username(),
                icon_emoji: default_icon(),
            },
            sites: vec![
                SiteConfig { url: "https://example.com".into(), channel: None, cron_expression: None },
                SiteConfig {
                    url: "https://example.org/health".into(),
                    channel: Some("#web".into()),
                    cron_expression: Some("@every 30s".into()),
                },
            ],
        }
    }

    /// Check global settings that do not depend on sites
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        validate_timeout(self.timeout)
            .map_err(|e| ConfigError::InvalidSetting { name: "timeout", reason: e.to_string() })?;
        validate_pacing_interval(self.pacing_interval).map_err(|e| ConfigError::InvalidSetting {
            name: "pacing_interval",
            reason: e.to_string(),
        })?;

        if self.slack.channel.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "slack.channel",
                reason: "must not be empty".into(),
            });
        }
        url::Url::parse(&self.slack.webhook).map_err(|e| ConfigError::InvalidSetting {
            name: "slack.webhook",
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Resolve every site into a [`Target`].
    ///
    /// A site without an override inherits the global value, never the
    /// previous site's. Resolution happens once; firings reuse the result.
    pub fn targets(&self) -> Result<Vec<Arc<Target>>, ConfigError> {
        self.validate_settings()?;

        let default_schedule: ScheduleSpec =
            self.cron_expression.parse().map_err(|source| ConfigError::InvalidSchedule {
                scope: "the global default".into(),
                expression: self.cron_expression.clone(),
                source,
            })?;

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.sites.len());

        for site in &self.sites {
            let url = site.url.trim();
            let parsed = validate_http_target(url)
                .map_err(|e| ConfigError::InvalidTarget { url: url.to_string(), reason: e.to_string() })?;
            if !seen.insert(parsed.to_string()) {
                return Err(ConfigError::DuplicateTarget(url.to_string()));
            }

            let schedule = match non_blank(&site.cron_expression) {
                Some(expression) => {
                    expression.parse().map_err(|source| ConfigError::InvalidSchedule {
                        scope: url.to_string(),
                        expression: expression.to_string(),
                        source,
                    })?
                }
                None => default_schedule.clone(),
            };

            let channel = non_blank(&site.channel).unwrap_or(self.slack.channel.trim()).to_string();

            targets.push(Arc::new(Target { url: url.to_string(), schedule, channel }));
        }

        Ok(targets)
    }
}
