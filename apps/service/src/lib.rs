//! Pill - scheduled HTTP probing with Slack alerts
//!
//! Each configured site is probed on its own cron or `@every` schedule.
//! Probe starts are paced globally, latency is broken down into DNS and
//! connection phases, and failures are reported to Slack.

pub mod agent;
pub mod alerting;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod results;

pub use agent::{Agent, Collaborators};
pub use config::Config;
pub use error::ConfigError;
