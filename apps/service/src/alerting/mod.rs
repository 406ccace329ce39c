//! Failure alerts.
//!
//! Every failed probe result becomes one [`AlertMessage`] addressed to the
//! target's channel and is handed to a [`Notifier`]. Delivery problems are
//! logged and never retried.

pub mod slack;

pub use slack::SlackNotifier;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::monitoring::{ProbeOutcome, ProbeResult};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification rejected with status {0}")]
    Rejected(u16),

    #[error("notification could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// External notification channel
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Which failures produce an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// Alert on every failed probe
    #[default]
    EveryFailure,
    /// Alert only when a healthy target turns unhealthy
    OnTransition,
}

impl std::fmt::Display for AlertPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertPolicy::EveryFailure => write!(f, "every-failure"),
            AlertPolicy::OnTransition => write!(f, "on-transition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub url: String,
    pub channel: String,
    pub text: String,
}

impl AlertMessage {
    /// Build the alert for a result, `None` when the probe succeeded
    pub fn for_result(result: &ProbeResult) -> Option<Self> {
        if !result.is_failure() {
            return None;
        }

        let url = result.url();
        let text = match &result.outcome {
            ProbeOutcome::Response { status, latency } => {
                let reason = reqwest::StatusCode::from_u16(*status)
                    .ok()
                    .and_then(|code| code.canonical_reason())
                    .unwrap_or("Unknown Status");
                format!("{url} isn't swallowing any pills\n> ({status}:{:?}) {reason}", latency.total)
            }
            ProbeOutcome::TransportError { kind, detail, elapsed } => {
                format!("{url} isn't swallowing any pills\n> ({kind}:{elapsed:?}) {detail}")
            }
        };

        Some(Self { url: url.to_string(), channel: result.target.channel.clone(), text })
    }
}

pub struct AlertSink {
    notifier: Arc<dyn Notifier>,
    policy: AlertPolicy,
    unhealthy: Mutex<HashSet<String>>,
}

impl AlertSink {
    pub fn new(notifier: Arc<dyn Notifier>, policy: AlertPolicy) -> Self {
        Self { notifier, policy, unhealthy: Mutex::new(HashSet::new()) }
    }

    /// Alert on a failed result if the policy asks for it.
    ///
    /// Returns the message that was handed to the notifier, whether or not
    /// delivery succeeded.
    pub async fn accept(&self, result: &ProbeResult) -> Option<AlertMessage> {
        if !self.should_alert(result) {
            return None;
        }

        let message = AlertMessage::for_result(result)?;
        match self.notifier.deliver(&message.channel, &message.text).await {
            Ok(()) => debug!(url = %message.url, channel = %message.channel, "Alert delivered"),
            Err(e) => warn!(url = %message.url, channel = %message.channel, "Failed to deliver alert: {}", e),
        }
        Some(message)
    }

    fn should_alert(&self, result: &ProbeResult) -> bool {
        let failed = result.is_failure();
        match self.policy {
            AlertPolicy::EveryFailure => failed,
            AlertPolicy::OnTransition => {
                let mut unhealthy = self.unhealthy.lock();
                if failed {
                    unhealthy.insert(result.url().to_string())
                } else {
                    if unhealthy.remove(result.url()) {
                        info!(url = %result.url(), "Target recovered");
                    }
                    false
                }
            }
        }
    }
}
