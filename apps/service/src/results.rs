//! Forwarding of every probe result to the logging/persistence collaborator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::monitoring::{ProbeOutcome, ProbeResult};

/// Flat record of one probe, as handed to a [`ResultStore`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub url: String,
    pub fired_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "humantime_serde")]
    pub total: Duration,
    #[serde(with = "humantime_serde")]
    pub dns: Duration,
    #[serde(with = "humantime_serde")]
    pub connect: Duration,
}

impl From<&ProbeResult> for ResultRecord {
    fn from(result: &ProbeResult) -> Self {
        let mut record = ResultRecord {
            url: result.url().to_string(),
            fired_at: result.fired_at,
            started_at: result.started_at,
            healthy: result.outcome.is_success(),
            status_code: None,
            error_kind: None,
            error_message: None,
            total: result.outcome.elapsed(),
            dns: Duration::ZERO,
            connect: Duration::ZERO,
        };

        match &result.outcome {
            ProbeOutcome::Response { status, latency } => {
                record.status_code = Some(*status);
                record.dns = latency.dns;
                record.connect = latency.connect;
            }
            ProbeOutcome::TransportError { kind, detail, .. } => {
                record.error_kind = Some(kind.to_string());
                record.error_message = Some(detail.clone());
            }
        }

        record
    }
}

/// Logging/persistence collaborator; fire-and-forget from the engine's view
pub trait ResultStore: Send + Sync {
    fn record(&self, record: &ResultRecord);
}

/// Emits each record as a structured event on the `pill::results` target
#[derive(Debug, Default)]
pub struct TracingStore;

impl ResultStore for TracingStore {
    fn record(&self, record: &ResultRecord) {
        let total_ms = record.total.as_secs_f64() * 1000.0;
        let dns_ms = record.dns.as_secs_f64() * 1000.0;
        let connect_ms = record.connect.as_secs_f64() * 1000.0;

        if record.healthy {
            info!(
                target: "pill::results",
                url = %record.url,
                status = record.status_code,
                total_ms,
                dns_ms,
                connect_ms,
                fired_at = %record.fired_at,
                "GET {} ({:?}) - {:?}", record.url, record.status_code.unwrap_or_default(), record.total
            );
        } else {
            warn!(
                target: "pill::results",
                url = %record.url,
                status = record.status_code,
                error_kind = record.error_kind.as_deref(),
                error = record.error_message.as_deref(),
                total_ms,
                dns_ms,
                connect_ms,
                fired_at = %record.fired_at,
                "GET {} failed - {:?}", record.url, record.total
            );
        }
    }
}

pub struct ResultSink {
    store: Arc<dyn ResultStore>,
}

impl ResultSink {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    pub fn accept(&self, result: &ProbeResult) {
        self.store.record(&ResultRecord::from(result));
    }
}
