use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::schedule::ScheduleSpec;

/// A monitored HTTP endpoint with its resolved schedule and alert channel.
///
/// Identity is the URL; targets are immutable once the configuration is loaded.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub schedule: ScheduleSpec,
    pub channel: String,
}

/// One scheduled firing waiting to be probed
#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub target: Arc<Target>,
    pub fired_at: DateTime<Utc>,
}

impl ProbeJob {
    pub fn new(target: Arc<Target>, fired_at: DateTime<Utc>) -> Self {
        Self { target, fired_at }
    }
}

/// Phase latencies of a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latencies {
    /// From the earliest recorded start (DNS start, else connect start) to the response
    pub total: Duration,
    /// Zero when no resolution happened (IP literal, cached address)
    pub dns: Duration,
    /// Connection establishment after resolution, TLS handshake included
    pub connect: Duration,
}

/// Coarse classification of a probe that never produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Protocol,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Dns => write!(f, "dns"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Tls => write!(f, "tls"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Protocol => write!(f, "protocol"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// What happened when a target was probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered; any status code lands here, 2xx or not.
    Response { status: u16, latency: Latencies },
    /// No response was obtained.
    TransportError { kind: TransportErrorKind, detail: String, elapsed: Duration },
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Response { status, .. } if (200..=299).contains(status))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Response { status, .. } => Some(*status),
            ProbeOutcome::TransportError { .. } => None,
        }
    }

    /// Total latency for responses, time to failure otherwise
    pub fn elapsed(&self) -> Duration {
        match self {
            ProbeOutcome::Response { latency, .. } => latency.total,
            ProbeOutcome::TransportError { elapsed, .. } => *elapsed,
        }
    }
}

/// Result of probing one [`ProbeJob`]
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub target: Arc<Target>,
    /// Instant the schedule fired
    pub fired_at: DateTime<Utc>,
    /// Instant the dispatcher let the probe start
    pub started_at: DateTime<Utc>,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn url(&self) -> &str {
        &self.target.url
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}
