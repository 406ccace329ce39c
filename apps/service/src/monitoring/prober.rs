use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::debug;

use super::trace::ProbeTrace;
use super::transport::Transport;
use super::types::{ProbeJob, ProbeOutcome, ProbeResult, TransportErrorKind};

/// Executes single probes; every failure mode becomes a [`ProbeOutcome`].
pub struct Prober {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Probe the job's target once, without retrying
    pub async fn probe(&self, job: ProbeJob) -> ProbeResult {
        let started_at = Utc::now();
        let trace = Arc::new(ProbeTrace::new());

        debug!(url = %job.target.url, fired_at = %job.fired_at, "Probing");

        let outcome = match timeout(self.timeout, self.transport.get(&job.target.url, trace.clone()))
            .await
        {
            Ok(Ok(status)) => ProbeOutcome::Response { status, latency: trace.latencies(Instant::now()) },
            Ok(Err(failure)) => ProbeOutcome::TransportError {
                kind: failure.kind,
                detail: failure.detail,
                elapsed: trace.elapsed_at(Instant::now()),
            },
            Err(_) => ProbeOutcome::TransportError {
                kind: TransportErrorKind::Timeout,
                detail: format!("no response within {:?}", self.timeout),
                elapsed: trace.elapsed_at(Instant::now()),
            },
        };

        ProbeResult { target: job.target, fired_at: job.fired_at, started_at, outcome }
    }
}
