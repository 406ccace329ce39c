//! Paces probe starts independently of schedule firings.
//!
//! Timers submit jobs without blocking. A single task drains the queue in
//! FIFO order, waits for the pacing gate before each start, and spawns the
//! probe so that slow responses never hold back the next start.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use super::types::ProbeJob;

/// Minimum spacing between two probe starts unless configured otherwise
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(200);

/// Runs a dispatched job to completion
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: ProbeJob);
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("dispatcher is no longer accepting jobs")]
pub struct DispatchClosed;

/// Cloneable submission side of the dispatcher queue
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::UnboundedSender<ProbeJob>,
}

impl From<mpsc::UnboundedSender<ProbeJob>> for JobSender {
    fn from(tx: mpsc::UnboundedSender<ProbeJob>) -> Self {
        Self { tx }
    }
}

impl JobSender {
    /// Enqueue without waiting; fails only once the dispatcher has stopped.
    pub fn submit(&self, job: ProbeJob) -> Result<(), DispatchClosed> {
        self.tx.send(job).map_err(|_| DispatchClosed)
    }
}

/// Token-at-interval gate. The dispatcher task is its only user, so the
/// last start time needs no lock.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_start: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_start: None }
    }

    /// Wait until a start is allowed and claim it
    pub async fn acquire(&mut self) -> Instant {
        if let Some(last) = self.last_start {
            sleep_until(last + self.interval).await;
        }
        let now = Instant::now();
        self.last_start = Some(now);
        now
    }
}

/// Counters reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Probes handed to the handler
    pub started: u64,
    /// Queued jobs discarded at shutdown before starting
    pub dropped: u64,
    /// In-flight probes cancelled after the grace period
    pub aborted: u64,
}

pub struct Dispatcher {
    queue: mpsc::UnboundedReceiver<ProbeJob>,
    handler: Arc<dyn JobHandler>,
    pacer: Pacer,
    grace: Duration,
}

impl Dispatcher {
    pub fn new(
        handler: Arc<dyn JobHandler>,
        pacing_interval: Duration,
        grace: Duration,
    ) -> (Self, JobSender) {
        let (tx, queue) = mpsc::unbounded_channel();
        let dispatcher = Self { queue, handler, pacer: Pacer::new(pacing_interval), grace };
        (dispatcher, JobSender::from(tx))
    }

    /// Start draining the queue on a background task
    pub fn spawn(self) -> DispatcherHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(stop_rx));
        DispatcherHandle { stop: stop_tx, join }
    }

    async fn run(self, mut stop: oneshot::Receiver<()>) -> DispatchStats {
        let Dispatcher { mut queue, handler, mut pacer, grace } = self;
        let mut inflight = JoinSet::new();
        let mut stats = DispatchStats::default();

        'drain: loop {
            tokio::select! {
                biased;

                _ = &mut stop => break 'drain,

                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Probe task panicked: {}", e);
                        }
                    }
                }

                job = queue.recv() => {
                    let Some(job) = job else { break 'drain };

                    tokio::select! {
                        biased;
                        _ = &mut stop => {
                            stats.dropped += 1;
                            break 'drain;
                        }
                        _ = pacer.acquire() => {}
                    }

                    debug!(url = %job.target.url, fired_at = %job.fired_at, "Starting probe");
                    let handler = handler.clone();
                    inflight.spawn(async move { handler.handle(job).await });
                    stats.started += 1;
                }
            }
        }

        queue.close();
        while queue.try_recv().is_ok() {
            stats.dropped += 1;
        }
        if stats.dropped > 0 {
            warn!(dropped = stats.dropped, "Discarded queued probes at shutdown");
        }

        if timeout(grace, drain(&mut inflight)).await.is_err() {
            stats.aborted = inflight.len() as u64;
            warn!(
                aborted = stats.aborted,
                "In-flight probes did not finish within {:?}, cancelling", grace
            );
            inflight.abort_all();
            drain(&mut inflight).await;
        }

        info!(started = stats.started, "Dispatcher stopped");
        stats
    }
}

async fn drain(inflight: &mut JoinSet<()>) {
    while inflight.join_next().await.is_some() {}
}

/// Owner side of a running dispatcher
pub struct DispatcherHandle {
    stop: oneshot::Sender<()>,
    join: JoinHandle<DispatchStats>,
}

impl DispatcherHandle {
    /// Stop starting probes, drop the backlog and wait out in-flight probes
    /// for at most the grace period.
    pub async fn shutdown(self) -> DispatchStats {
        let _ = self.stop.send(());
        match self.join.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Dispatcher task failed: {}", e);
                DispatchStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::Target;
    use chrono::Utc;
    use parking_lot::Mutex;
    use tokio::time::sleep;

    /// Records start instants and holds each probe for `hold`.
    struct SlowHandler {
        starts: Mutex<Vec<(String, Instant)>>,
        hold: Duration,
    }

    impl SlowHandler {
        fn new(hold: Duration) -> Arc<Self> {
            Arc::new(Self { starts: Mutex::new(Vec::new()), hold })
        }
    }

    #[async_trait::async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, job: ProbeJob) {
            self.starts.lock().push((job.target.url.clone(), Instant::now()));
            sleep(self.hold).await;
        }
    }

    fn job(url: &str) -> ProbeJob {
        let target = Target {
            url: url.to_string(),
            schedule: "@every 1m".parse().unwrap(),
            channel: "#ops".into(),
        };
        ProbeJob::new(Arc::new(target), Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_spacing() {
        let mut pacer = Pacer::new(Duration::from_millis(200));
        let first = pacer.acquire().await;
        let second = pacer.acquire().await;
        sleep(Duration::from_secs(1)).await;
        let third = pacer.acquire().await;

        assert_eq!(second - first, Duration::from_millis(200));
        // An idle gate opens immediately.
        assert_eq!(third - second, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_paced_but_not_serialized() {
        let handler = SlowHandler::new(Duration::from_secs(1));
        let (dispatcher, sender) =
            Dispatcher::new(handler.clone(), DEFAULT_PACING_INTERVAL, Duration::from_secs(5));

        let submitted = Instant::now();
        for i in 0..5 {
            sender.submit(job(&format!("http://site-{i}.test/"))).unwrap();
        }
        let running = dispatcher.spawn();

        sleep(Duration::from_secs(3)).await;
        let stats = running.shutdown().await;

        let starts = handler.starts.lock().clone();
        assert_eq!(starts.len(), 5);
        assert_eq!(stats, DispatchStats { started: 5, dropped: 0, aborted: 0 });

        // FIFO order
        let urls: Vec<_> = starts.iter().map(|(url, _)| url.clone()).collect();
        let expected: Vec<_> = (0..5).map(|i| format!("http://site-{i}.test/")).collect();
        assert_eq!(urls, expected);

        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= DEFAULT_PACING_INTERVAL);
        }
        let last = starts[4].1 - submitted;
        assert!(last >= DEFAULT_PACING_INTERVAL * 4);
        // Each probe holds for 1s, so strictly sequential execution would need 4s.
        assert!(last < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_backlog_and_aborts_stragglers() {
        let handler = SlowHandler::new(Duration::from_secs(10));
        let (dispatcher, sender) =
            Dispatcher::new(handler.clone(), Duration::from_secs(1), Duration::from_secs(2));

        for i in 0..4 {
            sender.submit(job(&format!("http://site-{i}.test/"))).unwrap();
        }
        let running = dispatcher.spawn();

        sleep(Duration::from_millis(1500)).await;
        let begun = Instant::now();
        let stats = running.shutdown().await;

        assert_eq!(stats, DispatchStats { started: 2, dropped: 2, aborted: 2 });
        assert_eq!(begun.elapsed(), Duration::from_secs(2));
        assert_eq!(sender.submit(job("http://late.test/")), Err(DispatchClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_quick_probes() {
        let handler = SlowHandler::new(Duration::from_millis(300));
        let (dispatcher, sender) =
            Dispatcher::new(handler.clone(), DEFAULT_PACING_INTERVAL, Duration::from_secs(5));
        let running = dispatcher.spawn();

        sender.submit(job("http://one.test/")).unwrap();
        sleep(Duration::from_millis(10)).await;
        let stats = running.shutdown().await;

        assert_eq!(stats, DispatchStats { started: 1, dropped: 0, aborted: 0 });
    }
}
