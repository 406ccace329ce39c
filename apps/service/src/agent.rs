//! Agent - wires the probing pipeline together
//!
//! The agent is built in two phases:
//! - `build` resolves every schedule and constructs the dispatcher and
//!   scheduler without starting anything; configuration errors surface here
//! - `run` starts the dispatcher, then the timers, and keeps going until the
//!   shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::alerting::{AlertSink, Notifier, SlackNotifier};
use crate::config::Config;
use crate::error::ConfigError;
use crate::monitoring::{
    DispatchStats, Dispatcher, HttpTransport, JobHandler, ProbeJob, Prober, Scheduler, Transport,
};
use crate::results::{ResultSink, ResultStore, TracingStore};

/// External collaborators the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn ResultStore>,
}

impl Collaborators {
    /// HTTP probing, Slack alerts and tracing-backed result records
    pub fn production(config: &Config) -> anyhow::Result<Self> {
        let notifier = SlackNotifier::new(
            config.slack.webhook.clone(),
            config.slack.username.clone(),
            config.slack.icon_emoji.clone(),
            config.timeout,
        )?;

        Ok(Self {
            transport: Arc::new(HttpTransport::new(config.timeout)),
            notifier: Arc::new(notifier),
            store: Arc::new(TracingStore),
        })
    }
}

/// Probe, then record, then alert if needed
struct ProbePipeline {
    prober: Prober,
    results: ResultSink,
    alerts: AlertSink,
}

#[async_trait::async_trait]
impl JobHandler for ProbePipeline {
    async fn handle(&self, job: ProbeJob) {
        let result = self.prober.probe(job).await;
        self.results.accept(&result);
        self.alerts.accept(&result).await;
    }
}

pub struct Agent {
    scheduler: Scheduler,
    dispatcher: Dispatcher,
}

impl Agent {
    /// Build phase: resolve targets and construct components. Nothing runs yet.
    pub fn build(config: &Config, collaborators: Collaborators) -> Result<Self, ConfigError> {
        let targets = config.targets()?;

        let pipeline = ProbePipeline {
            prober: Prober::new(collaborators.transport, config.timeout),
            results: ResultSink::new(collaborators.store),
            alerts: AlertSink::new(collaborators.notifier, config.alert_policy),
        };

        let (dispatcher, sender) =
            Dispatcher::new(Arc::new(pipeline), config.pacing_interval, config.shutdown_grace);
        let scheduler = Scheduler::new(targets, sender);

        Ok(Self { scheduler, dispatcher })
    }

    pub fn target_count(&self) -> usize {
        self.scheduler.targets().len()
    }

    /// Run phase: probe on schedule until `shutdown` resolves, then stop the
    /// timers and drain the dispatcher within its grace period.
    pub async fn run<F>(self, shutdown: F) -> DispatchStats
    where
        F: Future<Output = ()>,
    {
        info!(targets = self.target_count(), "Starting probing engine");

        let dispatcher = self.dispatcher.spawn();
        let timers = self.scheduler.start();

        shutdown.await;
        info!("Shutdown requested, stopping timers");

        timers.stop().await;
        let stats = dispatcher.shutdown().await;

        info!(
            started = stats.started,
            dropped = stats.dropped,
            aborted = stats.aborted,
            "Probing engine stopped"
        );
        stats
    }
}
