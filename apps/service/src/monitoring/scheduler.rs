use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::JobSender;
use super::types::{ProbeJob, Target};

/// Owns one recurring timer per target and submits a job at each firing.
pub struct Scheduler {
    targets: Vec<Arc<Target>>,
    sender: JobSender,
}

impl Scheduler {
    pub fn new(targets: Vec<Arc<Target>>, sender: JobSender) -> Self {
        Self { targets, sender }
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    /// Start every timer. Each target runs on its own task, so firings of
    /// different targets never wait on each other.
    pub fn start(self) -> RunningScheduler {
        let handles = self
            .targets
            .into_iter()
            .map(|target| schedule_target(target, self.sender.clone()))
            .collect();

        RunningScheduler { handles }
    }
}

fn schedule_target(target: Arc<Target>, sender: JobSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(url = %target.url, schedule = %target.schedule, "Timer registered");
        let mut ticker = target.schedule.ticker();

        loop {
            let Some(fired_at) = ticker.tick().await else {
                info!(url = %target.url, "Schedule has no further firings");
                break;
            };

            debug!(url = %target.url, %fired_at, "Timer fired");
            if sender.submit(ProbeJob::new(target.clone(), fired_at)).is_err() {
                warn!(url = %target.url, "Dispatcher closed, stopping timer");
                break;
            }
        }
    })
}

/// Handles of the running timers
pub struct RunningScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl RunningScheduler {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every timer and wait until they are gone
    pub async fn stop(self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("All timers stopped");
    }
}
