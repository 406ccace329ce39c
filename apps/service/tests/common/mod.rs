//! Simulated collaborators shared by the integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pill::alerting::{DeliveryError, Notifier};
use pill::monitoring::{ProbeTrace, Transport, TransportErrorKind, TransportFailure};
use pill::results::{ResultRecord, ResultStore};
use pill::{Collaborators, Config};

/// Answers with queued status codes, then 200 once the script runs out.
/// URLs listed in `refused` always fail to connect.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<u16, TransportFailure>>>,
    pub calls: AtomicUsize,
    pub latency: Duration,
    pub refused: Vec<String>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Result<u16, TransportFailure>>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, trace: Arc<ProbeTrace>) -> Result<u16, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace.connect_start();
        if self.refused.iter().any(|refused| refused == url) {
            trace.connect_failed();
            return Err(TransportFailure::new(TransportErrorKind::Connect, "connection refused"));
        }
        trace.connect_done();
        tokio::time::sleep(self.latency).await;
        let next = self.script.lock().pop_front();
        next.unwrap_or(Ok(200))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        self.sent.lock().push((channel.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<ResultRecord>>,
}

impl ResultStore for MemoryStore {
    fn record(&self, record: &ResultRecord) {
        self.records.lock().push(record.clone());
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            notifier: Arc::new(RecordingNotifier::default()),
            store: Arc::new(MemoryStore::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            transport: self.transport.clone(),
            notifier: self.notifier.clone(),
            store: self.store.clone(),
        }
    }
}

pub fn config(raw: &str) -> Config {
    Config::parse(raw).expect("test configuration parses")
}
