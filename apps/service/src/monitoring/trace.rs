//! Per-probe record of transport lifecycle instants.
//!
//! Transports call the hooks as resolution and connection progress; the
//! prober turns the marks into [`Latencies`] once the response arrives.
//! The first call of each hook wins, so redirects that open further
//! connections do not overwrite the initial exchange.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::types::Latencies;

#[derive(Debug, Default, Clone, Copy)]
struct Marks {
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    dns_failed: bool,
    connect_start: Option<Instant>,
    connect_done: Option<Instant>,
    connect_failed: bool,
}

#[derive(Debug)]
pub struct ProbeTrace {
    origin: Instant,
    marks: Mutex<Marks>,
}

impl Default for ProbeTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeTrace {
    pub fn new() -> Self {
        Self { origin: Instant::now(), marks: Mutex::new(Marks::default()) }
    }

    pub fn dns_start(&self) {
        self.marks.lock().dns_start.get_or_insert_with(Instant::now);
    }

    pub fn dns_done(&self) {
        self.marks.lock().dns_done.get_or_insert_with(Instant::now);
    }

    pub fn dns_failed(&self) {
        self.marks.lock().dns_failed = true;
    }

    pub fn connect_start(&self) {
        self.marks.lock().connect_start.get_or_insert_with(Instant::now);
    }

    pub fn connect_done(&self) {
        self.marks.lock().connect_done.get_or_insert_with(Instant::now);
    }

    pub fn connect_failed(&self) {
        self.marks.lock().connect_failed = true;
    }

    pub fn resolution_failed(&self) -> bool {
        self.marks.lock().dns_failed
    }

    pub fn connection_failed(&self) -> bool {
        self.marks.lock().connect_failed
    }

    /// DNS start if recorded, else connect start, else trace creation
    fn start(marks: &Marks, origin: Instant) -> Instant {
        marks.dns_start.or(marks.connect_start).unwrap_or(origin)
    }

    /// Time from the earliest recorded start until `at`
    pub fn elapsed_at(&self, at: Instant) -> Duration {
        let marks = *self.marks.lock();
        at.saturating_duration_since(Self::start(&marks, self.origin))
    }

    /// Phase latencies for a response received at `response_at`
    pub fn latencies(&self, response_at: Instant) -> Latencies {
        let marks = *self.marks.lock();
        let start = Self::start(&marks, self.origin);

        let dns = match (marks.dns_start, marks.dns_done) {
            (Some(begin), Some(end)) => end.saturating_duration_since(begin),
            _ => Duration::ZERO,
        };

        // Without resolution the connect start stands in for the DNS timestamp.
        let resolved = marks.dns_done.or(marks.connect_start);
        let connect = match marks.connect_done {
            Some(done) => {
                let base = [resolved, marks.connect_start].into_iter().flatten().max().unwrap_or(start);
                done.saturating_duration_since(base)
            }
            None => Duration::ZERO,
        };

        Latencies { total: response_at.saturating_duration_since(start), dns, connect }
    }
}
