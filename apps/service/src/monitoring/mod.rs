/// Probing engine
///
/// This module is responsible for:
/// - Parsing schedule expressions and running one timer per target
/// - Pacing probe starts through the dispatcher
/// - Executing instrumented HTTP GETs and measuring phase latency
pub mod dispatcher;
pub mod prober;
pub mod schedule;
pub mod scheduler;
pub mod trace;
pub mod transport;
pub mod types;
pub mod validation;

pub use dispatcher::{
    DEFAULT_PACING_INTERVAL, DispatchStats, Dispatcher, DispatcherHandle, JobHandler, JobSender,
};
pub use prober::Prober;
pub use schedule::{ScheduleError, ScheduleSpec};
pub use scheduler::{RunningScheduler, Scheduler};
pub use trace::ProbeTrace;
pub use transport::{HttpTransport, Transport, TransportFailure};
pub use types::{Latencies, ProbeJob, ProbeOutcome, ProbeResult, Target, TransportErrorKind};
