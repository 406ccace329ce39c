//! Schedule expressions and the timers derived from them.
//!
//! Two forms are accepted:
//! - cron expressions with a leading seconds field (`0 */5 * * * *`) and the
//!   `@hourly`/`@daily`/... shorthands
//! - `@every <duration>` for fixed intervals, first firing one period after start

use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

const EVERY_PREFIX: &str = "@every";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule expression is empty")]
    Empty,

    #[error("invalid @every duration `{0}`: {1}")]
    Duration(String, String),

    #[error("@every interval must be greater than zero")]
    ZeroInterval,

    #[error("@every interval `{0}` is out of range")]
    OutOfRange(String),

    #[error("invalid cron expression: {0}")]
    Cron(String),
}

#[derive(Debug, Clone)]
enum Kind {
    Cron(cron::Schedule),
    Every(Duration),
}

/// A parsed schedule together with the expression it came from
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    expression: String,
    kind: Kind,
}

impl FromStr for ScheduleSpec {
    type Err = ScheduleError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let kind = if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
            let rest = rest.trim();
            let period = humantime::parse_duration(rest)
                .map_err(|e| ScheduleError::Duration(rest.to_string(), e.to_string()))?;
            if period.is_zero() {
                return Err(ScheduleError::ZeroInterval);
            }
            chrono::Duration::from_std(period)
                .ok()
                .and_then(|p| Utc::now().checked_add_signed(p))
                .ok_or_else(|| ScheduleError::OutOfRange(rest.to_string()))?;
            Kind::Every(period)
        } else {
            let schedule = cron::Schedule::from_str(trimmed)
                .map_err(|e| ScheduleError::Cron(e.to_string()))?;
            Kind::Cron(schedule)
        };

        Ok(Self { expression: trimmed.to_string(), kind })
    }
}

impl std::fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl ScheduleSpec {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First firing strictly after `from`, `None` once a bounded cron is exhausted
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            Kind::Cron(schedule) => schedule.after(&from).next(),
            Kind::Every(period) => {
                chrono::Duration::from_std(*period).ok().and_then(|p| from.checked_add_signed(p))
            }
        }
    }

    /// The next `count` firings after `from`
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut fired = Vec::with_capacity(count);
        let mut cursor = from;
        while fired.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    fired.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        fired
    }

    /// Build the recurring timer for this schedule, anchored at now
    pub fn ticker(&self) -> Ticker {
        match &self.kind {
            Kind::Cron(schedule) => Ticker::Cron { schedule: schedule.clone(), last: None },
            Kind::Every(period) => {
                let origin = Instant::now();
                let mut timer = interval_at(origin + *period, *period);
                // A late tick fires once; missed instants are not replayed.
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Every { timer, origin, origin_wall: Utc::now() }
            }
        }
    }
}

/// Recurring timer yielding firing instants
pub enum Ticker {
    Cron { schedule: cron::Schedule, last: Option<DateTime<Utc>> },
    Every { timer: Interval, origin: Instant, origin_wall: DateTime<Utc> },
}

impl Ticker {
    /// Wait for the next firing and return its scheduled instant.
    ///
    /// Returns `None` when the schedule has no further occurrences.
    pub async fn tick(&mut self) -> Option<DateTime<Utc>> {
        match self {
            Ticker::Cron { schedule, last } => {
                let now = Utc::now();
                // Never fire the same instant twice if the wall clock lags the timer.
                let from = last.map_or(now, |l| l.max(now));
                let next = schedule.after(&from).next()?;
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                *last = Some(next);
                Some(next)
            }
            Ticker::Every { timer, origin, origin_wall } => {
                let fired = timer.tick().await;
                let offset = chrono::Duration::from_std(fired.duration_since(*origin)).ok()?;
                origin_wall.checked_add_signed(offset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn parse(expression: &str) -> Result<ScheduleSpec, ScheduleError> {
        expression.parse()
    }

    #[test]
    fn test_parse_cron_with_seconds() {
        let schedule = parse("0 */5 * * * *").unwrap();
        assert_eq!(schedule.expression(), "0 */5 * * * *");
    }

    #[test]
    fn test_parse_shorthand() {
        assert!(parse("@hourly").is_ok());
        assert!(parse("@daily").is_ok());
    }

    #[test]
    fn test_parse_every() {
        let schedule = parse("@every 30s").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(schedule.next_after(from), Some(from + chrono::Duration::seconds(30)));

        let schedule = parse("@every 1m 30s").unwrap();
        assert_eq!(schedule.next_after(from), Some(from + chrono::Duration::seconds(90)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse("").unwrap_err(), ScheduleError::Empty);
        assert_eq!(parse("   ").unwrap_err(), ScheduleError::Empty);
        assert!(matches!(parse("not a cron"), Err(ScheduleError::Cron(_))));
        assert!(matches!(parse("61 * * * * *"), Err(ScheduleError::Cron(_))));
        assert!(matches!(parse("@every soon"), Err(ScheduleError::Duration(_, _))));
        assert_eq!(parse("@every 0s").unwrap_err(), ScheduleError::ZeroInterval);
    }

    #[test]
    fn test_every_rejects_interval_beyond_calendar() {
        assert_eq!(
            parse("@every 300000years").unwrap_err(),
            ScheduleError::OutOfRange("300000years".into())
        );
        assert!(parse("@every 100years").is_ok());
    }

    #[test]
    fn test_next_after_near_calendar_end_is_none() {
        let schedule = parse("@every 1day").unwrap();
        assert_eq!(schedule.next_after(DateTime::<Utc>::MAX_UTC), None);
        assert!(schedule.upcoming(DateTime::<Utc>::MAX_UTC, 3).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_ticker_fires_each_instant_once() {
        let schedule = parse("*/2 * * * * *").unwrap();
        let mut ticker = schedule.ticker();

        let mut fired = Vec::new();
        for _ in 0..5 {
            fired.push(ticker.tick().await.unwrap());
        }

        assert!(fired.iter().all(|at| at.second() % 2 == 0 && at.timestamp_subsec_nanos() == 0));
        for pair in fired.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[1] - pair[0], chrono::Duration::seconds(2));
        }
    }

    #[test]
    fn test_cron_upcoming_is_monotonic_and_spaced() {
        let schedule = parse("*/15 * * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 1).unwrap();
        let fired = schedule.upcoming(from, 6);

        assert_eq!(fired.len(), 6);
        assert_eq!(fired[0].second(), 15);
        for pair in fired.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[1] - pair[0], chrono::Duration::seconds(15));
        }
    }

    #[test]
    fn test_cron_every_five_minutes() {
        let schedule = parse("0 */5 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 10, 12, 2, 0).unwrap();
        let fired = schedule.upcoming(from, 2);
        assert_eq!(fired[0], Utc.with_ymd_and_hms(2024, 3, 10, 12, 5, 0).unwrap());
        assert_eq!(fired[1], Utc.with_ymd_and_hms(2024, 3, 10, 12, 10, 0).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticker_spacing() {
        let schedule = parse("@every 1s").unwrap();
        let mut ticker = schedule.ticker();
        let start = Instant::now();

        let mut fired = Vec::new();
        for _ in 0..4 {
            fired.push(ticker.tick().await.unwrap());
        }

        assert_eq!(start.elapsed(), Duration::from_secs(4));
        for pair in fired.windows(2) {
            assert_eq!(pair[1] - pair[0], chrono::Duration::seconds(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticker_skips_missed_instants() {
        let schedule = parse("@every 1s").unwrap();
        let mut ticker = schedule.ticker();
        let start = Instant::now();

        // Stall past several firing instants before polling again.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let late = ticker.tick().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(3500));

        // The 2s and 3s instants are not replayed.
        let next = ticker.tick().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(next - late, chrono::Duration::seconds(3));
    }
}
