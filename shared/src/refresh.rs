use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);
/// How long before the top of the hour a refresh fires.
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(120);

/// Message sent by the background timer on every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTick {
    pub counter: u64,
    /// Wait that preceded this tick.
    pub delay_secs: u64,
}

/// Time until `lead` before the next top of the hour. Never zero; a refresh inside the lead window rolls to the next hour.
pub fn next_refresh_delay(now: DateTime<Utc>, lead: Duration) -> Duration {
    let interval_ms = REFRESH_INTERVAL.as_millis() as u64;
    let lead_ms = (lead.as_millis() as u64).min(interval_ms - 1);
    let into_hour_ms = u64::from(now.minute() * 60 + now.second()) * 1000
        + u64::from(now.nanosecond() / 1_000_000).min(999);
    let until_top_ms = interval_ms - into_hour_ms;

    let delay_ms = if until_top_ms > lead_ms {
        until_top_ms - lead_ms
    } else {
        until_top_ms + interval_ms - lead_ms
    };
    Duration::from_millis(delay_ms)
}

/// Counts refresh ticks and computes the wait before each one.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    counter: u64,
    lead: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_LEAD)
    }
}

impl RefreshSchedule {
    pub fn new(lead: Duration) -> Self {
        Self { counter: 0, lead }
    }

    pub fn lead(&self) -> Duration {
        self.lead
    }

    /// Wait for the next tick and the tick to emit once it elapses.
    pub fn next(&mut self, now: DateTime<Utc>) -> (Duration, RefreshTick) {
        let delay = next_refresh_delay(now, self.lead);
        self.counter += 1;
        let tick = RefreshTick {
            counter: self.counter,
            delay_secs: delay.as_secs(),
        };
        (delay, tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).single().expect("valid instant")
    }

    #[test]
    fn aligns_to_two_minutes_before_the_hour() {
        assert_eq!(next_refresh_delay(at(10, 0, 0), DEFAULT_REFRESH_LEAD), Duration::from_secs(3480));
        assert_eq!(next_refresh_delay(at(10, 30, 0), DEFAULT_REFRESH_LEAD), Duration::from_secs(1680));
        assert_eq!(next_refresh_delay(at(10, 57, 59), DEFAULT_REFRESH_LEAD), Duration::from_secs(1));
    }

    #[test]
    fn inside_lead_window_rolls_to_next_hour() {
        assert_eq!(next_refresh_delay(at(10, 58, 0), DEFAULT_REFRESH_LEAD), Duration::from_secs(3600));
        assert_eq!(next_refresh_delay(at(10, 59, 30), DEFAULT_REFRESH_LEAD), Duration::from_secs(3510));
    }

    #[test]
    fn zero_lead_targets_top_of_hour() {
        assert_eq!(next_refresh_delay(at(10, 45, 0), Duration::ZERO), Duration::from_secs(900));
    }

    #[test]
    fn schedule_counts_ticks() {
        let mut schedule = RefreshSchedule::default();
        let (delay, first) = schedule.next(at(10, 30, 0));
        let (_, second) = schedule.next(at(11, 58, 0));
        assert_eq!(first, RefreshTick { counter: 1, delay_secs: delay.as_secs() });
        assert_eq!(second.counter, 2);
        assert_eq!(second.delay_secs, 3600);
    }
}
