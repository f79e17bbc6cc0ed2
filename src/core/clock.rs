//! Time source injected into every time-sensitive operation.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock frozen at `instant`.
    #[must_use]
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Clock frozen at a naive UTC date-time.
    #[must_use]
    pub fn at(naive: NaiveDateTime) -> Self {
        Self(naive.and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts an instant to a mess's local wall time.
#[must_use]
pub fn local_datetime(now: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    now.naive_utc() + Duration::minutes(i64::from(utc_offset_minutes))
}

/// The mess-local calendar date of an instant.
#[must_use]
pub fn local_date(now: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    local_datetime(now, utc_offset_minutes).date()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(20, 30, 0)
            .unwrap()
            .and_utc();
        // UTC+6 puts 20:30 UTC on the next day
        assert_eq!(
            local_date(now, 360),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
        );
        assert_eq!(local_date(now, 0), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_fixed_clock_does_not_move() {
        let clock = FixedClock::new(Utc::now());
        assert_eq!(clock.now(), clock.now());
    }
}
