//! Time source for day and week boundaries.
//!
//! Daily quotas reset at local midnight, so the engine needs both the current
//! instant and the local UTC offset. Tests pin both with [`FixedClock`].

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the local timezone at `now`
    fn local_offset(&self) -> FixedOffset;

    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.local_offset())
    }

    /// 00:00 local time today
    fn start_of_day(&self) -> DateTime<Utc> {
        let local = self.local_now();
        local_midnight(local.date_naive(), self.local_offset()).with_timezone(&Utc)
    }

    /// 00:00 local time on the Monday of this week
    fn start_of_week(&self) -> DateTime<Utc> {
        let local = self.local_now();
        let days_since_monday = i64::from(local.weekday().num_days_from_monday());
        let monday = local.date_naive() - Duration::days(days_since_monday);
        local_midnight(monday, self.local_offset()).with_timezone(&Utc)
    }

    /// Next local midnight, when the daily quota resets
    fn next_day_start(&self) -> DateTime<FixedOffset> {
        let tomorrow = self.local_now().date_naive() + Duration::days(1);
        local_midnight(tomorrow, self.local_offset())
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let naive_utc =
        date.and_time(NaiveTime::MIN) - Duration::seconds(i64::from(offset.local_minus_utc()));
    offset.from_utc_datetime(&naive_utc)
}

/// Wall clock in the process's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// Settable clock for tests
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn local_offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_start_of_day_utc() {
        let clock = FixedClock::utc(at("2025-03-12T15:30:00Z"));
        assert_eq!(clock.start_of_day(), at("2025-03-12T00:00:00Z"));
        assert_eq!(
            clock.next_day_start().with_timezone(&Utc),
            at("2025-03-13T00:00:00Z")
        );
    }

    #[test]
    fn test_start_of_day_respects_offset() {
        // 23:30 UTC is already the next day in UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let clock = FixedClock::new(at("2025-03-12T23:30:00Z"), plus_two);
        assert_eq!(clock.start_of_day(), at("2025-03-12T22:00:00Z"));
        assert_eq!(clock.next_day_start().offset(), &plus_two);
        assert_eq!(
            clock.next_day_start().with_timezone(&Utc),
            at("2025-03-13T22:00:00Z")
        );
    }

    #[test]
    fn test_start_of_week_is_monday() {
        // 2025-03-12 is a Wednesday
        let clock = FixedClock::utc(at("2025-03-12T15:30:00Z"));
        assert_eq!(clock.start_of_week(), at("2025-03-10T00:00:00Z"));

        let monday = FixedClock::utc(at("2025-03-10T00:00:00Z"));
        assert_eq!(monday.start_of_week(), at("2025-03-10T00:00:00Z"));
    }

    #[test]
    fn test_advance() {
        let clock = FixedClock::utc(at("2025-03-12T23:59:00Z"));
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.start_of_day(), at("2025-03-13T00:00:00Z"));
    }
}
