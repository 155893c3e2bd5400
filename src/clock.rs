use chrono::{DateTime, SecondsFormat, TimeZone, Timelike, Utc};

/// Time source for everything that stamps rows. Injected so tests can pin
/// the clock and assert exact orderings.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used in tests.
#[allow(dead_code)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fixed-width RFC 3339 with microseconds, always UTC ("Z"). Stored text
/// compares lexicographically in the same order as the instants themselves,
/// which the ORDER BY clauses rely on.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop the sub-second part. Batch operations stamp every row with this so
/// rows written together compare equal.
pub fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[allow(dead_code)]
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("valid calendar date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn formatted_timestamps_are_fixed_width_and_order_lexicographically() {
        let a = utc(2025, 1, 31, 23, 59, 59) + Duration::microseconds(999_999);
        let b = utc(2025, 2, 1, 0, 0, 0);
        let (fa, fb) = (format_datetime(a), format_datetime(b));
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);

        let c = b + Duration::microseconds(1);
        assert!(format_datetime(b) < format_datetime(c));
    }

    #[test]
    fn parse_roundtrips_format() {
        let dt = utc(2025, 6, 15, 12, 30, 45) + Duration::microseconds(123_456);
        assert_eq!(parse_datetime(&format_datetime(dt)), Some(dt));
        assert_eq!(parse_datetime("not a timestamp"), None);
    }

    #[test]
    fn truncate_drops_subsecond_precision_only() {
        let dt = utc(2025, 6, 15, 12, 30, 45) + Duration::microseconds(987_654);
        assert_eq!(truncate_to_second(dt), utc(2025, 6, 15, 12, 30, 45));
        assert_eq!(
            truncate_to_second(utc(2025, 6, 15, 12, 30, 45)),
            utc(2025, 6, 15, 12, 30, 45)
        );
    }
}
