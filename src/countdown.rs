//! Round countdown arithmetic.
use chrono::{DateTime, Duration, Utc};

use crate::format::parse_chain_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub next_round: DateTime<Utc>,
    /// Whole minutes until `next_round`, rounded toward negative infinity.
    pub minutes_left: i64,
}

/// `next_round = last_round + sec_per_round`,
/// `minutes_left = floor((next_round - now) / 60s)`.
///
/// `None` when `next_round` falls outside the representable date range.
pub fn countdown_at(
    last_round: DateTime<Utc>,
    sec_per_round: i64,
    now: DateTime<Utc>,
) -> Option<Countdown> {
    let next_round = last_round.checked_add_signed(Duration::try_seconds(sec_per_round)?)?;
    let seconds_left = next_round.signed_duration_since(now).num_seconds();
    Some(Countdown {
        next_round,
        minutes_left: seconds_left.div_euclid(60),
    })
}

/// Same as [`countdown_at`] on a raw chain timestamp.
pub fn countdown_from_raw(last_round: &str, sec_per_round: i64, now: DateTime<Utc>) -> Option<Countdown> {
    parse_chain_time(last_round).and_then(|ts| countdown_at(ts, sec_per_round, now))
}

pub fn is_threshold(minutes_left: i64, thresholds: &[i64]) -> bool {
    thresholds.contains(&minutes_left)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn ten_seconds_left_is_zero_minutes() {
        let c = countdown_at(t0(), 600, t0() + Duration::seconds(590)).unwrap();
        assert_eq!(c.minutes_left, 0);
        assert!(!is_threshold(c.minutes_left, &[10, 3]));
    }

    #[test]
    fn exactly_ten_minutes_fires() {
        let c = countdown_at(t0(), 1200, t0() + Duration::seconds(600)).unwrap();
        assert_eq!(c.minutes_left, 10);
        assert_eq!(c.next_round, t0() + Duration::seconds(1200));
        assert!(is_threshold(c.minutes_left, &[10, 3]));
    }

    #[test]
    fn partial_minutes_floor() {
        // 10m59s left still reads as 10.
        let c = countdown_at(t0(), 1200, t0() + Duration::seconds(541)).unwrap();
        assert_eq!(c.minutes_left, 10);
        // 2m01s left reads as 2, which is not a threshold.
        let c = countdown_at(t0(), 1200, t0() + Duration::seconds(1079)).unwrap();
        assert_eq!(c.minutes_left, 2);
    }

    #[test]
    fn overdue_rounds_are_negative() {
        let c = countdown_at(t0(), 60, t0() + Duration::seconds(61)).unwrap();
        assert_eq!(c.minutes_left, -1);
        assert!(!is_threshold(c.minutes_left, &[10, 3]));
    }

    #[test]
    fn raw_timestamp_parse() {
        let c = countdown_from_raw("2024-01-01T00:00:00", 1200, t0() + Duration::seconds(1020)).unwrap();
        assert_eq!(c.minutes_left, 3);
        assert!(countdown_from_raw("garbage", 1200, t0()).is_none());
    }

    #[test]
    fn out_of_range_round_length_is_none() {
        assert!(countdown_at(t0(), i64::MAX, t0()).is_none());
        assert!(countdown_at(t0(), i64::MIN, t0()).is_none());
        assert!(countdown_at(t0(), 10_000_000_000_000, t0()).is_none());
        assert!(countdown_from_raw("2024-01-01T00:00:00", 10_000_000_000_000, t0()).is_none());
    }
}
