// SPDX-License-Identifier: AGPL-3.0-or-later
//! Epoch-millisecond timestamps

use chrono::{DateTime, TimeZone, Utc};

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `days` whole days before `now_ms`, saturating at the earliest
/// representable instant
pub fn days_before(now_ms: i64, days: i64) -> i64 {
    now_ms.saturating_sub(days.saturating_mul(MILLIS_PER_DAY))
}

/// Convert epoch milliseconds to a UTC datetime
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let now = now_millis();
        assert_eq!(from_millis(now).unwrap().timestamp_millis(), now);
    }

    #[test]
    fn test_days_before() {
        assert_eq!(days_before(10 * MILLIS_PER_DAY, 3), 7 * MILLIS_PER_DAY);
        assert_eq!(days_before(1_700_000_000_000, 200_000_000_000), i64::MIN);
        assert_eq!(days_before(0, i64::MAX), i64::MIN);
    }
}
