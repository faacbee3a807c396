use crate::types::{DataPoint, TimeRange};
use chrono::{DateTime, Datelike};

/// Floor a raw timestamp (UTC seconds) to the bucket for a range: minute for
/// 1H, hour for 1W, day for 1M, week (Monday 00:00 UTC) for 1Y.
pub fn bucket_time(range: TimeRange, time: i64) -> i64 {
    match range {
        TimeRange::OneHour => time - time.rem_euclid(60),
        TimeRange::OneWeek => time - time.rem_euclid(3600),
        TimeRange::OneMonth => time - time.rem_euclid(86_400),
        TimeRange::OneYear => {
            let day = time - time.rem_euclid(86_400);
            let days_from_monday = DateTime::from_timestamp(day, 0)
                .map(|dt| dt.weekday().num_days_from_monday() as i64)
                .unwrap_or(0);
            day - days_from_monday * 86_400
        }
    }
}

/// Return a copy of `point` with its timestamp floored to the bucket for
/// `range`; all other fields are unchanged. Idempotent: an already-floored
/// timestamp maps to itself.
pub fn choose_timestamp(range: TimeRange, point: &DataPoint) -> DataPoint {
    DataPoint {
        time: bucket_time(range, point.time),
        ..point.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_floor_for_one_hour() {
        assert_eq!(bucket_time(TimeRange::OneHour, 1000), 960);
        assert_eq!(bucket_time(TimeRange::OneHour, 960), 960);
        assert_eq!(bucket_time(TimeRange::OneHour, 59), 0);
    }

    #[test]
    fn test_hour_floor_for_one_week() {
        assert_eq!(bucket_time(TimeRange::OneWeek, 7400), 7200);
        assert_eq!(bucket_time(TimeRange::OneWeek, 7200), 7200);
    }

    #[test]
    fn test_day_floor_for_one_month() {
        assert_eq!(bucket_time(TimeRange::OneMonth, 100_000), 86_400);
        assert_eq!(bucket_time(TimeRange::OneMonth, 86_400), 86_400);
    }

    #[test]
    fn test_week_floor_lands_on_monday() {
        // 2024-01-01 00:00 UTC was a Monday.
        let monday = 1_704_067_200;
        // Wednesday 2024-01-03 12:00 UTC.
        let wednesday_noon = monday + 2 * 86_400 + 43_200;
        assert_eq!(bucket_time(TimeRange::OneYear, wednesday_noon), monday);
        assert_eq!(bucket_time(TimeRange::OneYear, monday), monday);
    }

    #[test]
    fn test_bucketing_is_idempotent() {
        for range in TimeRange::ALL {
            for raw in [59, 1000, 7400, 100_000, 1_704_283_200] {
                let once = bucket_time(range, raw);
                assert_eq!(bucket_time(range, once), once);
            }
        }
    }

    #[test]
    fn test_choose_timestamp_preserves_other_fields() {
        let mut point = DataPoint::new(1000, 0.6);
        point.volume = Some(5.0);

        let bucketed = choose_timestamp(TimeRange::OneHour, &point);
        assert_eq!(bucketed.time, 960);
        assert_eq!(bucketed.value, 0.6);
        assert_eq!(bucketed.volume, Some(5.0));
    }
}
