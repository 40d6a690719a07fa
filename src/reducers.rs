//! Sample reductions
//!
//! Pure, linear reductions from one metric's sample list to a scalar:
//! - Sums (steps, distance, flights) and floored sums (calories)
//! - Means and latest values, which read as no data when empty
//! - Sleep interval totals, including per-night bucketing for yearly averages

use crate::types::{Reading, Sample};
use crate::window::local_date;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Summed sleep interval length is divided by this after converting to hours.
/// Health stores report overlapping asleep/in-bed intervals for one night.
pub const SLEEP_CORRECTION_DIVISOR: f64 = 2.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Sum of sample values; zero when empty
pub fn sum(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.value).sum()
}

/// Sum of sample values with each value floored first
pub fn floor_sum(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.value.floor()).sum()
}

/// Arithmetic mean of sample values
pub fn mean(samples: &[Sample]) -> Reading {
    if samples.is_empty() {
        return Reading::NoData;
    }
    Reading::Value(sum(samples) / samples.len() as f64)
}

/// Value of the sample with the latest start time
pub fn latest(samples: &[Sample]) -> Reading {
    samples
        .iter()
        .max_by_key(|s| s.start_time)
        .map(|s| Reading::Value(s.value))
        .unwrap_or(Reading::NoData)
}

/// Drop samples that start after `now`
pub fn not_after(samples: Vec<Sample>, now: DateTime<Utc>) -> Vec<Sample> {
    samples.into_iter().filter(|s| s.start_time <= now).collect()
}

/// Summed interval length in hours, halved; zero when empty
pub fn sleep_hours(samples: &[Sample]) -> f64 {
    let total_ms: i64 = samples.iter().map(Sample::duration_ms).sum();
    to_corrected_hours(total_ms as f64)
}

/// Per-night sleep totals keyed by the local start date of each interval.
///
/// Fragmented or overlapping records for the same night land in one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySleepBuckets {
    buckets: BTreeMap<NaiveDate, i64>,
}

impl DailySleepBuckets {
    pub fn from_samples(samples: &[Sample], tz: &FixedOffset) -> Self {
        let mut buckets = BTreeMap::new();
        for sample in samples {
            let day = local_date(sample.start_time, tz);
            *buckets.entry(day).or_insert(0) += sample.duration_ms();
        }
        Self { buckets }
    }

    /// Number of nights with at least one record
    pub fn nights(&self) -> usize {
        self.buckets.len()
    }

    /// Accumulated milliseconds for a night, if any were recorded
    pub fn total_ms(&self, day: NaiveDate) -> Option<i64> {
        self.buckets.get(&day).copied()
    }

    /// Mean of the bucket totals in hours, halved; no data when nothing was recorded
    pub fn average_hours(&self) -> Reading {
        if self.buckets.is_empty() {
            return Reading::NoData;
        }
        let total_ms: i64 = self.buckets.values().sum();
        Reading::Value(to_corrected_hours(total_ms as f64 / self.buckets.len() as f64))
    }
}

fn to_corrected_hours(ms: f64) -> f64 {
    ms / MILLIS_PER_HOUR / SLEEP_CORRECTION_DIVISOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap()
    }

    fn values(vals: &[f64]) -> Vec<Sample> {
        vals.iter().map(|v| Sample::new(at(8), *v)).collect()
    }

    #[test]
    fn test_empty_sums_are_zero() {
        assert_eq!(sum(&[]), 0.0);
        assert_eq!(floor_sum(&[]), 0.0);
        assert_eq!(sleep_hours(&[]), 0.0);
    }

    #[test]
    fn test_empty_averages_are_no_data() {
        assert_eq!(mean(&[]), Reading::NoData);
        assert_eq!(latest(&[]), Reading::NoData);
        assert_eq!(DailySleepBuckets::default().average_hours(), Reading::NoData);
    }

    #[test]
    fn test_sum_steps() {
        assert_eq!(sum(&values(&[1200.0, 800.0])), 2000.0);
    }

    #[test]
    fn test_floor_sum_floors_each_sample() {
        assert_eq!(floor_sum(&values(&[10.9, 20.5, 0.99])), 30.0);
    }

    #[test]
    fn test_mean_heart_rate() {
        assert_eq!(mean(&values(&[60.0, 80.0])), Reading::Value(70.0));
    }

    #[test]
    fn test_latest_picks_most_recent_start() {
        let samples = vec![
            Sample::new(at(7), 180.2),
            Sample::new(at(21), 181.0),
            Sample::new(at(12), 179.5),
        ];
        assert_eq!(latest(&samples), Reading::Value(181.0));
    }

    #[test]
    fn test_not_after_drops_future_samples() {
        let samples = vec![Sample::new(at(8), 1.0), Sample::new(at(9), 2.0), Sample::new(at(10), 3.0)];
        let kept = not_after(samples, at(9));
        assert_eq!(kept.len(), 2);
        assert_eq!(sum(&kept), 3.0);
    }

    #[test]
    fn test_sleep_hours_halves_summed_intervals() {
        let samples = vec![
            Sample::interval(at(0), at(4), 0.0),
            Sample::interval(at(5), at(8), 0.0),
        ];
        assert_eq!(sleep_hours(&samples), 3.5);
    }

    #[test]
    fn test_sleep_buckets_group_by_start_day() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let night_one = Utc.with_ymd_and_hms(2025, 3, 8, 23, 0, 0).unwrap();
        let night_two = Utc.with_ymd_and_hms(2025, 3, 9, 22, 0, 0).unwrap();
        let samples = vec![
            // two fragments of the same night, the second crossing midnight
            Sample::interval(night_one - Duration::hours(1), night_one + Duration::hours(3), 0.0),
            Sample::interval(night_one + Duration::minutes(30), night_one + Duration::hours(3) + Duration::minutes(30), 0.0),
            Sample::interval(night_two, night_two + Duration::hours(6), 0.0),
        ];

        let buckets = DailySleepBuckets::from_samples(&samples, &tz);
        assert_eq!(buckets.nights(), 2);
        assert_eq!(
            buckets.total_ms(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()),
            Some(7 * 3_600_000)
        );
        // (7h + 6h) / 2 nights / 2
        assert_eq!(buckets.average_hours(), Reading::Value(3.25));
    }

    #[test]
    fn test_sleep_bucket_single_night() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let samples = vec![
            Sample::interval(at(0), at(4), 0.0),
            Sample::interval(at(5), at(8), 0.0),
        ];
        let buckets = DailySleepBuckets::from_samples(&samples, &tz);
        assert_eq!(buckets.average_hours(), Reading::Value(3.5));
    }
}
