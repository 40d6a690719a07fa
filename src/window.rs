//! Query windows
//!
//! Every query is bounded by a half-open `[start, end)` interval computed from a
//! local calendar date (or year) and a fixed UTC offset. Windows are recomputed
//! on every fetch.

use crate::error::HealthError;
use crate::types::Sample;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Half-open time interval bounding a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, HealthError> {
        if end < start {
            return Err(HealthError::InvalidDate(format!(
                "window ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Local midnight of `date` up to the next local midnight
    pub fn day(date: NaiveDate, tz: &FixedOffset) -> Result<Self, HealthError> {
        let start = local_instant(date, NaiveTime::MIN, tz)?;
        Self::new(start, start + Duration::days(1))
    }

    /// Noon of the previous day up to noon of `date`, so the prior night is captured whole
    pub fn overnight_sleep(date: NaiveDate, tz: &FixedOffset) -> Result<Self, HealthError> {
        let noon = NaiveTime::from_hms_opt(12, 0, 0)
            .ok_or_else(|| HealthError::InvalidDate("noon".to_string()))?;
        let previous = date
            .pred_opt()
            .ok_or_else(|| HealthError::InvalidDate(format!("no day before {date}")))?;
        Self::new(
            local_instant(previous, noon, tz)?,
            local_instant(date, noon, tz)?,
        )
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Keep only samples whose start falls inside the window
    pub fn retain(&self, samples: Vec<Sample>) -> Vec<Sample> {
        samples
            .into_iter()
            .filter(|s| self.contains(s.start_time))
            .collect()
    }

    /// Inclusive calendar-day count: `floor((end - start) / day) + 1`
    pub fn inclusive_days(&self) -> u32 {
        let elapsed = (self.end - self.start).num_milliseconds().max(0);
        (elapsed / MILLIS_PER_DAY) as u32 + 1
    }
}

/// Year-to-date window and its averaging denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub year: i32,
    pub window: DateWindow,
    pub total_days: u32,
}

impl YearWindow {
    /// `[Jan 1 of year, min(Dec 31 23:59:59 of year, now)]`, never projecting past `now`
    pub fn to_date(year: i32, now: DateTime<Utc>, tz: &FixedOffset) -> Result<Self, HealthError> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| HealthError::InvalidDate(format!("year {year} out of range")))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| HealthError::InvalidDate(format!("year {year} out of range")))?;
        let last_second = NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| HealthError::InvalidDate("end of day".to_string()))?;

        let start = local_instant(first, NaiveTime::MIN, tz)?;
        if start > now {
            return Err(HealthError::InvalidDate(format!(
                "year {year} has not started yet"
            )));
        }
        let end = local_instant(last, last_second, tz)?.min(now);
        let window = DateWindow::new(start, end)?;

        Ok(Self {
            year,
            window,
            total_days: window.inclusive_days(),
        })
    }
}

/// Local calendar date of an instant
pub fn local_date(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

fn local_instant(
    date: NaiveDate,
    time: NaiveTime,
    tz: &FixedOffset,
) -> Result<DateTime<Utc>, HealthError> {
    tz.from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| HealthError::InvalidDate(format!("{date} {time} is not a valid local time")))
}
