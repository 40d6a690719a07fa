//! Core types for InYear
//!
//! This module defines the data structures that flow through the aggregators:
//! raw samples handed over by a health source, the value-or-sentinel reading,
//! and the daily and yearly summaries published to the display layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health metrics tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Steps,
    Distance,
    Flights,
    Calories,
    HeartRate,
    Weight,
    SleepDuration,
}

impl Metric {
    /// Every metric, in dashboard order
    pub const ALL: [Metric; 7] = [
        Metric::Steps,
        Metric::Distance,
        Metric::Flights,
        Metric::Calories,
        Metric::HeartRate,
        Metric::Weight,
        Metric::SleepDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Steps => "steps",
            Metric::Distance => "distance",
            Metric::Flights => "flights",
            Metric::Calories => "calories",
            Metric::HeartRate => "heartRate",
            Metric::Weight => "weight",
            Metric::SleepDuration => "sleepDuration",
        }
    }

    /// Unit of a sample value for this metric
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Steps | Metric::Flights => "count",
            Metric::Distance => "m",
            Metric::Calories => "kcal",
            Metric::HeartRate => "bpm",
            Metric::Weight => "lb",
            Metric::SleepDuration => "h",
        }
    }

    /// Summed metrics read zero when empty; the rest read as no data
    pub fn is_cumulative(&self) -> bool {
        matches!(
            self,
            Metric::Steps | Metric::Distance | Metric::Flights | Metric::Calories
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw measurement returned by a health source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Start of the measurement (UTC)
    pub start_time: DateTime<Utc>,
    /// End of the measurement, for interval samples such as sleep (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Count, meters, kilocalories, beats per minute or pounds depending on the metric
    pub value: f64,
}

impl Sample {
    /// Point sample with no end time
    pub fn new(start_time: DateTime<Utc>, value: f64) -> Self {
        Self {
            start_time,
            end_time: None,
            value,
        }
    }

    /// Interval sample
    pub fn interval(start_time: DateTime<Utc>, end_time: DateTime<Utc>, value: f64) -> Self {
        Self {
            start_time,
            end_time: Some(end_time),
            value,
        }
    }

    /// Interval length in milliseconds; zero for point samples and inverted intervals
    pub fn duration_ms(&self) -> i64 {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0))
            .unwrap_or(0)
    }
}

/// A sample tagged with the metric it belongs to, as produced by export adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: Metric,
    #[serde(flatten)]
    pub sample: Sample,
}

/// A scalar that may be absent.
///
/// `NoData` is distinct from a measured zero; the display layer renders it as a dash.
/// Serializes as a nullable number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Reading {
    #[default]
    NoData,
    Value(f64),
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::NoData => None,
            Reading::Value(v) => Some(*v),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Reading::NoData)
    }

    /// Collapse the sentinel to zero, for callers that want the legacy "unset" convention
    pub fn or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Reading {
        match self {
            Reading::NoData => Reading::NoData,
            Reading::Value(v) => Reading::Value(f(v)),
        }
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::NoData,
        }
    }
}

impl From<Reading> for Option<f64> {
    fn from(reading: Reading) -> Self {
        reading.value()
    }
}

/// Single-day scalars for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Local calendar date these values describe
    pub date: NaiveDate,
    pub steps: f64,
    pub distance_meters: f64,
    pub flights: f64,
    /// Active energy burned (kcal)
    pub calories: f64,
    /// Mean heart rate over the day (bpm)
    pub heart_rate: Reading,
    /// Most recent weight recorded that day (lb)
    pub weight: Reading,
    /// Prior night's sleep (hours, after the halving correction)
    pub sleep_hours: f64,
}

impl DailySummary {
    /// Defaults before any fetch has landed
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: 0.0,
            distance_meters: 0.0,
            flights: 0.0,
            calories: 0.0,
            heart_rate: Reading::NoData,
            weight: Reading::NoData,
            sleep_hours: 0.0,
        }
    }

    /// Look a metric up by name
    pub fn get(&self, metric: Metric) -> Reading {
        match metric {
            Metric::Steps => Reading::Value(self.steps),
            Metric::Distance => Reading::Value(self.distance_meters),
            Metric::Flights => Reading::Value(self.flights),
            Metric::Calories => Reading::Value(self.calories),
            Metric::HeartRate => self.heart_rate,
            Metric::Weight => self.weight,
            Metric::SleepDuration => Reading::Value(self.sleep_hours),
        }
    }
}

/// Year total together with its per-day average
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YearlyTotal {
    pub total: f64,
    pub daily_average: f64,
}

impl YearlyTotal {
    pub fn from_total(total: f64, total_days: u32) -> Self {
        let daily_average = if total_days > 0 {
            total / total_days as f64
        } else {
            0.0
        };
        Self {
            total,
            daily_average,
        }
    }
}

/// Totals and averages for the elapsed part of a year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlySummary {
    pub year: i32,
    /// Inclusive day count of the year-to-date window
    pub total_days: u32,
    pub steps: YearlyTotal,
    pub distance_meters: YearlyTotal,
    pub flights: YearlyTotal,
    /// Active energy burned per day (kcal)
    pub calories_daily_average: f64,
    pub heart_rate: Reading,
    pub weight: Reading,
    /// Average nightly sleep across nights with records (hours, after halving)
    pub sleep_hours: Reading,
}

impl YearlySummary {
    pub fn empty(year: i32, total_days: u32) -> Self {
        Self {
            year,
            total_days,
            steps: YearlyTotal::default(),
            distance_meters: YearlyTotal::default(),
            flights: YearlyTotal::default(),
            calories_daily_average: 0.0,
            heart_rate: Reading::NoData,
            weight: Reading::NoData,
            sleep_hours: Reading::NoData,
        }
    }

    /// Year total for summed metrics; `None` for metrics that only have an average
    pub fn total(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Steps => Some(self.steps.total),
            Metric::Distance => Some(self.distance_meters.total),
            Metric::Flights => Some(self.flights.total),
            _ => None,
        }
    }

    /// Per-day figure for every metric
    pub fn average(&self, metric: Metric) -> Reading {
        match metric {
            Metric::Steps => Reading::Value(self.steps.daily_average),
            Metric::Distance => Reading::Value(self.distance_meters.daily_average),
            Metric::Flights => Reading::Value(self.flights.daily_average),
            Metric::Calories => Reading::Value(self.calories_daily_average),
            Metric::HeartRate => self.heart_rate,
            Metric::Weight => self.weight,
            Metric::SleepDuration => self.sleep_hours,
        }
    }
}
