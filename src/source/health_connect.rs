//! Health Connect export adapter
//!
//! Parses a JSON dump of Health Connect records keyed by record type and maps
//! each record's unit-bearing field onto a plain sample value.

use super::{parse_timestamp, ExportAdapter};
use crate::error::HealthError;
use crate::types::{Metric, MetricSample, Sample};
use serde::Deserialize;

const POUNDS_PER_KILOGRAM: f64 = 2.204_622_621_8;

/// Health Connect export adapter
pub struct HealthConnectAdapter;

impl ExportAdapter for HealthConnectAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<MetricSample>, HealthError> {
        let export: HealthConnectExport = serde_json::from_str(raw_json)?;
        let mut samples = Vec::new();

        for record in export.steps {
            let value = record.count.unwrap_or(0.0);
            samples.push(tagged(Metric::Steps, record.span.interval(value)?));
        }

        for record in export.distance {
            let value = record.distance.and_then(|d| d.in_meters).unwrap_or(0.0);
            samples.push(tagged(Metric::Distance, record.span.interval(value)?));
        }

        for record in export.floors_climbed {
            let value = record.floors.unwrap_or(0.0);
            samples.push(tagged(Metric::Flights, record.span.interval(value)?));
        }

        for record in export.active_calories_burned {
            let value = record.energy.and_then(|e| e.in_kilocalories).unwrap_or(0.0);
            samples.push(tagged(Metric::Calories, record.span.interval(value)?));
        }

        // Heart rate records are series; each inner reading becomes its own sample
        for record in export.heart_rate {
            for reading in record.samples {
                let time = parse_timestamp(&reading.time)?;
                samples.push(tagged(
                    Metric::HeartRate,
                    Sample::new(time, reading.beats_per_minute.unwrap_or(0.0)),
                ));
            }
        }

        for record in export.weight {
            let time = parse_timestamp(&record.time)?;
            let pounds = record
                .weight
                .and_then(|mass| {
                    mass.in_pounds
                        .or_else(|| mass.in_kilograms.map(|kg| kg * POUNDS_PER_KILOGRAM))
                })
                .unwrap_or(0.0);
            samples.push(tagged(Metric::Weight, Sample::new(time, pounds)));
        }

        for record in export.sleep_session {
            samples.push(tagged(Metric::SleepDuration, record.interval(0.0)?));
        }

        Ok(samples)
    }
}

fn tagged(metric: Metric, sample: Sample) -> MetricSample {
    MetricSample { metric, sample }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct HealthConnectExport {
    steps: Vec<StepsRecord>,
    distance: Vec<DistanceRecord>,
    floors_climbed: Vec<FloorsRecord>,
    active_calories_burned: Vec<CaloriesRecord>,
    heart_rate: Vec<HeartRateRecord>,
    weight: Vec<WeightRecord>,
    sleep_session: Vec<Span>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Span {
    start_time: String,
    end_time: Option<String>,
}

impl Span {
    fn interval(&self, value: f64) -> Result<Sample, HealthError> {
        Ok(Sample {
            start_time: parse_timestamp(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_timestamp).transpose()?,
            value,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StepsRecord {
    #[serde(flatten)]
    span: Span,
    count: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DistanceRecord {
    #[serde(flatten)]
    span: Span,
    distance: Option<Length>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Length {
    in_meters: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FloorsRecord {
    #[serde(flatten)]
    span: Span,
    floors: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CaloriesRecord {
    #[serde(flatten)]
    span: Span,
    energy: Option<Energy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Energy {
    in_kilocalories: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HeartRateRecord {
    #[serde(default)]
    samples: Vec<HeartRateReading>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartRateReading {
    time: String,
    beats_per_minute: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WeightRecord {
    time: String,
    weight: Option<Mass>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mass {
    in_pounds: Option<f64>,
    in_kilograms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_export() -> &'static str {
        r#"{
            "Steps": [
                { "startTime": "2025-03-10T08:00:00Z", "endTime": "2025-03-10T09:00:00Z", "count": 1200 },
                { "startTime": "2025-03-10T17:00:00Z", "endTime": "2025-03-10T18:00:00Z" }
            ],
            "Distance": [
                { "startTime": "2025-03-10T08:00:00Z", "endTime": "2025-03-10T09:00:00Z", "distance": { "inMeters": 950.5 } }
            ],
            "FloorsClimbed": [
                { "startTime": "2025-03-10T08:00:00Z", "endTime": "2025-03-10T08:05:00Z", "floors": 3 }
            ],
            "ActiveCaloriesBurned": [
                { "startTime": "2025-03-10T08:00:00Z", "endTime": "2025-03-10T09:00:00Z", "energy": { "inKilocalories": 120.7 } }
            ],
            "HeartRate": [
                {
                    "startTime": "2025-03-10T08:00:00Z",
                    "endTime": "2025-03-10T08:02:00Z",
                    "samples": [
                        { "time": "2025-03-10T08:00:00Z", "beatsPerMinute": 60 },
                        { "time": "2025-03-10T08:01:00Z", "beatsPerMinute": 80 }
                    ]
                }
            ],
            "Weight": [
                { "time": "2025-03-10T07:00:00Z", "weight": { "inKilograms": 80 } }
            ],
            "SleepSession": [
                { "startTime": "2025-03-09T23:00:00Z", "endTime": "2025-03-10T06:00:00Z" }
            ]
        }"#
    }

    #[test]
    fn test_parse_health_connect_export() {
        let samples = HealthConnectAdapter.parse(sample_export()).unwrap();

        let of = |metric: Metric| -> Vec<f64> {
            samples
                .iter()
                .filter(|s| s.metric == metric)
                .map(|s| s.sample.value)
                .collect()
        };

        assert_eq!(of(Metric::Steps), vec![1200.0, 0.0]);
        assert_eq!(of(Metric::Distance), vec![950.5]);
        assert_eq!(of(Metric::Flights), vec![3.0]);
        assert_eq!(of(Metric::Calories), vec![120.7]);
        assert_eq!(of(Metric::HeartRate), vec![60.0, 80.0]);
        assert_eq!(of(Metric::SleepDuration).len(), 1);

        let weight = of(Metric::Weight)[0];
        assert!((weight - 176.37).abs() < 0.01);
    }

    #[test]
    fn test_sleep_session_keeps_interval() {
        let samples = HealthConnectAdapter.parse(sample_export()).unwrap();
        let sleep = samples
            .iter()
            .find(|s| s.metric == Metric::SleepDuration)
            .unwrap();
        assert_eq!(sleep.sample.duration_ms(), 7 * 3_600_000);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            HealthConnectAdapter.parse("not valid json"),
            Err(HealthError::JsonError(_))
        ));
    }
}
