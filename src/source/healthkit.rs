//! HealthKit export adapter
//!
//! Parses a JSON dump of HealthKit samples keyed by quantity/category type.

use super::{parse_timestamp, ExportAdapter};
use crate::error::HealthError;
use crate::types::{Metric, MetricSample, Sample};
use serde::Deserialize;

/// HealthKit export adapter
pub struct HealthKitAdapter;

impl ExportAdapter for HealthKitAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<MetricSample>, HealthError> {
        let export: HealthKitExport = serde_json::from_str(raw_json)?;
        let mut samples = Vec::new();

        let groups = [
            (Metric::Steps, export.step_count),
            (Metric::Distance, export.distance_walking_running),
            (Metric::Flights, export.flights_climbed),
            (Metric::Calories, export.active_energy_burned),
            (Metric::HeartRate, export.heart_rate),
            (Metric::Weight, export.body_mass),
            (Metric::SleepDuration, export.sleep_analysis),
        ];

        for (metric, entries) in groups {
            for entry in entries {
                samples.push(MetricSample {
                    metric,
                    sample: entry.into_sample()?,
                });
            }
        }

        Ok(samples)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct HealthKitExport {
    step_count: Vec<HealthKitSample>,
    distance_walking_running: Vec<HealthKitSample>,
    flights_climbed: Vec<HealthKitSample>,
    active_energy_burned: Vec<HealthKitSample>,
    heart_rate: Vec<HealthKitSample>,
    body_mass: Vec<HealthKitSample>,
    sleep_analysis: Vec<HealthKitSample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthKitSample {
    start_date: String,
    end_date: Option<String>,
    /// Numeric for quantities; sleep samples carry a category label instead
    value: Option<serde_json::Value>,
}

impl HealthKitSample {
    fn into_sample(self) -> Result<Sample, HealthError> {
        let start_time = parse_timestamp(&self.start_date)?;
        let end_time = self.end_date.as_deref().map(parse_timestamp).transpose()?;
        let value = self
            .value
            .as_ref()
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);

        Ok(Sample {
            start_time,
            end_time,
            value,
        })
    }
}
