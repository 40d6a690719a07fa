//! Health data sources
//!
//! A health source is the platform health store (HealthKit on iOS, Health Connect
//! on Android) seen through a narrow interface: availability, a permission
//! handshake, and range queries by metric. Export adapters parse JSON dumps of
//! either store into tagged samples that back an in-memory source.

mod health_connect;
mod healthkit;
mod memory;

pub use health_connect::HealthConnectAdapter;
pub use healthkit::HealthKitAdapter;
pub use memory::InMemorySource;

use crate::error::HealthError;
use crate::types::{Metric, MetricSample, Sample};
use crate::window::DateWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Mobile platform, which decides the health store and export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    /// Name of the platform health store
    pub fn store_name(&self) -> &'static str {
        match self {
            Platform::Ios => "Apple Health",
            Platform::Android => "Health Connect",
        }
    }

    /// Export adapter for this platform's store
    pub fn adapter(&self) -> Box<dyn ExportAdapter> {
        match self {
            Platform::Ios => Box::new(HealthKitAdapter),
            Platform::Android => Box::new(HealthConnectAdapter),
        }
    }
}

impl FromStr for Platform {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" | "healthkit" => Ok(Platform::Ios),
            "android" | "health_connect" | "healthconnect" => Ok(Platform::Android),
            other => Err(HealthError::Config(format!("unknown platform: {other}"))),
        }
    }
}

/// External health store queried by the aggregators
#[async_trait]
pub trait HealthSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the store exists on this device
    async fn is_available(&self) -> Result<bool, HealthError>;

    /// Ask for read access to the given metrics
    async fn request_permissions(&self, metrics: &[Metric]) -> Result<(), HealthError>;

    /// Samples for one metric inside a window; best effort, no ordering guarantee
    async fn query(&self, metric: Metric, window: DateWindow) -> Result<Vec<Sample>, HealthError>;
}

/// Trait for health store export parsers
pub trait ExportAdapter {
    /// Parse a raw JSON export into metric-tagged samples
    fn parse(&self, raw_json: &str) -> Result<Vec<MetricSample>, HealthError>;
}

/// Parse an export timestamp: RFC 3339, or the `+HHMM` offset form HealthKit bridges emit
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, HealthError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HealthError::ParseError(format!("bad timestamp {raw:?}: {e}")))
}
