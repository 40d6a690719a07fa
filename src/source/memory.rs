//! In-memory health source
//!
//! Backs the CLI and FFI with samples parsed from an export, and lets tests
//! model the store's failure modes: missing store, denied permissions,
//! failing metrics and slow queries.

use super::{HealthSource, Platform};
use crate::error::HealthError;
use crate::types::{Metric, MetricSample, Sample};
use crate::window::DateWindow;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Health source answering queries from samples held in memory
pub struct InMemorySource {
    platform: Platform,
    available: bool,
    permissions_granted: bool,
    samples: Mutex<HashMap<Metric, Vec<Sample>>>,
    failing: Mutex<HashSet<Metric>>,
    delays: Mutex<HashMap<Metric, VecDeque<Duration>>>,
    queries: AtomicUsize,
}

impl InMemorySource {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            available: true,
            permissions_granted: true,
            samples: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            queries: AtomicUsize::new(0),
        }
    }

    /// Build a source from a platform export, using that platform's adapter
    pub fn from_export(platform: Platform, raw_json: &str) -> Result<Self, HealthError> {
        let source = Self::new(platform);
        for tagged in platform.adapter().parse(raw_json)? {
            source.insert(tagged);
        }
        Ok(source)
    }

    pub fn with_samples(self, metric: Metric, samples: Vec<Sample>) -> Self {
        lock(&self.samples).entry(metric).or_default().extend(samples);
        self
    }

    /// Report the store as missing on this device
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Refuse the permission handshake
    pub fn deny_permissions(mut self) -> Self {
        self.permissions_granted = false;
        self
    }

    pub fn insert(&self, tagged: MetricSample) {
        lock(&self.samples)
            .entry(tagged.metric)
            .or_default()
            .push(tagged.sample);
    }

    /// Replace every sample of a metric
    pub fn replace(&self, metric: Metric, samples: Vec<Sample>) {
        lock(&self.samples).insert(metric, samples);
    }

    /// Make every query for `metric` fail until `recover` is called
    pub fn fail(&self, metric: Metric) {
        lock(&self.failing).insert(metric);
    }

    pub fn recover(&self, metric: Metric) {
        lock(&self.failing).remove(&metric);
    }

    /// Delay the next query for `metric`; queued delays are consumed in order
    pub fn delay_next(&self, metric: Metric, delay: Duration) {
        lock(&self.delays).entry(metric).or_default().push_back(delay);
    }

    /// Number of queries answered or failed so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Sample counts per metric
    pub fn counts(&self) -> HashMap<Metric, usize> {
        lock(&self.samples)
            .iter()
            .map(|(metric, samples)| (*metric, samples.len()))
            .collect()
    }

    pub fn all_samples(&self, metric: Metric) -> Vec<Sample> {
        lock(&self.samples).get(&metric).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl HealthSource for InMemorySource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn is_available(&self) -> Result<bool, HealthError> {
        Ok(self.available)
    }

    async fn request_permissions(&self, metrics: &[Metric]) -> Result<(), HealthError> {
        if self.permissions_granted {
            Ok(())
        } else {
            let names: Vec<&str> = metrics.iter().map(Metric::as_str).collect();
            Err(HealthError::PermissionDenied(format!(
                "read access refused for {}",
                names.join(", ")
            )))
        }
    }

    async fn query(&self, metric: Metric, window: DateWindow) -> Result<Vec<Sample>, HealthError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.delays)
            .get_mut(&metric)
            .and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if lock(&self.failing).contains(&metric) {
            return Err(HealthError::query(metric, "store returned an error"));
        }

        let mut matching: Vec<Sample> = lock(&self.samples)
            .get(&metric)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| window.contains(s.start_time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Most recent first, as the stores return them
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matching)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    fn window() -> DateWindow {
        DateWindow::day(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            &FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_filters_by_window() {
        let inside = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();
        let source = InMemorySource::new(Platform::Ios).with_samples(
            Metric::Steps,
            vec![Sample::new(inside, 10.0), Sample::new(outside, 20.0)],
        );

        let samples = source.query(Metric::Steps, window()).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 10.0);
        assert!(source.query(Metric::Weight, window()).await.unwrap().is_empty());
        assert_eq!(source.query_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection_and_recovery() {
        let source = InMemorySource::new(Platform::Android);
        source.fail(Metric::HeartRate);
        assert!(source.query(Metric::HeartRate, window()).await.is_err());

        source.recover(Metric::HeartRate);
        assert!(source.query(Metric::HeartRate, window()).await.is_ok());
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let source = InMemorySource::new(Platform::Ios).deny_permissions();
        assert!(matches!(
            source.request_permissions(&Metric::ALL).await,
            Err(HealthError::PermissionDenied(_))
        ));
    }
}
