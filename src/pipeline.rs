//! Export pipelines
//!
//! Stateless entry points used by the FFI and CLI: parse a platform export,
//! stand up a session over it, run the aggregators and hand back summaries.

use crate::display::{Dashboard, RefreshTracker};
use crate::daily::DailyMetricFetcher;
use crate::error::HealthError;
use crate::session::HealthSession;
use crate::slots::ResponsePolicy;
use crate::source::{InMemorySource, Platform};
use crate::types::{DailySummary, YearlySummary};
use crate::yearly::YearToDateAggregator;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Everything the home screen needs for one refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub today: DailySummary,
    pub yesterday: DailySummary,
    pub year: YearlySummary,
    pub dashboard: Dashboard,
}

/// Single-day summary for `date` from a raw export.
///
/// # Example
/// ```ignore
/// let summary = daily_from_export(&export_json, Platform::Ios, date, offset).await?;
/// ```
pub async fn daily_from_export(
    raw_json: &str,
    platform: Platform,
    date: NaiveDate,
    timezone: FixedOffset,
) -> Result<DailySummary, HealthError> {
    let session = ready_session(raw_json, platform).await?;
    let fetcher = DailyMetricFetcher::new(session, timezone, ResponsePolicy::default());
    Ok(fetcher.fetch(date).await.summary)
}

/// Year-to-date summary for `year` as of `now` from a raw export
pub async fn yearly_from_export(
    raw_json: &str,
    platform: Platform,
    year: i32,
    reference_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    timezone: FixedOffset,
) -> Result<YearlySummary, HealthError> {
    let session = ready_session(raw_json, platform).await?;
    if let Some(date) = reference_date {
        if date.year() != year {
            return Err(HealthError::InvalidDate(format!(
                "reference date {date} is outside {year}"
            )));
        }
    }
    let aggregator = YearToDateAggregator::new(session, timezone, ResponsePolicy::default());
    Ok(aggregator.fetch(year, reference_date, now).await.summary)
}

/// Today, yesterday and the year of `date`, fetched concurrently over one session.
///
/// `tracker` holds the previous refresh's figures; the "Today" change badges
/// show the increase since then. Pass a fresh tracker on the first refresh.
pub async fn dashboard_from_export(
    raw_json: &str,
    platform: Platform,
    date: NaiveDate,
    now: DateTime<Utc>,
    timezone: FixedOffset,
    tracker: &mut RefreshTracker,
) -> Result<DashboardSnapshot, HealthError> {
    let yesterday_date = date
        .pred_opt()
        .ok_or_else(|| HealthError::InvalidDate(format!("no day before {date}")))?;

    let session = ready_session(raw_json, platform).await?;
    let today = DailyMetricFetcher::new(session.clone(), timezone, ResponsePolicy::default());
    let yesterday = DailyMetricFetcher::new(session.clone(), timezone, ResponsePolicy::default());
    let year = YearToDateAggregator::new(session, timezone, ResponsePolicy::default());

    let (today, yesterday, year) = tokio::join!(
        today.fetch(date),
        yesterday.fetch(yesterday_date),
        year.fetch(date.year(), Some(date), now),
    );

    let (steps_change, distance_change) = tracker.observe(&today.summary);
    let dashboard = Dashboard::compose(
        &today.summary,
        &yesterday.summary,
        &year.summary,
        steps_change,
        distance_change,
    );

    Ok(DashboardSnapshot {
        today: today.summary,
        yesterday: yesterday.summary,
        year: year.summary,
        dashboard,
    })
}

/// Drive a future to completion on a fresh single-threaded runtime
pub fn block_on<F: Future>(future: F) -> Result<F::Output, HealthError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| HealthError::Runtime(e.to_string()))?;
    Ok(runtime.block_on(future))
}

async fn ready_session(
    raw_json: &str,
    platform: Platform,
) -> Result<Arc<HealthSession<InMemorySource>>, HealthError> {
    let source = InMemorySource::from_export(platform, raw_json)?;
    let session = Arc::new(HealthSession::new(source));
    session.initialize().await?;
    Ok(session)
}
