//! Daily metric fetcher
//!
//! For one local calendar date, queries every metric concurrently and reduces
//! each sample list to a single scalar for that day:
//! - Steps, distance, flights: summed (flights rounded down)
//! - Calories: each sample floored, then summed
//! - Heart rate: mean, rounded; no data when empty
//! - Weight: most recent sample of the day; no data when empty
//! - Sleep: noon-to-noon window ending on the date, summed and halved

use crate::reducers;
use crate::session::HealthSession;
use crate::slots::{self, lock, FetchOutcome, ResponsePolicy, SlotBoard};
use crate::source::HealthSource;
use crate::types::{DailySummary, Metric, Reading};
use crate::window::{local_date, DateWindow};
use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Fetches single-day scalars, keeping the last good value of each metric
pub struct DailyMetricFetcher<S> {
    session: Arc<HealthSession<S>>,
    timezone: FixedOffset,
    date: Mutex<Option<NaiveDate>>,
    board: Mutex<SlotBoard<Reading>>,
}

impl<S: HealthSource> DailyMetricFetcher<S> {
    pub fn new(session: Arc<HealthSession<S>>, timezone: FixedOffset, policy: ResponsePolicy) -> Self {
        let board = SlotBoard::new(policy, |metric| {
            if metric.is_cumulative() || metric == Metric::SleepDuration {
                Reading::Value(0.0)
            } else {
                Reading::NoData
            }
        });
        Self {
            session,
            timezone,
            date: Mutex::new(None),
            board: Mutex::new(board),
        }
    }

    /// Current values for the most recently requested date
    pub fn summary(&self) -> DailySummary {
        let today = local_date(Utc::now(), &self.timezone);
        let date = lock(&self.date).unwrap_or(today);
        let board = lock(&self.board);
        let get = |metric| board.get(metric).copied().unwrap_or_default();

        DailySummary {
            date,
            steps: get(Metric::Steps).or_zero(),
            distance_meters: get(Metric::Distance).or_zero(),
            flights: get(Metric::Flights).or_zero(),
            calories: get(Metric::Calories).or_zero(),
            heart_rate: get(Metric::HeartRate),
            weight: get(Metric::Weight),
            sleep_hours: get(Metric::SleepDuration).or_zero(),
        }
    }

    /// Fetch the local date of `now`
    pub async fn fetch_today(&self) -> FetchOutcome<DailySummary> {
        self.fetch(local_date(Utc::now(), &self.timezone)).await
    }

    /// Fetch the local date before today
    pub async fn fetch_yesterday(&self) -> FetchOutcome<DailySummary> {
        let yesterday = local_date(Utc::now() - Duration::days(1), &self.timezone);
        self.fetch(yesterday).await
    }

    /// Query every metric for `date` and publish the results as they land
    pub async fn fetch(&self, date: NaiveDate) -> FetchOutcome<DailySummary> {
        if let Err(e) = self.session.initialize().await {
            warn!(%date, error = %e, "health store unavailable; daily metrics not fetched");
            return FetchOutcome::idle(self.summary());
        }

        let day = match DateWindow::day(date, &self.timezone) {
            Ok(window) => window,
            Err(e) => {
                warn!(%date, error = %e, "cannot resolve day window");
                return FetchOutcome::idle(self.summary());
            }
        };
        let night = match DateWindow::overnight_sleep(date, &self.timezone) {
            Ok(window) => window,
            Err(e) => {
                warn!(%date, error = %e, "cannot resolve sleep window");
                return FetchOutcome::idle(self.summary());
            }
        };

        let request = {
            *lock(&self.date) = Some(date);
            lock(&self.board).issue(&Metric::ALL)
        };

        let session = self.session.as_ref();
        let board = &self.board;
        let results = tokio::join!(
            slots::settle(session, board, request, Metric::Steps, day, |s| {
                Reading::Value(reducers::sum(&s))
            }),
            slots::settle(session, board, request, Metric::Distance, day, |s| {
                Reading::Value(reducers::sum(&s))
            }),
            slots::settle(session, board, request, Metric::Flights, day, |s| {
                Reading::Value(reducers::sum(&s).floor())
            }),
            slots::settle(session, board, request, Metric::Calories, day, |s| {
                Reading::Value(reducers::floor_sum(&s))
            }),
            slots::settle(session, board, request, Metric::HeartRate, day, |s| {
                reducers::mean(&s).map(f64::round)
            }),
            slots::settle(session, board, request, Metric::Weight, day, |s| {
                reducers::latest(&s)
            }),
            slots::settle(session, board, request, Metric::SleepDuration, night, |s| {
                Reading::Value(reducers::sleep_hours(&s))
            }),
        );

        let (steps, distance, flights, calories, heart_rate, weight, sleep) = results;
        FetchOutcome::collect(
            self.summary(),
            &[steps, distance, flights, calories, heart_rate, weight, sleep],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemorySource, Platform};
    use crate::types::Sample;
    use chrono::{DateTime, TimeZone};
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn populated_source() -> InMemorySource {
        InMemorySource::new(Platform::Ios)
            .with_samples(
                Metric::Steps,
                vec![
                    Sample::new(at(10, 8), 1200.0),
                    Sample::new(at(10, 18), 800.0),
                    Sample::new(at(11, 0), 5000.0),
                ],
            )
            .with_samples(
                Metric::Distance,
                vec![Sample::new(at(10, 8), 900.5), Sample::new(at(10, 18), 600.25)],
            )
            .with_samples(Metric::Flights, vec![Sample::new(at(10, 9), 2.0), Sample::new(at(10, 15), 1.0)])
            .with_samples(
                Metric::Calories,
                vec![Sample::new(at(10, 8), 100.9), Sample::new(at(10, 18), 50.5)],
            )
            .with_samples(
                Metric::HeartRate,
                vec![Sample::new(at(10, 8), 60.0), Sample::new(at(10, 9), 80.0)],
            )
            .with_samples(
                Metric::Weight,
                vec![Sample::new(at(10, 7), 181.2), Sample::new(at(10, 21), 180.4)],
            )
            .with_samples(
                Metric::SleepDuration,
                vec![
                    Sample::interval(at(9, 23) - Duration::hours(1), at(10, 2), 0.0),
                    Sample::interval(at(10, 3), at(10, 6), 0.0),
                ],
            )
    }

    fn fetcher(source: InMemorySource) -> DailyMetricFetcher<InMemorySource> {
        let session = Arc::new(HealthSession::new(source));
        DailyMetricFetcher::new(session, utc(), ResponsePolicy::default())
    }

    #[tokio::test]
    async fn test_daily_summary() {
        let fetcher = fetcher(populated_source());
        let outcome = fetcher.fetch(march(10)).await;

        assert!(outcome.is_complete());
        assert_eq!(
            outcome.summary,
            DailySummary {
                date: march(10),
                steps: 2000.0,
                distance_meters: 1500.75,
                flights: 3.0,
                calories: 150.0,
                heart_rate: Reading::Value(70.0),
                weight: Reading::Value(180.4),
                sleep_hours: 3.5,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_day_uses_zero_and_sentinels() {
        let fetcher = fetcher(InMemorySource::new(Platform::Android));
        let summary = fetcher.fetch(march(10)).await.summary;

        assert_eq!(summary, DailySummary::empty(march(10)));
        assert!(summary.heart_rate.is_no_data());
        assert!(summary.weight.is_no_data());
    }

    #[tokio::test]
    async fn test_samples_outside_the_day_are_excluded() {
        let fetcher = fetcher(populated_source());
        let summary = fetcher.fetch(march(11)).await.summary;
        assert_eq!(summary.steps, 5000.0);
        assert_eq!(summary.distance_meters, 0.0);
    }

    #[tokio::test]
    async fn test_failed_metric_keeps_previous_value() {
        let fetcher = fetcher(populated_source());
        fetcher.fetch(march(10)).await;

        fetcher.session.source().fail(Metric::HeartRate);
        fetcher.session.source().replace(Metric::Steps, vec![Sample::new(at(10, 8), 42.0)]);
        let outcome = fetcher.fetch(march(10)).await;

        assert_eq!(outcome.failed, vec![Metric::HeartRate]);
        assert_eq!(outcome.summary.heart_rate, Reading::Value(70.0));
        assert_eq!(outcome.summary.steps, 42.0);
    }

    #[tokio::test]
    async fn test_first_failure_leaves_defaults() {
        let source = populated_source();
        source.fail(Metric::Steps);
        let summary = fetcher(source).fetch(march(10)).await.summary;
        assert_eq!(summary.steps, 0.0);
        assert_eq!(summary.distance_meters, 1500.75);
    }

    #[tokio::test]
    async fn test_unavailable_store_never_queries() {
        let fetcher = fetcher(populated_source().unavailable());
        let outcome = fetcher.fetch(march(10)).await;

        assert!(outcome.updated.is_empty());
        assert_eq!(outcome.summary.steps, 0.0);
        assert_eq!(fetcher.session.source().query_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let fetcher = fetcher(populated_source());
        let first = fetcher.fetch(march(10)).await.summary;
        let second = fetcher.fetch(march(10)).await.summary;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_for_previous_date_is_dropped() {
        let fetcher = fetcher(populated_source());
        fetcher
            .session
            .source()
            .delay_next(Metric::Steps, std::time::Duration::from_millis(500));

        let (old, new) = tokio::join!(fetcher.fetch(march(10)), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            fetcher.fetch(march(11)).await
        });

        assert_eq!(old.superseded, vec![Metric::Steps]);
        assert!(new.is_complete());
        assert_eq!(fetcher.summary().date, march(11));
        assert_eq!(fetcher.summary().steps, 5000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_arrival_wins_policy_lets_stale_response_through() {
        let session = Arc::new(HealthSession::new(populated_source()));
        let fetcher = DailyMetricFetcher::new(session, utc(), ResponsePolicy::LastArrivalWins);
        fetcher
            .session
            .source()
            .delay_next(Metric::Steps, std::time::Duration::from_millis(500));

        tokio::join!(fetcher.fetch(march(10)), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            fetcher.fetch(march(11)).await
        });

        // the March 10 total landed after March 11's
        assert_eq!(fetcher.summary().steps, 2000.0);
    }
}
