//! Year-to-date aggregator
//!
//! For a year, queries the elapsed part of it and reduces the samples into
//! year totals and per-day averages. Weight and sleep are read around a
//! reference date (that day's weight, the night before it) and are skipped
//! when no reference date is given.

use crate::reducers::{self, DailySleepBuckets};
use crate::session::HealthSession;
use crate::slots::{self, lock, FetchOutcome, ResponsePolicy, SlotBoard};
use crate::source::HealthSource;
use crate::types::{Metric, Reading, YearlySummary, YearlyTotal};
use crate::window::{local_date, DateWindow, YearWindow};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Published value of one yearly metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YearlyValue {
    Total(YearlyTotal),
    Average(Reading),
}

impl YearlyValue {
    fn total(&self) -> YearlyTotal {
        match self {
            YearlyValue::Total(total) => *total,
            YearlyValue::Average(_) => YearlyTotal::default(),
        }
    }

    fn average(&self) -> Reading {
        match self {
            YearlyValue::Total(total) => Reading::Value(total.daily_average),
            YearlyValue::Average(reading) => *reading,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct YearContext {
    year: i32,
    total_days: u32,
}

/// Aggregates totals and daily averages for the elapsed part of a year
pub struct YearToDateAggregator<S> {
    session: Arc<HealthSession<S>>,
    timezone: FixedOffset,
    context: Mutex<Option<YearContext>>,
    board: Mutex<SlotBoard<YearlyValue>>,
}

impl<S: HealthSource> YearToDateAggregator<S> {
    pub fn new(session: Arc<HealthSession<S>>, timezone: FixedOffset, policy: ResponsePolicy) -> Self {
        let board = SlotBoard::new(policy, |metric| match metric {
            Metric::Steps | Metric::Distance | Metric::Flights => {
                YearlyValue::Total(YearlyTotal::default())
            }
            Metric::Calories => YearlyValue::Average(Reading::Value(0.0)),
            _ => YearlyValue::Average(Reading::NoData),
        });
        Self {
            session,
            timezone,
            context: Mutex::new(None),
            board: Mutex::new(board),
        }
    }

    /// Current values for the most recently requested year
    pub fn summary(&self) -> YearlySummary {
        // before the first fetch, report the current year with nothing elapsed
        let context = (*lock(&self.context)).unwrap_or_else(|| YearContext {
            year: local_date(Utc::now(), &self.timezone).year(),
            total_days: 0,
        });
        let board = lock(&self.board);
        let get = |metric| {
            board
                .get(metric)
                .copied()
                .unwrap_or(YearlyValue::Average(Reading::NoData))
        };

        YearlySummary {
            year: context.year,
            total_days: context.total_days,
            steps: get(Metric::Steps).total(),
            distance_meters: get(Metric::Distance).total(),
            flights: get(Metric::Flights).total(),
            calories_daily_average: get(Metric::Calories).average().or_zero(),
            heart_rate: get(Metric::HeartRate).average(),
            weight: get(Metric::Weight).average(),
            sleep_hours: get(Metric::SleepDuration).average(),
        }
    }

    /// Fetch `year` as of the current instant
    pub async fn fetch_now(
        &self,
        year: i32,
        reference_date: Option<NaiveDate>,
    ) -> FetchOutcome<YearlySummary> {
        self.fetch(year, reference_date, Utc::now()).await
    }

    /// Query the year-to-date window as of `now` and publish results as they land
    pub async fn fetch(
        &self,
        year: i32,
        reference_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> FetchOutcome<YearlySummary> {
        if let Err(e) = self.session.initialize().await {
            warn!(year, error = %e, "health store unavailable; yearly metrics not fetched");
            return FetchOutcome::idle(self.summary());
        }

        let year_window = match YearWindow::to_date(year, now, &self.timezone) {
            Ok(window) => window,
            Err(e) => {
                warn!(year, error = %e, "cannot resolve year window");
                return FetchOutcome::idle(self.summary());
            }
        };
        let reference = match reference_date {
            Some(date) => match self.reference_windows(date) {
                Ok(windows) => Some(windows),
                Err(e) => {
                    warn!(year, %date, error = %e, "cannot resolve reference date windows; weight and sleep not fetched");
                    None
                }
            },
            None => {
                warn!(year, "no reference date; weight and sleep not fetched");
                None
            }
        };

        let request = {
            *lock(&self.context) = Some(YearContext {
                year,
                total_days: year_window.total_days,
            });
            let mut board = lock(&self.board);
            let request = board.issue(&Metric::ALL);
            if reference.is_none() {
                // values from an earlier year or reference date must not carry over
                for metric in [Metric::Weight, Metric::SleepDuration] {
                    board.apply(metric, request, Ok(YearlyValue::Average(Reading::NoData)));
                }
            }
            request
        };
        info!(year, total_days = year_window.total_days, "fetching year to date");

        let session = self.session.as_ref();
        let board = &self.board;
        let window = year_window.window;
        let total_days = year_window.total_days;
        let tz = self.timezone;

        let (steps, distance, flights, calories, heart_rate, weight, sleep) = tokio::join!(
            slots::settle(session, board, request, Metric::Steps, window, |s| {
                YearlyValue::Total(YearlyTotal::from_total(reducers::sum(&s), total_days))
            }),
            slots::settle(session, board, request, Metric::Distance, window, |s| {
                YearlyValue::Total(YearlyTotal::from_total(reducers::sum(&s), total_days))
            }),
            slots::settle(session, board, request, Metric::Flights, window, |s| {
                YearlyValue::Total(YearlyTotal::from_total(reducers::sum(&s), total_days))
            }),
            slots::settle(session, board, request, Metric::Calories, window, |s| {
                let average = YearlyTotal::from_total(reducers::sum(&s), total_days).daily_average;
                YearlyValue::Average(Reading::Value(average))
            }),
            slots::settle(session, board, request, Metric::HeartRate, window, |s| {
                YearlyValue::Average(reducers::mean(&reducers::not_after(s, now)))
            }),
            async {
                match reference {
                    Some((day, _)) => Some(
                        slots::settle(session, board, request, Metric::Weight, day, |s| {
                            YearlyValue::Average(reducers::mean(&reducers::not_after(s, now)))
                        })
                        .await,
                    ),
                    None => None,
                }
            },
            async {
                match reference {
                    Some((_, night)) => Some(
                        slots::settle(session, board, request, Metric::SleepDuration, night, |s| {
                            YearlyValue::Average(DailySleepBuckets::from_samples(&s, &tz).average_hours())
                        })
                        .await,
                    ),
                    None => None,
                }
            },
        );

        let mut results = vec![steps, distance, flights, calories, heart_rate];
        results.extend(weight);
        results.extend(sleep);

        FetchOutcome::collect(self.summary(), &results)
    }

    fn reference_windows(
        &self,
        date: NaiveDate,
    ) -> Result<(DateWindow, DateWindow), crate::error::HealthError> {
        Ok((
            DateWindow::day(date, &self.timezone)?,
            DateWindow::overnight_sleep(date, &self.timezone)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemorySource, Platform};
    use crate::types::Sample;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
    }

    fn march_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(3, 10, 15)
    }

    fn aggregator(source: InMemorySource) -> YearToDateAggregator<InMemorySource> {
        let session = Arc::new(HealthSession::new(source));
        YearToDateAggregator::new(session, utc(), ResponsePolicy::default())
    }

    fn populated_source() -> InMemorySource {
        InMemorySource::new(Platform::Ios)
            .with_samples(
                Metric::Steps,
                vec![
                    Sample::new(at(1, 1, 0), 6900.0),
                    Sample::new(at(2, 14, 0), 6900.0),
                    Sample::new(at(3, 10, 0), 0.0),
                    // previous year, outside the window
                    Sample::new(at(1, 1, 0) - Duration::days(1), 99_999.0),
                ],
            )
            .with_samples(Metric::Distance, vec![Sample::new(at(2, 1, 0), 69_000.0)])
            .with_samples(Metric::Flights, vec![Sample::new(at(2, 1, 0), 138.0)])
            .with_samples(Metric::Calories, vec![Sample::new(at(1, 5, 0), 34_500.0)])
            .with_samples(
                Metric::HeartRate,
                vec![
                    Sample::new(at(1, 20, 9), 60.0),
                    Sample::new(at(3, 10, 9), 80.0),
                    // later today, past `now`
                    Sample::new(at(3, 10, 16), 200.0),
                ],
            )
            .with_samples(
                Metric::Weight,
                vec![Sample::new(at(3, 10, 7), 180.0), Sample::new(at(3, 10, 8), 181.0)],
            )
            .with_samples(
                Metric::SleepDuration,
                vec![
                    Sample::interval(at(3, 9, 22), at(3, 10, 2), 0.0),
                    Sample::interval(at(3, 9, 23), at(3, 10, 2), 0.0),
                    Sample::interval(at(3, 10, 2), at(3, 10, 6), 0.0),
                ],
            )
    }

    #[tokio::test]
    async fn test_year_to_date_summary() {
        let aggregator = aggregator(populated_source());
        let outcome = aggregator.fetch(2025, Some(march_10()), now()).await;

        assert!(outcome.is_complete());
        let summary = outcome.summary;
        assert_eq!(summary.total_days, 69);
        assert_eq!(summary.steps, YearlyTotal { total: 13_800.0, daily_average: 200.0 });
        assert_eq!(summary.distance_meters.daily_average, 1000.0);
        assert_eq!(summary.flights.daily_average, 2.0);
        assert_eq!(summary.calories_daily_average, 500.0);
        assert_eq!(summary.heart_rate, Reading::Value(70.0));
        assert_eq!(summary.weight, Reading::Value(180.5));
    }

    #[tokio::test]
    async fn test_sleep_buckets_by_night() {
        let aggregator = aggregator(populated_source());
        let summary = aggregator.fetch(2025, Some(march_10()), now()).await.summary;

        // March 9 bucket: 4h + 3h, March 10 bucket: 4h; (7 + 4) / 2 nights / 2
        assert_eq!(summary.sleep_hours, Reading::Value(2.75));
    }

    #[tokio::test]
    async fn test_without_reference_date_weight_and_sleep_stay_unset() {
        let aggregator = aggregator(populated_source());
        let outcome = aggregator.fetch(2025, None, now()).await;

        assert_eq!(outcome.updated.len(), 5);
        assert!(outcome.summary.weight.is_no_data());
        assert!(outcome.summary.sleep_hours.is_no_data());
        assert_eq!(aggregator.session.source().query_count(), 5);
    }

    #[tokio::test]
    async fn test_dropping_reference_date_clears_weight_and_sleep() {
        let aggregator = aggregator(populated_source());
        let first = aggregator.fetch(2025, Some(march_10()), now()).await.summary;
        assert_eq!(first.weight, Reading::Value(180.5));

        let summary = aggregator.fetch(2024, None, now()).await.summary;
        assert_eq!(summary.year, 2024);
        assert!(summary.weight.is_no_data());
        assert!(summary.sleep_hours.is_no_data());
    }

    #[test]
    fn test_summary_before_first_fetch() {
        let aggregator = aggregator(populated_source());
        let summary = aggregator.summary();

        assert_eq!(summary.year, local_date(Utc::now(), &utc()).year());
        assert_eq!(summary.total_days, 0);
        assert!(summary.weight.is_no_data());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_does_not_hold_back_other_metrics() {
        let aggregator = aggregator(populated_source());
        aggregator
            .session
            .source()
            .delay_next(Metric::Steps, std::time::Duration::from_secs(60));

        let (outcome, issued) = tokio::join!(aggregator.fetch(2025, Some(march_10()), now()), async {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            let issued = aggregator.session.source().query_count();
            (issued, aggregator.summary())
        });

        let (issued, in_flight) = issued;
        assert_eq!(issued, 7);
        // everything but steps has landed while steps is still pending
        assert_eq!(in_flight.weight, Reading::Value(180.5));
        assert_eq!(in_flight.steps.total, 0.0);
        assert!(outcome.is_complete());
        assert_eq!(outcome.summary.steps.total, 13_800.0);
    }

    #[tokio::test]
    async fn test_empty_year() {
        let aggregator = aggregator(InMemorySource::new(Platform::Android));
        let summary = aggregator.fetch(2025, Some(march_10()), now()).await.summary;

        assert_eq!(summary, YearlySummary::empty(2025, 69));
    }

    #[tokio::test]
    async fn test_past_year_uses_full_year() {
        let aggregator = aggregator(InMemorySource::new(Platform::Ios).with_samples(
            Metric::Steps,
            vec![Sample::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), 366_000.0)],
        ));
        let summary = aggregator.fetch(2024, None, now()).await.summary;

        assert_eq!(summary.total_days, 366);
        assert_eq!(summary.steps.daily_average, 1000.0);
    }

    #[tokio::test]
    async fn test_future_year_is_not_fetched() {
        let aggregator = aggregator(populated_source());
        let outcome = aggregator.fetch(2026, None, now()).await;

        assert!(outcome.updated.is_empty());
        assert_eq!(aggregator.session.source().query_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_metric_keeps_previous_value() {
        let aggregator = aggregator(populated_source());
        aggregator.fetch(2025, Some(march_10()), now()).await;

        aggregator.session.source().fail(Metric::Steps);
        let outcome = aggregator.fetch(2025, Some(march_10()), now()).await;

        assert_eq!(outcome.failed, vec![Metric::Steps]);
        assert_eq!(outcome.summary.steps.total, 13_800.0);
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let aggregator = aggregator(populated_source());
        let first = aggregator.fetch(2025, Some(march_10()), now()).await.summary;
        let second = aggregator.fetch(2025, Some(march_10()), now()).await.summary;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_year_is_dropped() {
        let aggregator = aggregator(populated_source());
        aggregator
            .session
            .source()
            .delay_next(Metric::Steps, std::time::Duration::from_millis(500));

        let (old, _) = tokio::join!(aggregator.fetch(2024, None, now()), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            aggregator.fetch(2025, None, now()).await
        });

        assert_eq!(old.superseded, vec![Metric::Steps]);
        let summary = aggregator.summary();
        assert_eq!(summary.year, 2025);
        assert_eq!(summary.steps.total, 13_800.0);
    }
}
