//! Per-metric output slots
//!
//! Each metric publishes into its own slot as soon as its query resolves.
//! A failed query leaves the slot's last value in place. Every fetch stamps
//! the metrics it queries with a fresh request id, and the response policy
//! decides what happens to a response that arrives after a newer request
//! was issued for the same metric.

use crate::error::HealthError;
use crate::session::HealthSession;
use crate::source::HealthSource;
use crate::types::{Metric, Sample};
use crate::window::DateWindow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// What to do with a response whose request has been superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePolicy {
    /// Drop it; only the newest request for a metric may publish
    #[default]
    DropSuperseded,
    /// Publish it anyway; whichever response lands last wins
    LastArrivalWins,
}

impl FromStr for ResponsePolicy {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_superseded" => Ok(ResponsePolicy::DropSuperseded),
            "last_arrival_wins" => Ok(ResponsePolicy::LastArrivalWins),
            other => Err(HealthError::Config(format!("unknown response policy: {other}"))),
        }
    }
}

/// Monotonically increasing id of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(u64);

/// How a response was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Updated,
    /// The query failed; the previous value stays
    Retained,
    /// A newer request was issued for the metric; the response was dropped
    Superseded,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    issued: RequestId,
}

/// Output slots for every metric an aggregator publishes
#[derive(Debug)]
pub struct SlotBoard<T> {
    policy: ResponsePolicy,
    last_request: u64,
    slots: HashMap<Metric, Slot<T>>,
}

impl<T: Clone> SlotBoard<T> {
    pub fn new(policy: ResponsePolicy, initial: impl Fn(Metric) -> T) -> Self {
        let slots = Metric::ALL
            .iter()
            .map(|m| {
                (
                    *m,
                    Slot {
                        value: initial(*m),
                        issued: RequestId(0),
                    },
                )
            })
            .collect();
        Self {
            policy,
            last_request: 0,
            slots,
        }
    }

    pub fn policy(&self) -> ResponsePolicy {
        self.policy
    }

    /// Stamp `metrics` with a new request id
    pub fn issue(&mut self, metrics: &[Metric]) -> RequestId {
        self.last_request += 1;
        let request = RequestId(self.last_request);
        for metric in metrics {
            if let Some(slot) = self.slots.get_mut(metric) {
                slot.issued = request;
            }
        }
        request
    }

    /// Publish one metric's response
    pub fn apply(
        &mut self,
        metric: Metric,
        request: RequestId,
        result: Result<T, HealthError>,
    ) -> Applied {
        let policy = self.policy;
        let Some(slot) = self.slots.get_mut(&metric) else {
            return Applied::Retained;
        };

        if policy == ResponsePolicy::DropSuperseded && request < slot.issued {
            debug!(%metric, ?request, latest = ?slot.issued, "dropping superseded response");
            return Applied::Superseded;
        }

        match result {
            Ok(value) => {
                slot.value = value;
                Applied::Updated
            }
            Err(e) => {
                warn!(%metric, error = %e, "metric query failed; keeping previous value");
                Applied::Retained
            }
        }
    }

    pub fn get(&self, metric: Metric) -> Option<&T> {
        self.slots.get(&metric).map(|slot| &slot.value)
    }
}

/// Result of one fetch: a snapshot plus what happened to each metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome<T> {
    pub summary: T,
    pub updated: Vec<Metric>,
    pub failed: Vec<Metric>,
    pub superseded: Vec<Metric>,
}

impl<T> FetchOutcome<T> {
    /// Nothing was queried
    pub fn idle(summary: T) -> Self {
        Self {
            summary,
            updated: Vec::new(),
            failed: Vec::new(),
            superseded: Vec::new(),
        }
    }

    pub(crate) fn collect(summary: T, results: &[(Metric, Applied)]) -> Self {
        let mut outcome = Self::idle(summary);
        for (metric, applied) in results {
            match applied {
                Applied::Updated => outcome.updated.push(*metric),
                Applied::Retained => outcome.failed.push(*metric),
                Applied::Superseded => outcome.superseded.push(*metric),
            }
        }
        outcome
    }

    /// Every queried metric published a fresh value
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.superseded.is_empty()
    }
}

/// Query one metric, reduce the samples inside `window` and publish into the board
pub(crate) async fn settle<S, T>(
    session: &HealthSession<S>,
    board: &Mutex<SlotBoard<T>>,
    request: RequestId,
    metric: Metric,
    window: DateWindow,
    reduce: impl FnOnce(Vec<Sample>) -> T,
) -> (Metric, Applied)
where
    S: HealthSource,
    T: Clone,
{
    let result = session
        .query(metric, window)
        .await
        .map(|samples| reduce(window.retain(samples)));
    let applied = lock(board).apply(metric, request, result);
    (metric, applied)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
