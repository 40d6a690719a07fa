//! InYear - year-to-date and daily health metric aggregation
//!
//! InYear reads samples from a device health store (HealthKit on iOS, Health
//! Connect on Android) and reduces them to the figures a fitness dashboard
//! shows: today's and yesterday's totals, and totals plus daily averages for
//! the elapsed part of the current year.
//!
//! ## Modules
//!
//! - **Sources**: the [`HealthSource`] seam plus export adapters per platform
//! - **Session**: one-time availability and permission handshake
//! - **Fetchers**: [`DailyMetricFetcher`] and [`YearToDateAggregator`]
//! - **Display**: dashboard cards and number formatting

pub mod config;
pub mod daily;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod reducers;
pub mod session;
pub mod slots;
pub mod source;
pub mod types;
pub mod window;
pub mod yearly;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::Config;
pub use daily::DailyMetricFetcher;
pub use display::{ChangeTracker, Dashboard, Icon, RefreshTracker, ValueCard};
pub use error::HealthError;
pub use pipeline::{dashboard_from_export, daily_from_export, yearly_from_export, DashboardSnapshot};
pub use session::{HealthSession, SessionState};
pub use slots::{FetchOutcome, ResponsePolicy};
pub use source::{ExportAdapter, HealthSource, InMemorySource, Platform};
pub use types::{DailySummary, Metric, Reading, Sample, YearlySummary, YearlyTotal};
pub use window::{DateWindow, YearWindow};
pub use yearly::YearToDateAggregator;

/// Library version reported by the CLI and FFI
pub const INYEAR_VERSION: &str = env!("CARGO_PKG_VERSION");
