//! Multi-year fetch and reduction.
//!
//! A request for one calendar day fans out into one unit of work per year.
//! Units run concurrently up to a configured bound, each producing an
//! independent result; results are merged in a single pass once every unit
//! has settled, then reduced. A year that fails on transport, status or parse
//! is logged and left out; any other error aborts the request.

use std::{collections::BTreeMap, fmt, sync::Arc};

use anyhow::Context;
use futures::{StreamExt, stream};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::{
    Config,
    error::FetchError,
    model::{DailyRecord, GeoPoint, MonthDay, ScalarVariable, YearRange, YearlyScalars},
    provider::{DailyRecordSource, YearlyScalarSource, gesdisc_from_config, power_from_config},
    summary::{AggregateSummary, BandScheme, mean},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    Idle,
    Fetching,
    /// Still fetching, with at least one year already failed.
    PartiallyFailed,
    Reducing,
    Ready,
    Failed,
}

impl fmt::Display for AggregationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregationState::Idle => "idle",
            AggregationState::Fetching => "fetching",
            AggregationState::PartiallyFailed => "partially-failed",
            AggregationState::Reducing => "reducing",
            AggregationState::Ready => "ready",
            AggregationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot handed to a progress observer after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub state: AggregationState,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearFailure {
    pub year: i32,
    pub reason: String,
}

/// Outcome of the per-year fan-out, before reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyHistory {
    /// Sorted by year.
    pub records: Vec<DailyRecord>,
    /// Sorted by year.
    pub failures: Vec<YearFailure>,
}

impl DailyHistory {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Hourly history plus snow depth, reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct PreciseHistory {
    pub records: Vec<DailyRecord>,
    pub snow_depth_cm: YearlyScalars,
    pub failures: Vec<YearFailure>,
    pub summary: AggregateSummary,
}

/// Per-year daily values of the coarse point API.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSummary {
    pub series: BTreeMap<ScalarVariable, YearlyScalars>,
}

impl PointSummary {
    pub fn values(&self, variable: ScalarVariable) -> Option<&YearlyScalars> {
        self.series.get(&variable)
    }

    /// Multi-year mean, `None` when no year has a value.
    pub fn mean(&self, variable: ScalarVariable) -> Option<f64> {
        self.values(variable).and_then(|v| mean(v.values().copied()))
    }
}

pub struct Aggregator {
    daily: Arc<dyn DailyRecordSource>,
    yearly: Arc<dyn YearlyScalarSource>,
    concurrency: usize,
    bands: BandScheme,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("daily", &self.daily)
            .field("yearly", &self.yearly)
            .field("concurrency", &self.concurrency)
            .field("bands", &self.bands)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    pub fn new(daily: Arc<dyn DailyRecordSource>, yearly: Arc<dyn YearlyScalarSource>) -> Self {
        Self {
            daily,
            yearly,
            concurrency: 8,
            bands: BandScheme::default(),
            progress: None,
        }
    }

    /// Aggregator backed by the GES DISC and POWER HTTP providers.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("almanac/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(
            Arc::new(gesdisc_from_config(config, http.clone())),
            Arc::new(power_from_config(config, http)),
        )
        .with_concurrency(config.history.concurrency)
        .with_bands(config.history.bands))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_bands(mut self, bands: BandScheme) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, progress: Progress) {
        debug!(
            state = %progress.state,
            completed = progress.completed,
            failed = progress.failed,
            total = progress.total,
            "aggregation progress"
        );
        if let Some(observer) = &self.progress {
            observer(progress);
        }
    }

    /// Fetch one daily record per year. Years failing with a per-year error
    /// are reported in [`DailyHistory::failures`]. Any other error moves the
    /// request to [`AggregationState::Failed`] and is returned; units still in
    /// flight are dropped.
    pub async fn collect_daily_records(
        &self,
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<DailyHistory, FetchError> {
        let total = years.len();
        let mut progress = Progress {
            state: AggregationState::Idle,
            completed: 0,
            failed: 0,
            total,
        };
        self.report(progress);

        info!(%month_day, ?point, start = years.start, end = years.end, "fetching daily history");
        progress.state = AggregationState::Fetching;
        self.report(progress);

        let daily = &self.daily;
        let mut units = stream::iter(years.iter())
            .map(|year| async move {
                // None: the calendar day does not exist in this year
                let result = match month_day.in_year(year) {
                    Some(date) => Some(daily.fetch_day(date, point).await),
                    None => None,
                };
                (year, result)
            })
            .buffer_unordered(self.concurrency);

        let mut settled = Vec::with_capacity(total);
        while let Some((year, result)) = units.next().await {
            let result = match result {
                Some(Ok(record)) => Ok(record),
                Some(Err(e)) if e.is_per_year() => Err(e.to_string()),
                Some(Err(e)) => {
                    error!(year, error = %e, "aborting daily history");
                    progress.state = AggregationState::Failed;
                    self.report(progress);
                    return Err(e);
                }
                None => Err(format!("{month_day} does not occur in {year}")),
            };

            progress.completed += 1;
            if let Err(reason) = &result {
                warn!(year, %reason, "year contributes no data");
                progress.failed += 1;
                progress.state = AggregationState::PartiallyFailed;
            }
            self.report(progress);
            settled.push((year, result));
        }

        settled.sort_by_key(|(year, _)| *year);

        let mut history = DailyHistory {
            records: Vec::with_capacity(settled.len()),
            failures: Vec::new(),
        };
        for (year, result) in settled {
            match result {
                Ok(record) => history.records.push(record),
                Err(reason) => history.failures.push(YearFailure { year, reason }),
            }
        }

        info!(
            fetched = history.records.len(),
            failed = history.failures.len(),
            "daily history settled"
        );
        Ok(history)
    }

    /// Hour-of-day and band means over every year that could be fetched.
    pub async fn fetch_daily_history(
        &self,
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<AggregateSummary, FetchError> {
        let history = self.collect_daily_records(month_day, point, years).await?;
        Ok(self.reduce(&history, &YearlyScalars::new()))
    }

    /// Per-year values of one coarse variable for a calendar day.
    pub async fn fetch_yearly_scalar(
        &self,
        variable: ScalarVariable,
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<YearlyScalars, FetchError> {
        let mut series = self
            .yearly
            .fetch_yearly(&[variable], month_day, point, years)
            .await?;

        Ok(series.remove(&variable).unwrap_or_default())
    }

    /// All coarse variables for a calendar day in a single request.
    pub async fn fetch_point_summary(
        &self,
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<PointSummary, FetchError> {
        let series = self
            .yearly
            .fetch_yearly(ScalarVariable::all(), month_day, point, years)
            .await?;

        Ok(PointSummary { series })
    }

    /// Hourly history and yearly snow depth, fetched concurrently and reduced
    /// together. Snow depth is best-effort: a per-year kind of failure leaves
    /// it empty.
    pub async fn fetch_precise_history(
        &self,
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<PreciseHistory, FetchError> {
        let (history, snow) = tokio::join!(
            self.collect_daily_records(month_day, point, years),
            self.fetch_yearly_scalar(ScalarVariable::SnowDepth, month_day, point, years),
        );
        let history = history?;

        let snow_depth_cm = match snow {
            Ok(snow) => snow,
            Err(e) if e.is_per_year() => {
                warn!(error = %e, "snow depth unavailable");
                YearlyScalars::new()
            }
            Err(e) => return Err(e),
        };

        let summary = self.reduce(&history, &snow_depth_cm);

        Ok(PreciseHistory {
            records: history.records,
            snow_depth_cm,
            failures: history.failures,
            summary,
        })
    }

    fn reduce(&self, history: &DailyHistory, snow: &YearlyScalars) -> AggregateSummary {
        let total = history.records.len() + history.failures.len();
        let mut progress = Progress {
            state: AggregationState::Reducing,
            completed: total,
            failed: history.failures.len(),
            total,
        };
        self.report(progress);

        let summary = AggregateSummary::from_records(&history.records, snow, self.bands);

        progress.state = AggregationState::Ready;
        self.report(progress);
        summary
    }
}
