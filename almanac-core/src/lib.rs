//! Core library for the `almanac` CLI.
//!
//! This crate defines:
//! - Query builders and parsers for NASA GES DISC (hourly MERRA-2) and NASA POWER (daily point data)
//! - Cleaning of fill values and implausible readings, and derived quantities
//! - Multi-year aggregation into hour-of-day and time-of-day climatologies
//! - CSV export of the per-year hourly dataset
//! - Configuration & credentials handling
//!
//! It is used by `almanac-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod derived;
pub mod error;
pub mod export;
pub mod grid;
pub mod model;
pub mod provider;
pub mod sanitize;
pub mod summary;

pub use aggregate::{Aggregator, DailyHistory, PointSummary, PreciseHistory, Progress};
pub use config::{Config, HistoryConfig, ProviderConfig};
pub use error::FetchError;
pub use export::{ExportError, export_table};
pub use model::{DailyRecord, GeoPoint, HourlyVariable, MonthDay, ScalarVariable, YearRange};
pub use provider::{DailyRecordSource, ProviderId, YearlyScalarSource};
pub use summary::{AggregateSummary, BandScheme};
