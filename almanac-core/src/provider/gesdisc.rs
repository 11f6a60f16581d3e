use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use tracing::debug;

use crate::{
    derived::{celsius_series, hourly_precipitation_series, wind_speed_series},
    error::FetchError,
    grid::GridIndex,
    model::{DailyRecord, GeoPoint, VariableSeries},
    sanitize::{PRECIPITATION_RATE, TEMPERATURE_K, WIND_COMPONENT, clean_and_pad},
};

use super::{DailyRecordSource, QueryBuilder, RequestDescriptor, get_text, normalize_base_url};

const PROVIDER: &str = "gesdisc";

pub const DEFAULT_BASE_URL: &str = "https://goldsmr4.gesdisc.eosdis.nasa.gov/";

pub const TEMPERATURE: &str = "T2M";
pub const EASTWARD_WIND: &str = "U10M";
pub const NORTHWARD_WIND: &str = "V10M";
pub const PRECIPITATION: &str = "PRECTOT";

/// MERRA-2 hourly collections this client reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Single-level diagnostics: temperature and wind components.
    Slv,
    /// Surface flux diagnostics: precipitation.
    Flx,
}

impl Dataset {
    fn path_prefix(&self) -> &'static str {
        match self {
            Dataset::Slv => "opendap/MERRA2/M2T1NXSLV.5.12.4",
            Dataset::Flx => "opendap/MERRA2/M2T1NXFLX.5.12.4",
        }
    }

    fn file_id(&self) -> &'static str {
        match self {
            Dataset::Slv => "slv",
            Dataset::Flx => "flx",
        }
    }

    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            Dataset::Slv => &[TEMPERATURE, EASTWARD_WIND, NORTHWARD_WIND],
            Dataset::Flx => &[PRECIPITATION],
        }
    }
}

impl TryFrom<&str> for Dataset {
    type Error = FetchError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_uppercase().as_str() {
            "SLV" => Ok(Dataset::Slv),
            "FLX" => Ok(Dataset::Flx),
            _ => Err(FetchError::UnknownDataset(value.to_string())),
        }
    }
}

/// Production stream that holds a given year's files.
pub fn stream_for_year(year: i32) -> u16 {
    match year {
        y if y >= 2011 => 400,
        y if y >= 2001 => 300,
        y if y >= 1992 => 200,
        _ => 100,
    }
}

/// Builds OPeNDAP ASCII subset URLs for one dataset and one day.
#[derive(Debug, Clone)]
pub struct GesDiscQuery {
    base_url: String,
    dataset: Dataset,
}

impl GesDiscQuery {
    /// Fails with [`FetchError::UnknownDataset`] for anything but `SLV`/`FLX`.
    pub fn new(base_url: &str, dataset: &str) -> Result<Self, FetchError> {
        Ok(Self::for_dataset(base_url, Dataset::try_from(dataset)?))
    }

    pub fn for_dataset(base_url: &str, dataset: Dataset) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            dataset,
        }
    }
}

impl QueryBuilder for GesDiscQuery {
    type Period = NaiveDate;

    fn build(
        &self,
        date: &NaiveDate,
        point: GeoPoint,
        variables: &[&str],
    ) -> Result<RequestDescriptor, FetchError> {
        let GridIndex { lat, lon } = GridIndex::resolve(point);

        let constraint = variables
            .iter()
            .map(|var| format!("{var}[0:23][{lat}:{lat}][{lon}:{lon}]"))
            .collect::<Vec<_>>()
            .join(",");

        let url = format!(
            "{base}{prefix}/{year:04}/{month:02}/MERRA2_{stream}.tavg1_2d_{file}_Nx.{day}.nc4.ascii?{constraint}",
            base = self.base_url,
            prefix = self.dataset.path_prefix(),
            year = date.year(),
            month = date.month(),
            stream = stream_for_year(date.year()),
            file = self.dataset.file_id(),
            day = date.format("%Y%m%d"),
        );

        Ok(RequestDescriptor { url, query: Vec::new() })
    }
}

/// Coordinate vectors OPeNDAP appends after each grid, e.g. `T2M.time`.
const MAP_VECTORS: &[&str] = &["time", "lat", "lon"];

fn is_map_vector(label: &str, var: &str) -> bool {
    label
        .strip_prefix(var)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|member| MAP_VECTORS.contains(&member))
}

/// Parse an OPeNDAP ASCII response.
///
/// Each line is `label, v1, v2, ...`. A line belongs to the first requested
/// variable that prefixes its label; its numeric fields are appended to that
/// variable's series in order. Non-numeric fields are dropped, as are the
/// grid's coordinate map lines.
pub fn parse_ascii(text: &str, variables: &[&str]) -> VariableSeries {
    let mut results: VariableSeries = variables
        .iter()
        .map(|var| (var.to_string(), Vec::new()))
        .collect();

    for line in text.lines() {
        let mut fields = line.split(',');
        let Some(label) = fields.next().map(str::trim) else {
            continue;
        };
        let Some(var) = variables.iter().find(|var| label.starts_with(**var)) else {
            continue;
        };
        if is_map_vector(label, var) {
            continue;
        }

        if let Some(series) = results.get_mut(*var) {
            series.extend(fields.filter_map(|f| f.trim().parse::<f64>().ok()));
        }
    }

    results
}

#[derive(Debug, Clone)]
pub struct GesDiscProvider {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl GesDiscProvider {
    pub fn new(http: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_dataset(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        point: GeoPoint,
    ) -> Result<VariableSeries, FetchError> {
        let variables = dataset.variables();
        let request = GesDiscQuery::for_dataset(&self.base_url, dataset).build(&date, point, variables)?;
        debug!(url = %request.url, "requesting GES DISC subset");

        let body = get_text(&self.http, PROVIDER, &request, self.token.as_deref()).await?;
        Ok(parse_ascii(&body, variables))
    }
}

#[async_trait]
impl DailyRecordSource for GesDiscProvider {
    async fn fetch_day(&self, date: NaiveDate, point: GeoPoint) -> Result<DailyRecord, FetchError> {
        let (slv, flx) = tokio::try_join!(
            self.fetch_dataset(Dataset::Slv, date, point),
            self.fetch_dataset(Dataset::Flx, date, point),
        )?;

        Ok(record_from_series(date, &slv, &flx))
    }
}

/// Clean raw SLV/FLX series and derive the hourly record.
pub fn record_from_series(date: NaiveDate, slv: &VariableSeries, flx: &VariableSeries) -> DailyRecord {
    let raw = |series: &VariableSeries, var: &str| series.get(var).cloned().unwrap_or_default();

    let temperature_k = clean_and_pad(&raw(slv, TEMPERATURE), Some(&TEMPERATURE_K));
    let u = clean_and_pad(&raw(slv, EASTWARD_WIND), Some(&WIND_COMPONENT));
    let v = clean_and_pad(&raw(slv, NORTHWARD_WIND), Some(&WIND_COMPONENT));
    let precip_rate = clean_and_pad(&raw(flx, PRECIPITATION), Some(&PRECIPITATION_RATE));

    DailyRecord {
        date,
        temperature_c: celsius_series(&temperature_k),
        wind_speed_m_s: wind_speed_series(&u, &v),
        precipitation_mm: hourly_precipitation_series(&precip_rate),
    }
}
