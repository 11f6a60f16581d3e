use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::FetchError,
    model::{GeoPoint, MonthDay, ScalarVariable, YearRange, YearlyScalars},
};

use super::{QueryBuilder, RequestDescriptor, YearlyScalarSource, get_text, normalize_base_url};

const PROVIDER: &str = "power";

pub const DEFAULT_BASE_URL: &str = "https://power.larc.nasa.gov/api/";

/// POWER's documented "no data" value.
pub const SENTINEL: f64 = -999.0;

/// Longest span of years requested in one call.
pub const MAX_SPAN_YEARS: usize = 41;

const COMMUNITY: &str = "RE";

impl ScalarVariable {
    /// Parameter code understood by the POWER API.
    pub fn power_code(&self) -> &'static str {
        match self {
            ScalarVariable::Temperature => "T2M",
            ScalarVariable::Precipitation => "PRECTOTCORR",
            ScalarVariable::WindSpeed => "WS10M",
            ScalarVariable::SnowDepth => "SNODP",
        }
    }
}

/// Builds `temporal/daily/point` requests.
#[derive(Debug, Clone)]
pub struct PowerQuery {
    base_url: String,
}

impl PowerQuery {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
        }
    }
}

impl QueryBuilder for PowerQuery {
    type Period = YearRange;

    fn build(
        &self,
        years: &YearRange,
        point: GeoPoint,
        variables: &[&str],
    ) -> Result<RequestDescriptor, FetchError> {
        Ok(RequestDescriptor {
            url: format!("{}temporal/daily/point", self.base_url),
            query: vec![
                ("parameters", variables.join(",")),
                ("community", COMMUNITY.to_string()),
                ("longitude", point.longitude.to_string()),
                ("latitude", point.latitude.to_string()),
                ("start", years.start.to_string()),
                ("end", years.end.to_string()),
                ("format", "JSON".to_string()),
            ],
        })
    }
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: HashMap<String, BTreeMap<String, Option<f64>>>,
}

/// Parse a POWER JSON body and keep, per variable, the values whose
/// `YYYYMMDD` key falls on `month_day`. Sentinel values are excluded.
pub fn parse_json(
    body: &str,
    variables: &[ScalarVariable],
    month_day: MonthDay,
) -> Result<BTreeMap<ScalarVariable, YearlyScalars>, FetchError> {
    let parsed: PowerResponse =
        serde_json::from_str(body).map_err(|e| FetchError::parse(PROVIDER, e.to_string()))?;

    let suffix = month_day.suffix();
    let mut out = BTreeMap::new();

    for variable in variables {
        let mut scalars = YearlyScalars::new();
        if let Some(by_date) = parsed.properties.parameter.get(variable.power_code()) {
            for (key, value) in by_date {
                let Some(value) = (*value).filter(|v| *v != SENTINEL) else {
                    continue;
                };
                if key.len() != 8 || !key.ends_with(&suffix) {
                    continue;
                }
                if let Some(year) = key.get(..4).and_then(|y| y.parse::<i32>().ok()) {
                    scalars.insert(year, value);
                }
            }
        }
        out.insert(*variable, scalars);
    }

    Ok(out)
}

/// Split a range into consecutive spans of at most `max` years.
fn spans(years: YearRange, max: usize) -> Vec<YearRange> {
    let step = i64::try_from(max.max(1)).unwrap_or(i64::MAX);
    let last = i64::from(years.end);
    let mut out = Vec::new();
    let mut start = i64::from(years.start);
    while start <= last {
        let end = start.saturating_add(step - 1).min(last);
        // both bounds lie within `years`, so they fit in i32
        out.push(YearRange::new(start as i32, end as i32));
        start = end + 1;
    }
    out
}

#[derive(Debug, Clone)]
pub struct PowerProvider {
    http: Client,
    query: PowerQuery,
}

impl PowerProvider {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            query: PowerQuery::new(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.query.base_url
    }
}

#[async_trait]
impl YearlyScalarSource for PowerProvider {
    async fn fetch_yearly(
        &self,
        variables: &[ScalarVariable],
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<BTreeMap<ScalarVariable, YearlyScalars>, FetchError> {
        let codes: Vec<&str> = variables.iter().map(ScalarVariable::power_code).collect();
        let mut merged: BTreeMap<ScalarVariable, YearlyScalars> =
            variables.iter().map(|v| (*v, YearlyScalars::new())).collect();

        for span in spans(years, MAX_SPAN_YEARS) {
            let request = self.query.build(&span, point, &codes)?;
            debug!(url = %request.url, start = span.start, end = span.end, "requesting POWER daily point");

            let body = get_text(&self.http, PROVIDER, &request, None).await?;
            for (variable, scalars) in parse_json(&body, variables, month_day)? {
                merged.entry(variable).or_default().extend(scalars);
            }
        }

        Ok(merged)
    }
}
