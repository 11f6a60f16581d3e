use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    ops::RangeInclusive,
    str::FromStr,
};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const HOURS_PER_DAY: usize = 24;

/// One value per hour of day (UTC), `None` where no valid sample exists.
pub type HourlySeries = [Option<f64>; HOURS_PER_DAY];

/// Parser output: variable identifier -> raw samples in reporting order.
pub type VariableSeries = HashMap<String, Vec<f64>>;

/// One scalar per year for a fixed calendar day.
pub type YearlyScalars = BTreeMap<i32, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> anyhow::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(anyhow!("Latitude {latitude} is outside [-90, 90]"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(anyhow!("Longitude {longitude} is outside [-180, 180]"));
        }
        Ok(Self { latitude, longitude })
    }
}

/// A calendar day without a year, e.g. the 14th of July.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Accepts any day that exists in at least one year, so 02/29 is valid.
    pub fn new(month: u32, day: u32) -> Result<Self, FetchError> {
        // 2000 is a leap year
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(FetchError::InvalidDate { month, day });
        }
        Ok(Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// The concrete date in `year`, or `None` for 02/29 in a non-leap year.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }

    /// `MMDD`, the suffix POWER uses in its `YYYYMMDD` keys.
    pub fn suffix(&self) -> String {
        format!("{:02}{:02}", self.month, self.day)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("Expected a date like MM/DD, got '{s}'"))?;
        let month: u32 = month
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid month in '{s}'"))?;
        let day: u32 = day
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid day in '{s}'"))?;

        Ok(MonthDay::new(month, day)?)
    }
}

/// Inclusive range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// The `years` years before last year, plus last year itself.
    pub fn trailing(years: u16, today: NaiveDate) -> Self {
        let end = today.year() - 1;
        Self::new(end - i32::from(years), end)
    }

    pub fn iter(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        let span = i64::from(self.end) - i64::from(self.start) + 1;
        usize::try_from(span).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coarse per-day variables served by the point API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarVariable {
    Temperature,
    Precipitation,
    WindSpeed,
    SnowDepth,
}

impl ScalarVariable {
    pub const fn all() -> &'static [ScalarVariable] {
        &[
            ScalarVariable::Temperature,
            ScalarVariable::Precipitation,
            ScalarVariable::WindSpeed,
            ScalarVariable::SnowDepth,
        ]
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ScalarVariable::Temperature => "°C",
            ScalarVariable::Precipitation => "mm",
            ScalarVariable::WindSpeed => "m/s",
            ScalarVariable::SnowDepth => "cm",
        }
    }
}

impl FromStr for ScalarVariable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "temperature" | "temp" => Ok(ScalarVariable::Temperature),
            "precipitation" | "precip" | "rain" => Ok(ScalarVariable::Precipitation),
            "wind" | "wind-speed" | "wind_speed" => Ok(ScalarVariable::WindSpeed),
            "snow" | "snow-depth" | "snow_depth" => Ok(ScalarVariable::SnowDepth),
            _ => Err(anyhow!(
                "Unknown variable '{s}'. Supported variables: temperature, precipitation, wind, snow."
            )),
        }
    }
}

impl fmt::Display for ScalarVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarVariable::Temperature => "Temperature",
            ScalarVariable::Precipitation => "Precipitation",
            ScalarVariable::WindSpeed => "Wind speed",
            ScalarVariable::SnowDepth => "Snow depth",
        };
        f.write_str(name)
    }
}

/// Variables carried by a [`DailyRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HourlyVariable {
    Temperature,
    WindSpeed,
    Precipitation,
}

impl HourlyVariable {
    pub const fn all() -> &'static [HourlyVariable] {
        &[
            HourlyVariable::Temperature,
            HourlyVariable::WindSpeed,
            HourlyVariable::Precipitation,
        ]
    }

    pub fn unit(&self) -> &'static str {
        match self {
            HourlyVariable::Temperature => "°C",
            HourlyVariable::WindSpeed => "m/s",
            HourlyVariable::Precipitation => "mm",
        }
    }
}

impl fmt::Display for HourlyVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HourlyVariable::Temperature => "Temperature",
            HourlyVariable::WindSpeed => "Wind speed",
            HourlyVariable::Precipitation => "Precipitation",
        };
        f.write_str(name)
    }
}

impl FromStr for HourlyVariable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "temperature" | "temp" => Ok(HourlyVariable::Temperature),
            "wind" | "wind-speed" | "wind_speed" => Ok(HourlyVariable::WindSpeed),
            "precipitation" | "precip" | "rain" => Ok(HourlyVariable::Precipitation),
            _ => Err(anyhow!(
                "Unknown variable '{s}'. Supported variables: temperature, wind, precipitation."
            )),
        }
    }
}

impl TryFrom<ScalarVariable> for HourlyVariable {
    type Error = anyhow::Error;

    fn try_from(value: ScalarVariable) -> Result<Self, Self::Error> {
        match value {
            ScalarVariable::Temperature => Ok(HourlyVariable::Temperature),
            ScalarVariable::Precipitation => Ok(HourlyVariable::Precipitation),
            ScalarVariable::WindSpeed => Ok(HourlyVariable::WindSpeed),
            ScalarVariable::SnowDepth => Err(anyhow!("{value} is only available as a daily value")),
        }
    }
}

/// Cleaned, unit-converted hourly data for one day of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub temperature_c: HourlySeries,
    pub wind_speed_m_s: HourlySeries,
    pub precipitation_mm: HourlySeries,
}

impl DailyRecord {
    pub fn series(&self, variable: HourlyVariable) -> &HourlySeries {
        match variable {
            HourlyVariable::Temperature => &self.temperature_c,
            HourlyVariable::WindSpeed => &self.wind_speed_m_s,
            HourlyVariable::Precipitation => &self.precipitation_mm,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}
