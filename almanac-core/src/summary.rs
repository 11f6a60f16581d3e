//! Reduction of many daily records into hour-of-day and time-of-day means.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    derived::{SECONDS_PER_HOUR, precipitation_total},
    model::{DailyRecord, HOURS_PER_DAY, HourlySeries, HourlyVariable, YearlyScalars},
};

/// A named set of hours of day. Hours may wrap past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBand {
    pub label: String,
    pub hours: Vec<usize>,
}

impl TimeBand {
    /// Hours `start..end`; an `end` at or before `start` wraps past midnight.
    pub fn new(label: &str, start: usize, end: usize) -> Self {
        let start = start % HOURS_PER_DAY;
        let len = match (end + HOURS_PER_DAY - start) % HOURS_PER_DAY {
            0 => HOURS_PER_DAY,
            n => n,
        };
        Self {
            label: label.to_string(),
            hours: (0..len).map(|i| (start + i) % HOURS_PER_DAY).collect(),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.hours.len() as f64 * SECONDS_PER_HOUR
    }
}

/// How the day is partitioned for band means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandScheme {
    /// night 00–08, morning 08–16, evening 16–24
    #[default]
    EightHour,
    /// morning 06–12, afternoon 12–18, night 18–06
    Daypart,
}

impl BandScheme {
    pub fn bands(&self) -> Vec<TimeBand> {
        match self {
            BandScheme::EightHour => vec![
                TimeBand::new("night", 0, 8),
                TimeBand::new("morning", 8, 16),
                TimeBand::new("evening", 16, 24),
            ],
            BandScheme::Daypart => vec![
                TimeBand::new("morning", 6, 12),
                TimeBand::new("afternoon", 12, 18),
                TimeBand::new("night", 18, 6),
            ],
        }
    }
}

impl std::str::FromStr for BandScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eight-hour" => Ok(BandScheme::EightHour),
            "daypart" => Ok(BandScheme::Daypart),
            _ => Err(anyhow::anyhow!(
                "Unknown band scheme '{s}'. Supported schemes: eight-hour, daypart."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandValue {
    pub label: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSummary {
    /// Mean per hour of day across all years.
    pub hourly: HourlySeries,
    /// Mean per band; for precipitation, the mean total over the band.
    pub bands: Vec<BandValue>,
    /// Mean over every valid sample of every year.
    pub overall: Option<f64>,
}

/// Multi-year climatology for one calendar day at one location.
///
/// `None` always means no year contributed a valid sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    /// Years with a daily record, ascending.
    pub years: Vec<i32>,
    pub temperature_c: VariableSummary,
    pub wind_speed_m_s: VariableSummary,
    pub precipitation_mm: VariableSummary,
    pub snow_depth_cm: Option<f64>,
}

impl AggregateSummary {
    /// `records` must be in a stable order for results to be reproducible;
    /// the aggregator sorts them by year.
    pub fn from_records(records: &[DailyRecord], snow: &YearlyScalars, scheme: BandScheme) -> Self {
        let bands = scheme.bands();

        Self {
            years: records.iter().map(DailyRecord::year).collect(),
            temperature_c: summarize(records, HourlyVariable::Temperature, &bands),
            wind_speed_m_s: summarize(records, HourlyVariable::WindSpeed, &bands),
            precipitation_mm: summarize(records, HourlyVariable::Precipitation, &bands),
            snow_depth_cm: mean(snow.values().copied()),
        }
    }

    pub fn variable(&self, variable: HourlyVariable) -> &VariableSummary {
        match variable {
            HourlyVariable::Temperature => &self.temperature_c,
            HourlyVariable::WindSpeed => &self.wind_speed_m_s,
            HourlyVariable::Precipitation => &self.precipitation_mm,
        }
    }
}

fn summarize(records: &[DailyRecord], variable: HourlyVariable, bands: &[TimeBand]) -> VariableSummary {
    let hourly: HourlySeries = std::array::from_fn(|hour| pooled_mean(records, variable, &[hour]));

    let bands = bands
        .iter()
        .map(|band| {
            let band_mean = pooled_mean(records, variable, &band.hours);
            let value = match variable {
                // hourly mm is a rate per hour; scale to the band's length
                HourlyVariable::Precipitation => precipitation_total(
                    band_mean.map(|mm_per_hour| mm_per_hour / SECONDS_PER_HOUR),
                    band.seconds(),
                ),
                _ => band_mean,
            };
            BandValue {
                label: band.label.clone(),
                value,
            }
        })
        .collect();

    let all_hours: Vec<usize> = (0..HOURS_PER_DAY).collect();
    let overall = pooled_mean(records, variable, &all_hours);

    VariableSummary { hourly, bands, overall }
}

/// Mean over the given hours of every record, year by year.
fn pooled_mean(records: &[DailyRecord], variable: HourlyVariable, hours: &[usize]) -> Option<f64> {
    mean(records.iter().flat_map(|r| {
        let series = r.series(variable);
        hours.iter().filter_map(move |&h| series.get(h).copied().flatten())
    }))
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// The per-year values behind one hour's mean, missing years skipped.
pub fn hour_samples(records: &[DailyRecord], variable: HourlyVariable, hour: usize) -> Vec<(i32, f64)> {
    records
        .iter()
        .filter_map(|r| {
            r.series(variable)
                .get(hour)
                .copied()
                .flatten()
                .map(|v| (r.year(), v))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub start: f64,
    pub count: usize,
}

/// Count values per bin of `bin_width`, bins starting at multiples of the
/// width. Sorted by bin start; empty bins are omitted.
pub fn frequency_distribution(values: &[f64], bin_width: f64) -> Vec<Bin> {
    if !(bin_width.is_finite() && bin_width > 0.0) {
        return Vec::new();
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values.iter().filter(|v| v.is_finite()) {
        *counts.entry((v / bin_width).floor() as i64).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(idx, count)| Bin {
            start: idx as f64 * bin_width,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(year: i32, temperature_c: HourlySeries) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(year, 7, 14).unwrap(),
            temperature_c,
            wind_speed_m_s: [Some(2.0); 24],
            precipitation_mm: [None; 24],
        }
    }

    #[test]
    fn hourly_mean_ignores_missing_year() {
        let y1 = [Some(10.0); 24];
        let mut y2 = [Some(20.0); 24];
        y2[5] = None;
        let y3 = [Some(14.0); 24];

        let records = vec![record(2000, y1), record(2001, y2), record(2002, y3)];
        let summary = AggregateSummary::from_records(&records, &YearlyScalars::new(), BandScheme::EightHour);

        assert_eq!(summary.temperature_c.hourly[5], Some(12.0));
        assert!((summary.temperature_c.hourly[4].unwrap() - 44.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.years, vec![2000, 2001, 2002]);
    }

    #[test]
    fn no_samples_means_no_data_not_zero() {
        let records = vec![record(2000, [None; 24])];
        let summary = AggregateSummary::from_records(&records, &YearlyScalars::new(), BandScheme::EightHour);

        assert!(summary.temperature_c.hourly.iter().all(Option::is_none));
        assert!(summary.temperature_c.bands.iter().all(|b| b.value.is_none()));
        assert_eq!(summary.temperature_c.overall, None);
        assert_eq!(summary.precipitation_mm.overall, None);
        assert_eq!(summary.snow_depth_cm, None);
        assert_eq!(summary.wind_speed_m_s.overall, Some(2.0));
    }

    #[test]
    fn empty_collection_yields_no_data() {
        let summary = AggregateSummary::from_records(&[], &YearlyScalars::new(), BandScheme::Daypart);
        assert!(summary.years.is_empty());
        assert!(summary.wind_speed_m_s.hourly.iter().all(Option::is_none));
        assert_eq!(summary.wind_speed_m_s.bands.len(), 3);
    }

    #[test]
    fn precipitation_band_is_a_total() {
        let mut r = record(2010, [None; 24]);
        // 0.0005 kg m-2 s-1 = 1.8 mm per hour in every night hour
        for h in 0..8 {
            r.precipitation_mm[h] = Some(1.8);
        }
        let summary = AggregateSummary::from_records(&[r], &YearlyScalars::new(), BandScheme::EightHour);

        let night = &summary.precipitation_mm.bands[0];
        assert_eq!(night.label, "night");
        assert!((night.value.unwrap() - 14.4).abs() < 1e-9);
        assert_eq!(summary.precipitation_mm.bands[1].value, None);
    }

    #[test]
    fn band_mean_pools_all_hours_and_years() {
        let mut a = [None; 24];
        let mut b = [None; 24];
        a[8] = Some(10.0);
        a[9] = Some(12.0);
        b[15] = Some(20.0);
        let records = vec![record(2000, a), record(2001, b)];
        let summary = AggregateSummary::from_records(&records, &YearlyScalars::new(), BandScheme::EightHour);

        assert_eq!(summary.temperature_c.bands[1].value, Some(14.0));
        assert_eq!(summary.temperature_c.bands[0].value, None);
    }

    #[test]
    fn snow_mean_uses_scalars() {
        let snow: YearlyScalars = [(2000, 2.0), (2001, 4.0)].into_iter().collect();
        let summary = AggregateSummary::from_records(&[], &snow, BandScheme::EightHour);
        assert_eq!(summary.snow_depth_cm, Some(3.0));
    }

    #[test]
    fn daypart_night_wraps_midnight() {
        let bands = BandScheme::Daypart.bands();
        assert_eq!(bands[2].hours, vec![18, 19, 20, 21, 22, 23, 0, 1, 2, 3, 4, 5]);
        assert_eq!(bands[0].hours, (6..12).collect::<Vec<_>>());
        assert_eq!(BandScheme::EightHour.bands()[2].seconds(), 28800.0);
    }

    #[test]
    fn band_scheme_parses() {
        assert_eq!("daypart".parse::<BandScheme>().unwrap(), BandScheme::Daypart);
        assert!("quarters".parse::<BandScheme>().is_err());
    }

    #[test]
    fn reduction_is_reproducible() {
        let records: Vec<_> = (1990..2000)
            .map(|y| record(y, std::array::from_fn(|h| Some(f64::from(y) * 0.013 + h as f64 * 0.7))))
            .collect();
        let a = AggregateSummary::from_records(&records, &YearlyScalars::new(), BandScheme::EightHour);
        let b = AggregateSummary::from_records(&records, &YearlyScalars::new(), BandScheme::EightHour);
        assert_eq!(a, b);
    }

    #[test]
    fn hour_samples_skip_missing() {
        let mut y2 = [Some(20.0); 24];
        y2[3] = None;
        let records = vec![record(2000, [Some(10.0); 24]), record(2001, y2)];

        assert_eq!(hour_samples(&records, HourlyVariable::Temperature, 3), vec![(2000, 10.0)]);
        assert!(hour_samples(&records, HourlyVariable::Temperature, 24).is_empty());
    }

    #[test]
    fn frequency_bins_of_half_degree() {
        let bins = frequency_distribution(&[1.2, 1.4, 1.6, -0.1, 3.0], 0.5);
        assert_eq!(
            bins,
            vec![
                Bin { start: -0.5, count: 1 },
                Bin { start: 1.0, count: 2 },
                Bin { start: 1.5, count: 1 },
                Bin { start: 3.0, count: 1 },
            ]
        );
        assert!(frequency_distribution(&[1.0], 0.0).is_empty());
    }
}
