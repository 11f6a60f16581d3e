//! Flat CSV rendering of the per-year, per-hour dataset.

use chrono::Datelike;
use serde::Serialize;
use thiserror::Error;

use crate::model::{DailyRecord, HOURS_PER_DAY, YearlyScalars};

pub const HEADER: &str =
    "year,month,day,hour,temperature_celsius,wind_speed_m_s,precipitation_mm,snow_depth_cm";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write CSV")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Serialize)]
struct Row {
    year: i32,
    month: u32,
    day: u32,
    hour: usize,
    temperature_celsius: Option<f64>,
    wind_speed_m_s: Option<f64>,
    precipitation_mm: Option<f64>,
    snow_depth_cm: Option<f64>,
}

/// One line per (year, hour), years ascending, missing values as empty
/// fields. A year's snow depth repeats on each of its 24 lines.
pub fn export_table(records: &[DailyRecord], snow: &YearlyScalars) -> Result<String, ExportError> {
    let mut sorted: Vec<&DailyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity((sorted.len() * HOURS_PER_DAY + 1) * 64));

    // written by hand so an empty table still carries its header
    writer.write_record(HEADER.split(','))?;

    for record in sorted {
        let date = record.date;
        let snow_depth_cm = snow.get(&date.year()).copied();

        for hour in 0..HOURS_PER_DAY {
            writer.serialize(Row {
                year: date.year(),
                month: date.month(),
                day: date.day(),
                hour,
                temperature_celsius: record.temperature_c[hour],
                wind_speed_m_s: record.wind_speed_m_s[hour],
                precipitation_mm: record.precipitation_mm[hour],
                snow_depth_cm,
            })?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::NaiveDate;

    fn record(year: i32) -> DailyRecord {
        let mut temperature_c = [Some(f64::from(year) / 100.0); 24];
        temperature_c[3] = None;
        DailyRecord {
            date: NaiveDate::from_ymd_opt(year, 2, 9).unwrap(),
            temperature_c,
            wind_speed_m_s: std::array::from_fn(|h| Some(h as f64 * 0.1)),
            precipitation_mm: [None; 24],
        }
    }

    type Row = (Option<f64>, Option<f64>, Option<f64>, Option<f64>);

    fn parse(text: &str) -> HashMap<(i32, usize), Row> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>().join(","), HEADER);

        let opt = |s: &str| (!s.is_empty()).then(|| s.parse::<f64>().unwrap());
        reader
            .records()
            .map(|r| {
                let f = r.unwrap();
                assert_eq!(f.len(), 8, "bad record: {f:?}");
                (
                    (f[0].parse().unwrap(), f[3].parse().unwrap()),
                    (opt(&f[4]), opt(&f[5]), opt(&f[6]), opt(&f[7])),
                )
            })
            .collect()
    }

    #[test]
    fn header_only_for_empty_input() {
        let csv = export_table(&[], &YearlyScalars::new()).unwrap();
        assert_eq!(csv, format!("{HEADER}\n"));
    }

    #[test]
    fn twenty_four_lines_per_record_sorted_by_year() {
        let records = vec![record(2005), record(1999), record(2001)];
        let csv = export_table(&records, &YearlyScalars::new()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 1 + 3 * 24);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("1999,2,9,0,"));
        assert!(lines[24].starts_with("1999,2,9,23,"));
        assert!(lines[25].starts_with("2001,2,9,0,"));
        assert!(lines[72].starts_with("2005,2,9,23,"));
    }

    #[test]
    fn missing_values_are_empty_and_snow_repeats() {
        let snow: YearlyScalars = [(1999, 12.5)].into_iter().collect();
        let csv = export_table(&[record(1999)], &snow).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[4], "1999,2,9,3,,0.30000000000000004,,12.5");
        assert!(lines[1..].iter().all(|l| l.ends_with(",12.5")));
    }

    #[test]
    fn reparsing_recovers_values() {
        let records = vec![record(1999), record(2000)];
        let snow: YearlyScalars = [(2000, 1.25)].into_iter().collect();
        let parsed = parse(&export_table(&records, &snow).unwrap());

        assert_eq!(parsed.len(), 48);
        for r in &records {
            for hour in 0..24 {
                let row = parsed[&(r.year(), hour)];
                assert_eq!(row.0, r.temperature_c[hour]);
                assert_eq!(row.1, r.wind_speed_m_s[hour]);
                assert_eq!(row.2, r.precipitation_mm[hour]);
                assert_eq!(row.3, snow.get(&r.year()).copied());
            }
        }
    }
}
