//! Human-readable output.

use std::{
    fmt::Write as _,
    io::{IsTerminal, Write as _},
};

use almanac_core::{
    GeoPoint, HourlyVariable, MonthDay, PointSummary, PreciseHistory, Progress, ScalarVariable,
    YearRange,
    aggregate::AggregationState,
    summary::{Bin, VariableSummary},
};

fn value(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:.2} {unit}"),
        None => "N/A".to_string(),
    }
}

fn heading(out: &mut String, date: &MonthDay, point: &GeoPoint, years: YearRange) {
    let _ = writeln!(out, "Selected date: {date}");
    let _ = writeln!(out, "Lat: {}, Lon: {}", point.latitude, point.longitude);
    let _ = writeln!(out, "Years: {}-{}", years.start, years.end);
    out.push('\n');
}

pub fn point_summary(date: &MonthDay, point: &GeoPoint, years: YearRange, summary: &PointSummary) -> String {
    let mut out = String::new();
    heading(&mut out, date, point, years);

    for variable in ScalarVariable::all() {
        let n = summary.values(*variable).map_or(0, |v| v.len());
        let _ = writeln!(
            out,
            "{:<14} {:>14}  ({n} years)",
            variable.to_string(),
            value(summary.mean(*variable), variable.unit()),
        );
    }
    out
}

fn variable_block(out: &mut String, variable: HourlyVariable, summary: &VariableSummary) {
    let unit = variable.unit();
    let _ = writeln!(out, "{variable} (overall {})", value(summary.overall, unit));

    for band in &summary.bands {
        let _ = writeln!(out, "  {:<10} {:>12}", band.label, value(band.value, unit));
    }
    for (hour, v) in summary.hourly.iter().enumerate() {
        let _ = writeln!(out, "  {hour:02}:00      {:>12}", value(*v, unit));
    }
    out.push('\n');
}

pub fn precise_history(date: &MonthDay, point: &GeoPoint, years: YearRange, precise: &PreciseHistory) -> String {
    let mut out = String::new();
    heading(&mut out, date, point, years);

    for variable in HourlyVariable::all() {
        variable_block(&mut out, *variable, precise.summary.variable(*variable));
    }

    let _ = writeln!(out, "Snow depth     {}", value(precise.summary.snow_depth_cm, "cm"));
    if !precise.failures.is_empty() {
        let failed: Vec<String> = precise.failures.iter().map(|f| f.year.to_string()).collect();
        let _ = writeln!(
            out,
            "{} of {} years unavailable: {}",
            failed.len(),
            years.len(),
            failed.join(", ")
        );
    }
    out
}

pub fn details(heading: &str, unit: &str, samples: &[(i32, f64)], bins: &[Bin]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{heading}");
    out.push('\n');

    for (year, v) in samples {
        let _ = writeln!(out, "  {year}  {v:>8.2} {unit}");
    }
    out.push('\n');

    let _ = writeln!(out, "Frequency distribution");
    for bin in bins {
        let _ = writeln!(out, "  {:>8.2} {unit}  {}", bin.start, "#".repeat(bin.count));
    }
    out
}

/// Progress line on stderr, only when attached to a terminal.
pub fn progress(p: Progress) {
    let mut stderr = std::io::stderr();
    let fetching = matches!(
        p.state,
        AggregationState::Fetching | AggregationState::PartiallyFailed
    );
    if !fetching || !stderr.is_terminal() {
        return;
    }
    let _ = write!(stderr, "\rFetched {}/{} years ({} failed)", p.completed, p.total, p.failed);
    let _ = stderr.flush();
}

pub fn clear_progress() {
    let mut stderr = std::io::stderr();
    if stderr.is_terminal() {
        let _ = write!(stderr, "\r\x1b[2K");
        let _ = stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_render_as_na() {
        assert_eq!(value(None, "mm"), "N/A");
        assert_eq!(value(Some(1.234), "mm"), "1.23 mm");
    }

    #[test]
    fn details_lists_samples_and_bins() {
        let text = details(
            "Temperature at 05:00 UTC on 07/14",
            "°C",
            &[(2000, 10.0), (2001, 10.3)],
            &[Bin { start: 10.0, count: 2 }],
        );
        assert!(text.starts_with("Temperature at 05:00 UTC on 07/14"));
        assert!(text.contains("2001     10.30 °C"));
        assert!(text.contains("##"));
    }

    #[test]
    fn details_for_daily_snow_depth() {
        let snow = ScalarVariable::SnowDepth;
        let text = details(
            &format!("{snow} on 12/25 (daily)"),
            snow.unit(),
            &[(1999, 0.0), (2000, 12.0), (2001, 12.4)],
            &[Bin { start: 0.0, count: 1 }, Bin { start: 12.0, count: 2 }],
        );
        assert!(text.starts_with("Snow depth on 12/25 (daily)"));
        assert!(text.contains("2000     12.00 cm"));
        assert!(text.contains("12.00 cm  ##"));
    }
}
