use std::{path::PathBuf, sync::Arc};

use almanac_core::{
    Aggregator, BandScheme, Config, GeoPoint, HourlyVariable, MonthDay, ProviderId, ScalarVariable,
    YearRange, export_table,
    summary::{frequency_distribution, hour_samples},
};
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Select};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "almanac",
    version,
    about = "How likely is this weather on this day? Multi-decade historical averages."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where and when to look.
#[derive(Debug, Args)]
pub struct Target {
    /// Calendar day as MM/DD, e.g. 07/14.
    pub date: MonthDay,

    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// First year to include; defaults to the configured window.
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
    pub start: Option<i32>,

    /// Last year to include; defaults to last year.
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
    pub end: Option<i32>,
}

impl Target {
    fn point(&self) -> Result<GeoPoint> {
        GeoPoint::new(self.lat, self.lon)
    }

    fn years(&self, config: &Config) -> YearRange {
        let today = chrono::Local::now().date_naive();
        let window = YearRange::trailing(config.history.years, today);
        YearRange::new(
            self.start.unwrap_or(window.start),
            self.end.unwrap_or(window.end),
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the GES DISC token and history settings.
    Configure,

    /// Daily averages from NASA POWER (one request, coarse).
    Summary {
        #[command(flatten)]
        target: Target,
    },

    /// Hour-by-hour averages from MERRA-2 plus snow depth.
    Hourly {
        #[command(flatten)]
        target: Target,

        /// Write the per-year hourly table as CSV.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Per-year values behind an average: the daily NASA POWER value, or
    /// one hour of MERRA-2 when --hour is given.
    Details {
        #[command(flatten)]
        target: Target,

        /// temperature, precipitation, wind or snow.
        #[arg(long)]
        variable: ScalarVariable,

        /// Hour of day (UTC), 0-23. Not available for snow.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: Option<u8>,

        /// Width of the frequency distribution bins.
        #[arg(long, default_value_t = 0.5)]
        bin_width: f64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Summary { target } => {
                let config = Config::load()?;
                let aggregator = Aggregator::from_config(&config)?;
                let years = target.years(&config);

                let summary = aggregator
                    .fetch_point_summary(target.date, target.point()?, years)
                    .await
                    .context("Failed to fetch daily point data from NASA POWER")?;

                print!("{}", render::point_summary(&target.date, &target.point()?, years, &summary));
                Ok(())
            }
            Command::Hourly { target, export } => {
                let config = Config::load()?;
                let aggregator = Aggregator::from_config(&config)?.with_progress(Arc::new(render::progress));
                let years = target.years(&config);

                let precise = aggregator
                    .fetch_precise_history(target.date, target.point()?, years)
                    .await;
                render::clear_progress();
                let precise = precise.context("Failed to fetch hourly history from GES DISC")?;

                print!("{}", render::precise_history(&target.date, &target.point()?, years, &precise));

                if let Some(path) = export {
                    let csv = export_table(&precise.records, &precise.snow_depth_cm)
                        .context("Failed to render CSV")?;
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
                    println!("Saved {}", path.display());
                }
                Ok(())
            }
            Command::Details {
                target,
                variable,
                hour,
                bin_width,
            } => {
                let config = Config::load()?;
                let aggregator = Aggregator::from_config(&config)?.with_progress(Arc::new(render::progress));
                let years = target.years(&config);
                let point = target.point()?;

                let (heading, unit, samples) = match hour {
                    Some(hour) => {
                        let variable = HourlyVariable::try_from(variable)?;
                        let history = aggregator
                            .collect_daily_records(target.date, point, years)
                            .await;
                        render::clear_progress();
                        let history = history.context("Failed to fetch hourly history from GES DISC")?;

                        (
                            format!("{variable} at {hour:02}:00 UTC on {}", target.date),
                            variable.unit(),
                            hour_samples(&history.records, variable, usize::from(hour)),
                        )
                    }
                    None => {
                        let series = aggregator
                            .fetch_yearly_scalar(variable, target.date, point, years)
                            .await
                            .context("Failed to fetch daily point data from NASA POWER")?;

                        (
                            format!("{variable} on {} (daily)", target.date),
                            variable.unit(),
                            series.into_iter().collect::<Vec<_>>(),
                        )
                    }
                };

                if samples.is_empty() {
                    return Err(anyhow!(
                        "No data for {heading} in {}-{}",
                        years.start,
                        years.end
                    ));
                }
                let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
                let bins = frequency_distribution(&values, bin_width);

                print!("{}", render::details(&heading, unit, &samples, &bins));
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let token = Password::new("GES DISC bearer token (leave empty to keep current):")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;
    if !token.trim().is_empty() {
        config.set_provider_token(ProviderId::GesDisc, token.trim().to_string());
    }

    config.history.years = CustomType::<u16>::new("Years of history before last year:")
        .with_default(config.history.years)
        .prompt()?;

    config.history.concurrency = CustomType::<usize>::new("Concurrent requests per provider:")
        .with_default(config.history.concurrency)
        .with_validator(|n: &usize| {
            Ok(if *n == 0 {
                inquire::validator::Validation::Invalid("Must be at least 1".into())
            } else {
                inquire::validator::Validation::Valid
            })
        })
        .prompt()?;

    let schemes = vec!["eight-hour", "daypart"];
    let current = match config.history.bands {
        BandScheme::EightHour => 0,
        BandScheme::Daypart => 1,
    };
    let scheme = Select::new("Time-of-day bands:", schemes)
        .with_starting_cursor(current)
        .prompt()?;
    config.history.bands = scheme.parse()?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_longitude() {
        let cli = Cli::try_parse_from([
            "almanac", "hourly", "07/14", "--lat", "40.7", "--lon", "-74.0", "--start", "2000",
        ])
        .expect("arguments must parse");

        let Command::Hourly { target, export } = cli.command else {
            panic!("expected hourly command");
        };
        assert_eq!(target.lon, -74.0);
        assert_eq!(target.start, Some(2000));
        assert!(export.is_none());
    }

    #[test]
    fn rejects_invalid_date_and_hour() {
        assert!(Cli::try_parse_from(["almanac", "summary", "02/30", "--lat", "0", "--lon", "0"]).is_err());
        assert!(
            Cli::try_parse_from([
                "almanac", "details", "01/01", "--lat", "0", "--lon", "0", "--variable", "wind",
                "--hour", "24",
            ])
            .is_err()
        );
    }

    #[test]
    fn details_accepts_daily_snow_without_hour() {
        let cli = Cli::try_parse_from([
            "almanac", "details", "12/25", "--lat", "46.5", "--lon", "7.9", "--variable", "snow",
        ])
        .expect("arguments must parse");

        let Command::Details { variable, hour, bin_width, .. } = cli.command else {
            panic!("expected details command");
        };
        assert_eq!(variable, ScalarVariable::SnowDepth);
        assert_eq!(hour, None);
        assert_eq!(bin_width, 0.5);
    }

    #[test]
    fn rejects_out_of_range_years() {
        for year in ["0", "10000", "-2147483648"] {
            assert!(
                Cli::try_parse_from([
                    "almanac", "summary", "01/01", "--lat", "0", "--lon", "0", "--start", year,
                ])
                .is_err(),
                "year {year} must be rejected"
            );
        }
    }

    #[test]
    fn explicit_years_override_window() {
        let target = Target {
            date: MonthDay::new(1, 1).unwrap(),
            lat: 0.0,
            lon: 0.0,
            start: Some(2010),
            end: Some(2012),
        };
        assert_eq!(target.years(&Config::default()), YearRange::new(2010, 2012));
    }
}
