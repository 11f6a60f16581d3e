//! Derived physical quantities and unit conversions.

use crate::model::HourlySeries;

pub const KELVIN_OFFSET: f64 = 273.15;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

pub fn wind_speed(u: Option<f64>, v: Option<f64>) -> Option<f64> {
    match (u, v) {
        (Some(u), Some(v)) => Some((u * u + v * v).sqrt()),
        _ => None,
    }
}

pub fn kelvin_to_celsius(kelvin: Option<f64>) -> Option<f64> {
    kelvin.map(|k| k - KELVIN_OFFSET)
}

/// Total over a period from a mean rate. A rate in kg m⁻² s⁻¹ is mm/s, so
/// `period_seconds = 3600.0` yields mm per hour.
pub fn precipitation_total(mean_rate: Option<f64>, period_seconds: f64) -> Option<f64> {
    mean_rate.map(|rate| rate * period_seconds)
}

pub fn wind_speed_series(u: &HourlySeries, v: &HourlySeries) -> HourlySeries {
    std::array::from_fn(|hour| wind_speed(u[hour], v[hour]))
}

pub fn celsius_series(kelvin: &HourlySeries) -> HourlySeries {
    kelvin.map(kelvin_to_celsius)
}

pub fn hourly_precipitation_series(rate: &HourlySeries) -> HourlySeries {
    rate.map(|r| precipitation_total(r, SECONDS_PER_HOUR))
}
