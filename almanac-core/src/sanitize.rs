//! Replacing fill values and physically implausible readings with "missing".

use std::ops::RangeInclusive;

use crate::model::{HOURS_PER_DAY, HourlySeries};

/// Magnitudes at or above this are netCDF fill values, not readings.
pub const FILL_VALUE_THRESHOLD: f64 = 1e10;

/// -90 °C ..= 60 °C
pub const TEMPERATURE_K: RangeInclusive<f64> = 183.0..=333.0;
/// Eastward / northward wind component, m/s.
pub const WIND_COMPONENT: RangeInclusive<f64> = -150.0..=150.0;
/// kg m⁻² s⁻¹; 1.0 is roughly 3600 mm/h.
pub const PRECIPITATION_RATE: RangeInclusive<f64> = 0.0..=1.0;

/// Fit a raw series to exactly 24 hourly slots.
///
/// Values that are non-finite, fill values, or outside `valid` become
/// `None`. Short input is padded with `None`; anything past 24 is dropped.
pub fn clean_and_pad(raw: &[f64], valid: Option<&RangeInclusive<f64>>) -> HourlySeries {
    let mut out: HourlySeries = [None; HOURS_PER_DAY];
    for (slot, &value) in out.iter_mut().zip(raw) {
        *slot = is_plausible(value, valid).then_some(value);
    }
    out
}

fn is_plausible(value: f64, valid: Option<&RangeInclusive<f64>>) -> bool {
    value.is_finite()
        && value.abs() < FILL_VALUE_THRESHOLD
        && valid.is_none_or(|range| range.contains(&value))
}
