//! Input validation. Runs before any store access.

use crate::constants::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use crate::error::{PowerError, Result};
use crate::query::Frequency;

/// Check latitude and longitude bounds (inclusive). NaN is rejected.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(PowerError::InvalidCoordinate {
            axis: "latitude",
            value: lat,
            min: MIN_LAT,
            max: MAX_LAT,
        });
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(PowerError::InvalidCoordinate {
            axis: "longitude",
            value: lon,
            min: MIN_LON,
            max: MAX_LON,
        });
    }
    Ok(())
}

/// Parse a frequency name. Matching is exact (lowercase).
pub fn validate_frequency(frequency: &str) -> Result<Frequency> {
    Frequency::ALL
        .into_iter()
        .find(|f| f.as_str() == frequency)
        .ok_or_else(|| PowerError::InvalidFrequency {
            value: frequency.to_string(),
        })
}
