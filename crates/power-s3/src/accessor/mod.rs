//! Dataset access trait and implementations.
//!
//! The executor only talks to stores through [`DatasetAccessor`] and
//! [`Dataset`]. [`ZarrAccessor`] reads Zarr stores over S3, HTTP or the
//! local filesystem; [`InMemoryAccessor`] serves datasets built in memory.

mod memory;
mod storage;
mod time;
mod zarr;

pub use memory::{InMemoryAccessor, InMemoryDataset};
pub use storage::{open_store, OpenedStore};
pub use time::{decode_times, parse_cf_time_units, TimeEncoding};
pub use zarr::{ZarrAccessor, ZarrDataset};

use std::ops::Range;

use chrono::NaiveDateTime;

use crate::error::AccessError;
use crate::table::{Column, ResultTable};

/// Opens datasets by location.
pub trait DatasetAccessor {
    /// Handle type. Dropping it releases the dataset.
    type Dataset: Dataset;

    /// Open the dataset at `location` for anonymous, read-only access.
    fn open(&self, location: &str) -> Result<Self::Dataset, AccessError>;
}

/// Coordinate axes of a (time, lat, lon) dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Axes {
    /// Timestamps in ascending order
    pub time: Vec<NaiveDateTime>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

/// What to extract from a dataset.
#[derive(Debug, Clone)]
pub struct Selection {
    pub variables: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Earliest timestamp to include
    pub start: NaiveDateTime,
    /// Latest timestamp to include
    pub end: NaiveDateTime,
}

/// An open dataset exposing variables over (time, lat, lon).
pub trait Dataset {
    /// Names of the data variables (coordinate arrays excluded).
    fn variables(&self) -> Vec<String>;

    /// Read the coordinate axes.
    fn axes(&self) -> Result<Axes, AccessError>;

    /// Read `variable` at one grid point for a range of time indices.
    fn read_series(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f64>, AccessError>;

    /// Nearest grid point, inclusive time slice, flattened to a table.
    fn select(&self, selection: &Selection) -> Result<ResultTable, AccessError> {
        let axes = self.axes()?;

        let lat_index = nearest_index(&axes.lat, selection.latitude)
            .ok_or_else(|| AccessError::other("latitude axis is empty"))?;
        let lon_index = nearest_index(&axes.lon, selection.longitude)
            .ok_or_else(|| AccessError::other("longitude axis is empty"))?;
        let window = time_window(&axes.time, selection.start, selection.end);

        tracing::debug!(
            lat = axes.lat[lat_index],
            lon = axes.lon[lon_index],
            rows = window.len(),
            "Selected grid point"
        );

        let mut columns = Vec::with_capacity(selection.variables.len());
        for variable in &selection.variables {
            let values = if window.is_empty() {
                Vec::new()
            } else {
                self.read_series(variable, window.clone(), lat_index, lon_index)?
            };
            columns.push(Column {
                name: variable.clone(),
                values,
            });
        }

        ResultTable::new(
            axes.time[window].to_vec(),
            axes.lat[lat_index],
            axes.lon[lon_index],
            columns,
        )
        .map_err(AccessError::other)
    }
}

/// Index of the coordinate closest to `target`.
///
/// Ties go to the lowest index; NaN coordinates are skipped.
pub fn nearest_index(coords: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &c) in coords.iter().enumerate() {
        let distance = (c - target).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

/// Indices of ascending `times` within `[start, end]`.
///
/// Empty when `start > end` or the range misses the axis.
pub fn time_window(times: &[NaiveDateTime], start: NaiveDateTime, end: NaiveDateTime) -> Range<usize> {
    let lo = times.partition_point(|t| *t < start);
    let hi = times.partition_point(|t| *t <= end);
    lo..hi.max(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_nearest_index() {
        let lats = [29.5, 30.0, 30.5, 31.0];
        assert_eq!(nearest_index(&lats, 30.6), Some(2));
        assert_eq!(nearest_index(&lats, -100.0), Some(0));
        assert_eq!(nearest_index(&lats, 100.0), Some(3));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn test_nearest_index_tie_takes_lowest() {
        assert_eq!(nearest_index(&[0.0, 1.0], 0.5), Some(0));
        assert_eq!(nearest_index(&[1.0, 0.0], 0.5), Some(0));
    }

    #[test]
    fn test_nearest_index_skips_nan() {
        assert_eq!(nearest_index(&[f64::NAN, 5.0], 0.0), Some(1));
    }

    #[test]
    fn test_time_window_inclusive() {
        let times: Vec<_> = (1..=10).map(day).collect();
        assert_eq!(time_window(&times, day(1), day(10)), 0..10);
        assert_eq!(time_window(&times, day(3), day(3)), 2..3);
    }

    #[test]
    fn test_time_window_empty() {
        let times: Vec<_> = (1..=10).map(day).collect();
        assert!(time_window(&times, day(5), day(4)).is_empty());
        assert!(time_window(&times, day(20), day(25)).is_empty());
        assert!(time_window(&[], day(1), day(2)).is_empty());
    }
}
