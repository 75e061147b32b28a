//! In-memory datasets, for offline use and tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::error::AccessError;

use super::{Axes, Dataset, DatasetAccessor};

/// A dataset held in memory. Variable data is time-major:
/// index = `t * (n_lat * n_lon) + lat * n_lon + lon`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    axes: Axes,
    data: BTreeMap<String, Vec<f64>>,
}

impl InMemoryDataset {
    pub fn new(axes: Axes) -> Self {
        Self {
            axes,
            data: BTreeMap::new(),
        }
    }

    /// Add a variable. `values` must hold one value per (time, lat, lon) cell.
    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.data.insert(name.into(), values);
        self
    }

    fn cells(&self) -> usize {
        self.axes.time.len() * self.axes.lat.len() * self.axes.lon.len()
    }
}

impl Dataset for InMemoryDataset {
    fn variables(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn axes(&self) -> Result<Axes, AccessError> {
        Ok(self.axes.clone())
    }

    fn read_series(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f64>, AccessError> {
        let values = self
            .data
            .get(variable)
            .ok_or_else(|| AccessError::not_found(format!("variable '{}' not found", variable)))?;

        if values.len() != self.cells() {
            return Err(AccessError::other(format!(
                "variable '{}' has {} values, expected {}",
                variable,
                values.len(),
                self.cells()
            )));
        }

        let n_lat = self.axes.lat.len();
        let n_lon = self.axes.lon.len();
        time.map(|t| {
            values
                .get(t * n_lat * n_lon + lat_index * n_lon + lon_index)
                .copied()
                .ok_or_else(|| AccessError::other(format!("index out of range for '{}'", variable)))
        })
        .collect()
    }
}

/// Serves [`InMemoryDataset`]s keyed by location.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessor {
    datasets: HashMap<String, InMemoryDataset>,
}

impl InMemoryAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset at a location.
    pub fn with_dataset(mut self, location: impl Into<String>, dataset: InMemoryDataset) -> Self {
        self.datasets.insert(location.into(), dataset);
        self
    }
}

impl DatasetAccessor for InMemoryAccessor {
    type Dataset = InMemoryDataset;

    fn open(&self, location: &str) -> Result<InMemoryDataset, AccessError> {
        self.datasets
            .get(location)
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("no dataset at {}", location)))
    }
}
