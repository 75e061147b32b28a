//! Tabular query results.

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Index column names, in output order.
pub const INDEX_COLUMNS: [&str; 3] = ["time", "lat", "lon"];

/// A named data column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Point time-series result: one row per timestamp at the selected grid
/// point, one column per requested variable.
///
/// `lat`/`lon` are the grid coordinates actually selected, which may differ
/// from the query coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    times: Vec<NaiveDateTime>,
    lat: f64,
    lon: f64,
    columns: Vec<Column>,
}

impl ResultTable {
    /// Build a table. Every column must have one value per timestamp.
    pub fn new(
        times: Vec<NaiveDateTime>,
        lat: f64,
        lon: f64,
        columns: Vec<Column>,
    ) -> Result<Self, String> {
        for column in &columns {
            if column.values.len() != times.len() {
                return Err(format!(
                    "column '{}' has {} values for {} timestamps",
                    column.name,
                    column.values.len(),
                    times.len()
                ));
            }
        }
        Ok(Self {
            times,
            lat,
            lon,
            columns,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// All column names: `time`, `lat`, `lon`, then the variables.
    pub fn column_names(&self) -> Vec<&str> {
        INDEX_COLUMNS
            .iter()
            .copied()
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// Variable column names in request order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of a variable column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    /// Selected grid latitude.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Selected grid longitude.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.len()).then_some(Row { table: self, index })
    }

    /// Iterate rows in time order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.len()).map(move |index| Row { table: self, index })
    }

    /// Render as CSV with a header line. Missing values are empty fields.
    pub fn to_csv(&self) -> String {
        let mut out = self.column_names().join(",");
        out.push('\n');
        for row in self.rows() {
            out.push_str(&row.time().format("%Y-%m-%dT%H:%M:%S").to_string());
            out.push_str(&format!(",{},{}", self.lat, self.lon));
            for (_, value) in row.values() {
                out.push(',');
                if !value.is_nan() {
                    out.push_str(&value.to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

/// A borrowed row of a [`ResultTable`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a ResultTable,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn time(&self) -> NaiveDateTime {
        self.table.times[self.index]
    }

    pub fn lat(&self) -> f64 {
        self.table.lat
    }

    pub fn lon(&self) -> f64 {
        self.table.lon
    }

    /// Value of a variable in this row.
    pub fn get(&self, variable: &str) -> Option<f64> {
        self.table.column(variable).map(|values| values[self.index])
    }

    /// (variable, value) pairs in column order.
    pub fn values(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let index = self.index;
        self.table
            .columns
            .iter()
            .map(move |c| (c.name.as_str(), c.values[index]))
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.table.columns.len()))?;
        map.serialize_entry("time", &self.time().format("%Y-%m-%dT%H:%M:%S").to_string())?;
        map.serialize_entry("lat", &self.lat())?;
        map.serialize_entry("lon", &self.lon())?;
        for (name, value) in self.values() {
            // NaN is not representable in JSON
            let value = (!value.is_nan()).then_some(value);
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl Serialize for ResultTable {
    /// Serializes as a list of row objects.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}
