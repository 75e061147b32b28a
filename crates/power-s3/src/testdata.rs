//! Test data generation utilities.
//!
//! Writes small POWER-shaped Zarr stores to the local filesystem: CF-encoded
//! `time` ("days since ..."), `lat` and `lon` coordinates plus `T2M` and
//! `RH2M` variables over (time, lat, lon). Values follow known formulas so
//! reads can be checked exactly.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

/// Fill value used by the `RH2M` fixture variable.
pub const RH2M_FILL: f32 = -999.0;

/// Layout of a generated store.
#[derive(Debug, Clone)]
pub struct PowerStoreSpec {
    /// Date of time index 0
    pub start: NaiveDate,
    /// Number of daily time steps
    pub days: usize,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Also write a consolidated `.zmetadata` document
    pub consolidated: bool,
}

impl Default for PowerStoreSpec {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            days: 31,
            // MERRA-2 style 0.5 x 0.625 degree spacing around New York
            lat: vec![39.5, 40.0, 40.5, 41.0],
            lon: vec![-75.0, -74.375, -73.75, -73.125],
            consolidated: false,
        }
    }
}

/// `T2M` at (time, lat, lon) index.
pub fn t2m_value(t: usize, y: usize, x: usize) -> f32 {
    270.0 + t as f32 * 0.5 + y as f32 + x as f32 * 0.1
}

/// `RH2M` at (time, lat, lon) index. Time step 0 holds the fill value.
pub fn rh2m_value(t: usize, y: usize, x: usize) -> f32 {
    if t == 0 {
        RH2M_FILL
    } else {
        50.0 + t as f32 + (y * 4 + x) as f32 * 0.25
    }
}

fn grid(spec: &PowerStoreSpec, f: fn(usize, usize, usize) -> f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(spec.days * spec.lat.len() * spec.lon.len());
    for t in 0..spec.days {
        for y in 0..spec.lat.len() {
            for x in 0..spec.lon.len() {
                data.push(f(t, y, x));
            }
        }
    }
    data
}

fn attrs(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Write a POWER-like store rooted at `path`.
pub fn write_power_store(path: &Path, spec: &PowerStoreSpec) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);

    let days = spec.days as u64;
    let n_lat = spec.lat.len() as u64;
    let n_lon = spec.lon.len() as u64;

    // Coordinates
    let time_values: Vec<f64> = (0..spec.days).map(|d| d as f64).collect();
    let units = format!("days since {}", spec.start.format("%Y-%m-%d"));
    let coords: [(&str, &[f64], serde_json::Map<String, serde_json::Value>); 3] = [
        (
            "time",
            &time_values,
            attrs(&[
                ("_ARRAY_DIMENSIONS", serde_json::json!(["time"])),
                ("units", serde_json::json!(units)),
                ("calendar", serde_json::json!("standard")),
            ]),
        ),
        (
            "lat",
            &spec.lat,
            attrs(&[
                ("_ARRAY_DIMENSIONS", serde_json::json!(["lat"])),
                ("units", serde_json::json!("degrees_north")),
            ]),
        ),
        (
            "lon",
            &spec.lon,
            attrs(&[
                ("_ARRAY_DIMENSIONS", serde_json::json!(["lon"])),
                ("units", serde_json::json!("degrees_east")),
            ]),
        ),
    ];

    for (name, values, attributes) in coords {
        let len = values.len() as u64;
        let array = ArrayBuilder::new(
            vec![len],
            DataType::Float64,
            vec![len.max(1)].try_into()?,
            FillValue::from(f64::NAN),
        )
        .attributes(attributes)
        .build(store.clone(), &format!("/{}", name))?;
        array.store_metadata()?;
        if len > 0 {
            let subset = ArraySubset::new_with_start_shape(vec![0], vec![len])?;
            array.store_array_subset_elements(&subset, values)?;
        }
    }

    // Variables
    let variables: [(&str, &str, f32, fn(usize, usize, usize) -> f32); 2] = [
        ("T2M", "K", f32::NAN, t2m_value),
        ("RH2M", "%", RH2M_FILL, rh2m_value),
    ];

    for (name, units, fill, f) in variables {
        let mut attributes = attrs(&[
            ("_ARRAY_DIMENSIONS", serde_json::json!(["time", "lat", "lon"])),
            ("units", serde_json::json!(units)),
        ]);
        if !fill.is_nan() {
            attributes.insert("_FillValue".to_string(), serde_json::json!(fill));
        }

        let array = ArrayBuilder::new(
            vec![days, n_lat, n_lon],
            DataType::Float32,
            vec![8u64, 2, 2].try_into()?,
            FillValue::from(fill),
        )
        .attributes(attributes)
        .build(store.clone(), &format!("/{}", name))?;
        array.store_metadata()?;

        let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![days, n_lat, n_lon])?;
        array.store_array_subset_elements(&subset, grid(spec, f).as_slice())?;
    }

    if spec.consolidated {
        let metadata: serde_json::Map<String, serde_json::Value> = ["time", "lat", "lon", "T2M", "RH2M"]
            .iter()
            .map(|name| (format!("{}/.zarray", name), serde_json::json!({})))
            .collect();
        let doc = serde_json::json!({
            "metadata": metadata,
            "zarr_consolidated_format": 1,
        });
        std::fs::write(path.join(".zmetadata"), serde_json::to_vec_pretty(&doc)?)?;
    }

    Ok(())
}
