//! Zarr-backed datasets.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use tokio::runtime::Runtime;
use serde_json::{json, Value};
use tracing::{debug, warn};
use zarrs::array::{Array, ArrayMetadata, DataType, ElementOwned};
use zarrs::array_subset::ArraySubset;
use zarrs_storage::{
    ListableStorageTraits, ReadableListableStorage, ReadableListableStorageTraits,
    ReadableStorageTraits, StoreKey, StorePrefix,
};

use crate::config::ClientConfig;
use crate::constants::{LAT_NAMES, LON_NAMES, TIME_NAMES};
use crate::error::{AccessError, PowerError};

use super::storage::open_store;
use super::time::{decode_times, parse_cf_time_units};
use super::{Axes, Dataset, DatasetAccessor};

type ZarrArray = Array<dyn ReadableListableStorageTraits>;

/// An array handle plus where its fill value came from.
struct OpenedArray {
    array: ZarrArray,
    /// False when a null v2 `fill_value` was replaced with a placeholder.
    stored_fill: bool,
}

/// Opens Zarr stores anonymously through `object_store`.
///
/// Owns a single-threaded tokio runtime used to drive remote reads, so it
/// must not be used from inside another tokio runtime.
pub struct ZarrAccessor {
    config: ClientConfig,
    runtime: Arc<Runtime>,
}

impl ZarrAccessor {
    pub fn new(config: ClientConfig) -> crate::Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PowerError::config(format!("failed to start I/O runtime: {}", e)))?;
        Ok(Self {
            config,
            runtime: Arc::new(runtime),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl DatasetAccessor for ZarrAccessor {
    type Dataset = ZarrDataset;

    fn open(&self, location: &str) -> Result<ZarrDataset, AccessError> {
        let opened = open_store(location, &self.config, &self.runtime)?;
        ZarrDataset::open(opened.store, opened.root, location)
    }
}

/// An open Zarr group holding (time, lat, lon) arrays.
pub struct ZarrDataset {
    store: ReadableListableStorage,
    root: String,
    location: String,
    arrays: BTreeSet<String>,
}

impl ZarrDataset {
    /// Open the group at `root` and enumerate its arrays.
    pub fn open(
        store: ReadableListableStorage,
        root: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, AccessError> {
        let root = root.into();
        let location = location.into();

        let arrays = match consolidated_arrays(&store, &root) {
            Ok(Some(arrays)) => arrays,
            Ok(None) => listed_arrays(&store, &root)?,
            Err(meta_err) => {
                warn!(location = %location, error = %meta_err, "Consolidated metadata unreadable, listing instead");
                listed_arrays(&store, &root).map_err(|list_err| {
                    meta_err.context(format!("listing also failed: {}", list_err))
                })?
            }
        };

        if arrays.is_empty() {
            return Err(AccessError::not_found(format!(
                "no Zarr arrays found at {}",
                location
            )));
        }

        debug!(location = %location, arrays = arrays.len(), "Opened dataset");

        Ok(Self {
            store,
            root,
            location,
            arrays,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// All array names, coordinates included.
    pub fn arrays(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(String::as_str)
    }

    fn array_path(&self, name: &str) -> String {
        if self.root == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.root, name)
        }
    }

    fn open_array(&self, name: &str) -> Result<OpenedArray, AccessError> {
        open_array_at(&self.store, &self.array_path(name))
    }

    fn find_array(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .find_map(|alias| self.arrays.get(*alias).map(String::as_str))
    }

    fn read_coordinate(&self, aliases: &[&str]) -> Result<(ZarrArray, Vec<f64>), AccessError> {
        let name = self.find_array(aliases).ok_or_else(|| {
            AccessError::other(format!(
                "coordinate '{}' not found in {}",
                aliases.join("' / '"),
                self.location
            ))
        })?;
        let array = self.open_array(name)?.array;
        let subset = ArraySubset::new_with_shape(array.shape().to_vec());
        let values = retrieve_f64(&array, &subset)?;
        Ok((array, values))
    }
}

impl Dataset for ZarrDataset {
    fn variables(&self) -> Vec<String> {
        self.arrays
            .iter()
            .filter(|name| !is_coordinate_name(name))
            .cloned()
            .collect()
    }

    fn axes(&self) -> Result<Axes, AccessError> {
        let (time_array, raw_times) = self.read_coordinate(TIME_NAMES)?;
        let units = time_array
            .attributes()
            .get("units")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AccessError::other("time coordinate has no 'units' attribute"))?;
        let encoding = parse_cf_time_units(units)
            .ok_or_else(|| AccessError::other(format!("unsupported time units '{}'", units)))?;
        let time = decode_times(&raw_times, &encoding).map_err(AccessError::other)?;

        if time.windows(2).any(|w| w[0] > w[1]) {
            return Err(AccessError::other("time coordinate is not ascending"));
        }

        let (_, lat) = self.read_coordinate(LAT_NAMES)?;
        let (_, lon) = self.read_coordinate(LON_NAMES)?;

        Ok(Axes { time, lat, lon })
    }

    fn read_series(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f64>, AccessError> {
        if !self.arrays.contains(variable) {
            return Err(AccessError::not_found(format!(
                "variable '{}' not found in {}",
                variable, self.location
            )));
        }

        let OpenedArray { array, stored_fill } = self.open_array(variable)?;
        let shape = array.shape().to_vec();
        let dims = dimension_names(&array).unwrap_or_else(|| default_dims(shape.len()));

        if dims.len() != shape.len() {
            return Err(AccessError::other(format!(
                "'{}' has {} dimension names for {} dimensions",
                variable,
                dims.len(),
                shape.len()
            )));
        }

        let mut start = Vec::with_capacity(shape.len());
        let mut extent = Vec::with_capacity(shape.len());
        for (dim, &size) in dims.iter().zip(&shape) {
            let (s, n) = if TIME_NAMES.contains(&dim.as_str()) {
                (time.start as u64, time.len() as u64)
            } else if LAT_NAMES.contains(&dim.as_str()) {
                (lat_index as u64, 1)
            } else if LON_NAMES.contains(&dim.as_str()) {
                (lon_index as u64, 1)
            } else if size == 1 {
                (0, 1)
            } else {
                return Err(AccessError::other(format!(
                    "'{}' has unsupported dimension '{}'",
                    variable, dim
                )));
            };
            if s + n > size {
                return Err(AccessError::other(format!(
                    "selection out of bounds on '{}' dimension '{}'",
                    variable, dim
                )));
            }
            start.push(s);
            extent.push(n);
        }

        let subset = ArraySubset::new_with_start_shape(start, extent)
            .map_err(|e| AccessError::other(e.to_string()))?;
        let mut values = retrieve_f64(&array, &subset)?;
        mask_and_scale(&array, stored_fill, &mut values);
        Ok(values)
    }
}

impl Drop for ZarrDataset {
    fn drop(&mut self) {
        debug!(location = %self.location, "Closed dataset");
    }
}

fn is_coordinate_name(name: &str) -> bool {
    TIME_NAMES.contains(&name) || LAT_NAMES.contains(&name) || LON_NAMES.contains(&name)
}

fn root_prefix(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Array names from consolidated metadata (`.zmetadata` or a v3
/// `zarr.json` with `consolidated_metadata`). None when neither exists.
fn consolidated_arrays(
    store: &ReadableListableStorage,
    root: &str,
) -> Result<Option<BTreeSet<String>>, AccessError> {
    let prefix = root_prefix(root);

    let v2 = read_json(store, &format!("{}.zmetadata", prefix))?.and_then(|doc| {
        let metadata = doc.get("metadata")?.as_object()?;
        Some(
            metadata
                .keys()
                .filter_map(|key| key.strip_suffix("/.zarray"))
                .filter(|name| !name.contains('/'))
                .map(str::to_string)
                .collect::<BTreeSet<_>>(),
        )
    });
    if v2.is_some() {
        debug!(root, "Using consolidated .zmetadata");
        return Ok(v2);
    }

    let v3 = read_json(store, &format!("{}zarr.json", prefix))?.and_then(|doc| {
        let metadata = doc.get("consolidated_metadata")?.get("metadata")?.as_object()?;
        Some(
            metadata
                .iter()
                .filter(|(name, node)| {
                    !name.contains('/')
                        && node.get("node_type").and_then(|t| t.as_str()) == Some("array")
                })
                .map(|(name, _)| name.clone())
                .collect::<BTreeSet<_>>(),
        )
    });
    if v3.is_some() {
        debug!(root, "Using consolidated zarr.json metadata");
    }
    Ok(v3)
}

/// Fetch and parse a JSON document. Absent keys and malformed JSON give
/// `None`; transport failures are errors.
fn read_json(store: &ReadableListableStorage, key: &str) -> Result<Option<Value>, AccessError> {
    let key = StoreKey::new(key.to_string())
        .map_err(|e| AccessError::other(format!("invalid key '{}': {}", key, e)))?;
    match store.get(&key) {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable metadata document");
                Ok(None)
            }
        },
        Ok(None) => Ok(None),
        Err(e) => Err(AccessError::from_message(format!(
            "failed to read {}: {}",
            key, e
        ))),
    }
}

/// Open the array at node `path`.
///
/// Zarr v2 permits `"fill_value": null`, which zarrs cannot turn into a
/// typed fill value. Such arrays are opened from patched metadata instead.
fn open_array_at(store: &ReadableListableStorage, path: &str) -> Result<OpenedArray, AccessError> {
    let err = match Array::open(store.clone(), path) {
        Ok(array) => {
            return Ok(OpenedArray {
                array,
                stored_fill: true,
            })
        }
        Err(err) => err,
    };

    match open_v2_null_fill(store, path)? {
        Some(array) => {
            debug!(path, "Opened v2 array with null fill_value");
            Ok(OpenedArray {
                array,
                stored_fill: false,
            })
        }
        None => Err(AccessError::from_message(format!(
            "failed to open array '{}': {}",
            path.trim_start_matches('/'),
            err
        ))),
    }
}

/// None unless `path` holds a v2 `.zarray` whose `fill_value` is null.
fn open_v2_null_fill(
    store: &ReadableListableStorage,
    path: &str,
) -> Result<Option<ZarrArray>, AccessError> {
    let node = path.trim_matches('/');
    let key = format!("{}/.zarray", node);
    let mut zarray = match read_json(store, &key)? {
        Some(doc @ Value::Object(_)) => doc,
        _ => return Ok(None),
    };
    if !zarray.get("fill_value").is_some_and(Value::is_null) {
        return Ok(None);
    }

    // dtype strings look like "<f4", "<i8", "|b1"
    let kind = zarray
        .get("dtype")
        .and_then(Value::as_str)
        .and_then(|dtype| dtype.chars().nth(1));
    zarray["fill_value"] = match kind {
        Some('f') => json!("NaN"),
        Some('b') => json!(false),
        _ => json!(0),
    };

    if let Some(attributes) = read_json(store, &format!("{}/.zattrs", node))? {
        zarray["attributes"] = attributes;
    }

    let metadata: ArrayMetadata = serde_json::from_value(zarray)
        .map_err(|e| AccessError::other(format!("invalid array metadata in {}: {}", key, e)))?;
    Array::new_with_metadata(store.clone(), path, metadata)
        .map(Some)
        .map_err(|e| AccessError::other(format!("failed to open array '{}': {}", node, e)))
}

/// Array names found by listing the group's direct children.
fn listed_arrays(store: &ReadableListableStorage, root: &str) -> Result<BTreeSet<String>, AccessError> {
    let prefix = root_prefix(root);
    let store_prefix = if prefix.is_empty() {
        StorePrefix::root()
    } else {
        StorePrefix::new(prefix.clone()).map_err(|e| AccessError::other(e.to_string()))?
    };

    let listing = store
        .list_dir(&store_prefix)
        .map_err(|e| AccessError::from_message(format!("failed to list {}: {}", root, e)))?;

    let mut arrays = BTreeSet::new();
    for child in listing.prefixes() {
        let name = child
            .as_str()
            .trim_start_matches(prefix.as_str())
            .trim_end_matches('/');
        if name.is_empty() || name.starts_with('.') {
            continue;
        }
        let path = if prefix.is_empty() {
            format!("/{}", name)
        } else {
            format!("/{}{}", prefix, name)
        };
        // Subgroups and stray directories fail to open as arrays
        if open_array_at(store, &path).is_ok() {
            arrays.insert(name.to_string());
        }
    }
    Ok(arrays)
}

fn dimension_names(array: &ZarrArray) -> Option<Vec<String>> {
    if let Some(list) = array
        .attributes()
        .get("_ARRAY_DIMENSIONS")
        .and_then(|v| v.as_array())
    {
        let names: Vec<String> = list
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if !names.is_empty() {
            return Some(names);
        }
    }

    let value = serde_json::to_value(array.dimension_names()).ok()?;
    let names: Vec<String> = value
        .as_array()?
        .iter()
        .enumerate()
        .map(|(i, v)| v.as_str().map_or_else(|| format!("dim_{}", i), str::to_string))
        .collect();
    (!names.is_empty()).then_some(names)
}

fn default_dims(ndim: usize) -> Vec<String> {
    match ndim {
        3 => vec!["time".into(), "lat".into(), "lon".into()],
        _ => (0..ndim).map(|i| format!("dim_{}", i)).collect(),
    }
}

fn retrieve_f64(array: &ZarrArray, subset: &ArraySubset) -> Result<Vec<f64>, AccessError> {
    fn read<T: ElementOwned + Copy + Into<f64>>(
        array: &ZarrArray,
        subset: &ArraySubset,
    ) -> Result<Vec<f64>, AccessError> {
        let values: Vec<T> = array
            .retrieve_array_subset_elements(subset)
            .map_err(|e| AccessError::from_message(e.to_string()))?;
        Ok(values.into_iter().map(Into::into).collect())
    }

    fn read_lossy<T: ElementOwned + Copy>(
        array: &ZarrArray,
        subset: &ArraySubset,
        convert: fn(T) -> f64,
    ) -> Result<Vec<f64>, AccessError> {
        let values: Vec<T> = array
            .retrieve_array_subset_elements(subset)
            .map_err(|e| AccessError::from_message(e.to_string()))?;
        Ok(values.into_iter().map(convert).collect())
    }

    match array.data_type() {
        DataType::Float32 => read::<f32>(array, subset),
        DataType::Float64 => read::<f64>(array, subset),
        DataType::Int8 => read::<i8>(array, subset),
        DataType::Int16 => read::<i16>(array, subset),
        DataType::Int32 => read::<i32>(array, subset),
        DataType::Int64 => read_lossy::<i64>(array, subset, |v| v as f64),
        DataType::UInt8 => read::<u8>(array, subset),
        DataType::UInt16 => read::<u16>(array, subset),
        DataType::UInt32 => read::<u32>(array, subset),
        DataType::UInt64 => read_lossy::<u64>(array, subset, |v| v as f64),
        other => Err(AccessError::other(format!(
            "unsupported data type {:?}",
            other
        ))),
    }
}

/// Native fill value of the array, as f64.
fn native_fill(array: &ZarrArray) -> Option<f64> {
    let bytes = array.fill_value().as_ne_bytes();
    let value = match array.data_type() {
        DataType::Float32 => f32::from_ne_bytes(bytes.try_into().ok()?) as f64,
        DataType::Float64 => f64::from_ne_bytes(bytes.try_into().ok()?),
        DataType::Int16 => i16::from_ne_bytes(bytes.try_into().ok()?) as f64,
        DataType::Int32 => i32::from_ne_bytes(bytes.try_into().ok()?) as f64,
        _ => return None,
    };
    Some(value)
}

fn attribute_f64(array: &ZarrArray, name: &str) -> Option<f64> {
    match array.attributes().get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        Value::Array(items) => items.first().and_then(|v| v.as_f64()),
        _ => None,
    }
}

/// Replace fill/missing values with NaN, then apply `scale_factor` and
/// `add_offset`.
///
/// The array's own fill value only counts when it was stored; a placeholder
/// for a null fill would otherwise mask real zeros.
fn mask_and_scale(array: &ZarrArray, stored_fill: bool, values: &mut [f64]) {
    let mut missing: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| attribute_f64(array, name))
        .collect();
    if stored_fill {
        missing.extend(native_fill(array));
    }
    missing.retain(|v| !v.is_nan());

    let scale = attribute_f64(array, "scale_factor").unwrap_or(1.0);
    let offset = attribute_f64(array, "add_offset").unwrap_or(0.0);

    for v in values.iter_mut() {
        if missing.iter().any(|m| *m == *v) {
            *v = f64::NAN;
        } else {
            *v = *v * scale + offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Selection;
    use crate::testdata::{write_power_store, PowerStoreSpec};
    use chrono::NaiveDate;
    use zarrs_filesystem::FilesystemStore;

    fn open_fixture(spec: &PowerStoreSpec) -> (tempfile::TempDir, ZarrDataset) {
        let dir = tempfile::tempdir().unwrap();
        write_power_store(dir.path(), spec).unwrap();
        let store: ReadableListableStorage = Arc::new(FilesystemStore::new(dir.path()).unwrap());
        let ds = ZarrDataset::open(store, "/", dir.path().display().to_string()).unwrap();
        (dir, ds)
    }

    #[test]
    fn test_enumerates_variables_by_listing() {
        let (_dir, ds) = open_fixture(&PowerStoreSpec::default());
        assert_eq!(ds.variables(), vec!["RH2M", "T2M"]);
        assert_eq!(ds.arrays().count(), 5);
    }

    #[test]
    fn test_enumerates_variables_from_zmetadata() {
        let spec = PowerStoreSpec {
            consolidated: true,
            ..Default::default()
        };
        let (_dir, ds) = open_fixture(&spec);
        assert_eq!(ds.variables(), vec!["RH2M", "T2M"]);
    }

    #[test]
    fn test_axes() {
        let (_dir, ds) = open_fixture(&PowerStoreSpec::default());
        let axes = ds.axes().unwrap();
        assert_eq!(axes.time.len(), 31);
        assert_eq!(
            axes.time[0],
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(axes.lat.len(), 4);
        assert_eq!(axes.lon.len(), 4);
    }

    #[test]
    fn test_read_series_masks_fill() {
        let (_dir, ds) = open_fixture(&PowerStoreSpec::default());
        let values = ds.read_series("T2M", 0..3, 1, 2).unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| v.is_finite()));

        // RH2M carries fill values on its first time step
        let rh = ds.read_series("RH2M", 0..2, 0, 0).unwrap();
        assert!(rh[0].is_nan());
        assert!(rh[1].is_finite());
    }

    #[test]
    fn test_select() {
        let (_dir, ds) = open_fixture(&PowerStoreSpec::default());
        let day = |d| {
            NaiveDate::from_ymd_opt(2023, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let table = ds
            .select(&Selection {
                variables: vec!["T2M".to_string()],
                latitude: 40.7,
                longitude: -74.0,
                start: day(1),
                end: day(10),
            })
            .unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(table.column_names(), vec!["time", "lat", "lon", "T2M"]);
    }

    #[test]
    fn test_unknown_variable_is_not_found() {
        let (_dir, ds) = open_fixture(&PowerStoreSpec::default());
        assert!(ds.read_series("FAKEVAR", 0..1, 0, 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store: ReadableListableStorage = Arc::new(FilesystemStore::new(dir.path()).unwrap());
        let err = ZarrDataset::open(store, "/", "empty").err().unwrap();
        assert!(err.is_not_found());
    }
}
