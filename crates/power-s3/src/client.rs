//! Query executor.
//!
//! [`PowerClient`] ties the pieces together: validate the request, resolve
//! the store location from its bucket registry, open the dataset, check the
//! requested variables, select the nearest grid point over the time range
//! and return a [`ResultTable`].

use tracing::{debug, error, info, instrument, warn};

use crate::accessor::{Dataset, DatasetAccessor, Selection, ZarrAccessor};
use crate::buckets::BucketRegistry;
use crate::config::ClientConfig;
use crate::error::{AccessError, PowerError, Result};
use crate::query::{Frequency, PowerQuery};
use crate::table::ResultTable;
use crate::validation::validate_coordinates;

/// Client for point time-series queries against NASA POWER stores.
///
/// Each client owns its own [`BucketRegistry`], so overrides made on one
/// client never leak into another.
pub struct PowerClient<A: DatasetAccessor = ZarrAccessor> {
    accessor: A,
    buckets: BucketRegistry,
}

impl PowerClient<ZarrAccessor> {
    /// Create a client using configuration from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::from_env())
    }

    /// Create a client with explicit connection settings.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        debug!(region = %config.region, endpoint = ?config.endpoint, "Creating POWER client");
        Ok(Self::with_accessor(ZarrAccessor::new(config)?))
    }
}

impl<A: DatasetAccessor> PowerClient<A> {
    /// Create a client over any dataset accessor, with the default buckets.
    pub fn with_accessor(accessor: A) -> Self {
        Self {
            accessor,
            buckets: BucketRegistry::from_defaults(),
        }
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn buckets(&self) -> &BucketRegistry {
        &self.buckets
    }

    pub fn buckets_mut(&mut self) -> &mut BucketRegistry {
        &mut self.buckets
    }

    /// Override where a collection's data lives.
    ///
    /// See [`BucketRegistry::update`] for how templates and per-frequency
    /// mappings interact.
    pub fn update_buckets(
        &mut self,
        collection: impl Into<String>,
        frequency: Option<Frequency>,
        url: impl Into<String>,
    ) {
        self.buckets.update(collection, frequency, url);
    }

    /// Fetch a point time series.
    ///
    /// Returns one row per stored time value in `[start, end]` at the grid
    /// point nearest to the requested coordinates.
    #[instrument(
        skip(self, query),
        fields(
            lat = query.latitude,
            lon = query.longitude,
            collection = %query.collection,
            frequency = %query.frequency,
        )
    )]
    pub fn get_data(&self, query: &PowerQuery) -> Result<ResultTable> {
        validate_coordinates(query.latitude, query.longitude)?;

        let location = self.buckets.resolve(&query.collection, query.frequency)?;

        let start = query.start.earliest();
        let end = query.end.latest();
        if start > end {
            warn!(%start, %end, "Start is after end; result will be empty");
        }

        info!(location = %location, variables = ?query.variables, "Fetching POWER data");

        // The handle is dropped when this scope ends, on every path
        let dataset = self
            .accessor
            .open(&location)
            .map_err(|e| classify_access_error(e, query, &location))?;

        // Repeated names would produce duplicate columns
        let mut variables: Vec<String> = Vec::with_capacity(query.variables.len());
        for variable in &query.variables {
            if !variables.contains(variable) {
                variables.push(variable.clone());
            }
        }
        if variables.len() < query.variables.len() {
            debug!(requested = ?query.variables, "Ignoring repeated variable names");
        }

        let available = dataset.variables();
        let missing: Vec<String> = variables
            .iter()
            .filter(|v| !available.contains(v))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PowerError::VariableNotFound {
                frequency: query.frequency.to_string(),
                missing,
            });
        }

        let selection = Selection {
            variables,
            latitude: query.latitude,
            longitude: query.longitude,
            start,
            end,
        };

        let table = dataset
            .select(&selection)
            .map_err(|e| classify_access_error(e, query, &location))?;

        info!(rows = table.len(), "Fetched POWER data");
        Ok(table)
    }
}

/// Turn an accessor failure into a `DataAccess` error.
///
/// Not-found failures usually mean the frequency is not published for the
/// collection, so the message says so and names the location tried.
fn classify_access_error(err: AccessError, query: &PowerQuery, location: &str) -> PowerError {
    let message = if err.is_not_found() {
        format!(
            "Frequency '{}' may not be available for collection '{}'. Attempted to access: {}",
            query.frequency, query.collection, location
        )
    } else {
        format!("Error accessing/processing NASA POWER S3 data: {}", err)
    };

    error!(location = %location, error = %err, "{}", message);

    PowerError::DataAccess {
        message,
        location: Some(location.to_string()),
        source: Some(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{Axes, InMemoryAccessor, InMemoryDataset};
    use crate::query::TimeBound;
    use chrono::NaiveDate;

    const DAILY: &str =
        "s3://nasa-power/merra2/temporal/power_merra2_daily_temporal_utc.zarr";

    fn dataset() -> InMemoryDataset {
        let axes = Axes {
            time: (1..=5)
                .map(|d| {
                    NaiveDate::from_ymd_opt(2023, 1, d)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                })
                .collect(),
            lat: vec![40.0, 40.5],
            lon: vec![-74.375, -73.75],
        };
        let cells = 5 * 2 * 2;
        InMemoryDataset::new(axes)
            .with_variable("T2M", (0..cells).map(|i| i as f64).collect())
            .with_variable("RH2M", vec![55.0; cells])
    }

    fn client() -> PowerClient<InMemoryAccessor> {
        PowerClient::with_accessor(InMemoryAccessor::new().with_dataset(DAILY, dataset()))
    }

    fn query() -> PowerQuery {
        PowerQuery::parse_dates(40.7, -74.0, "2023-01-02", "2023-01-04")
            .unwrap()
            .variables(["T2M"])
    }

    #[test]
    fn test_get_data() {
        let table = client().get_data(&query()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lat(), 40.5);
        assert_eq!(table.lon(), -73.75);
        // t=1, lat=1, lon=1 -> 1*4 + 1*2 + 1
        assert_eq!(table.column("T2M").unwrap()[0], 7.0);
    }

    #[test]
    fn test_invalid_coordinates_checked_first() {
        let mut q = query();
        q.latitude = 91.0;
        let err = client().get_data(&q).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid latitude: 91. Must be between -90 and 90."
        );
    }

    #[test]
    fn test_missing_variables_in_request_order() {
        let q = query().variables(["ZZZ", "T2M", "AAA"]);
        match client().get_data(&q).unwrap_err() {
            PowerError::VariableNotFound { frequency, missing } => {
                assert_eq!(frequency, "daily");
                assert_eq!(missing, vec!["ZZZ", "AAA"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_found_mentions_frequency_and_location() {
        let q = query().frequency(Frequency::Hourly);
        let err = client().get_data(&q).unwrap_err();
        assert!(err.is_access_error());
        let message = err.to_string();
        assert!(message.contains("Frequency 'hourly' may not be available"));
        assert!(message.contains("power_merra2_hourly_temporal_utc.zarr"));
        assert_eq!(
            err.location(),
            Some("s3://nasa-power/merra2/temporal/power_merra2_hourly_temporal_utc.zarr")
        );
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let q = PowerQuery::new(
            40.7,
            -74.0,
            TimeBound::from(NaiveDate::from_ymd_opt(2023, 1, 4).unwrap()),
            TimeBound::from(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()),
        )
        .variables(["T2M", "RH2M"]);
        let table = client().get_data(&q).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["time", "lat", "lon", "T2M", "RH2M"]);
    }

    #[test]
    fn test_repeated_variables_yield_one_column() {
        let q = query().variables(["T2M", "RH2M", "T2M"]);
        let table = client().get_data(&q).unwrap();
        assert_eq!(table.column_names(), vec!["time", "lat", "lon", "T2M", "RH2M"]);

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0].as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_update_buckets_is_per_client() {
        let mut a = client();
        let b = client();
        a.update_buckets("meteorology", None, "s3://mirror/{freq}.zarr");
        assert_eq!(
            a.buckets().resolve("meteorology", Frequency::Daily).unwrap(),
            "s3://mirror/daily.zarr"
        );
        assert_eq!(
            b.buckets().resolve("meteorology", Frequency::Daily).unwrap(),
            DAILY
        );
    }
}
