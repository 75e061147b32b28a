//! Point time-series access to NASA POWER Zarr stores on S3.
//!
//! Given a latitude/longitude, a date range, a frequency and a list of
//! variables, the client finds the store for the requested collection,
//! opens it anonymously and returns the values at the nearest grid point
//! as a [`ResultTable`].
//!
//! # Architecture
//!
//! ```text
//! PowerClient::get_data(query)
//!      │
//!      ├─► validate_coordinates (bounds, before any I/O)
//!      │
//!      ├─► BucketRegistry::resolve(collection, frequency)
//!      │         │
//!      │         ├─► Template: substitute {freq}
//!      │         │
//!      │         └─► FrequencyMap: explicit URL per frequency
//!      │
//!      ├─► DatasetAccessor::open(location)   (s3:// | http(s):// | path)
//!      │
//!      ├─► Check requested variables exist
//!      │
//!      └─► Dataset::select
//!               │
//!               ├─► Nearest lat / lon index
//!               ├─► Inclusive time window
//!               └─► One row per time value
//! ```
//!
//! # Example
//!
//! ```no_run
//! use power_s3::{PowerClient, PowerQuery};
//!
//! let client = PowerClient::new()?;
//! let query = PowerQuery::parse_dates(40.7128, -74.0060, "2023-01-01", "2023-01-10")?
//!     .variables(["T2M", "RH2M"]);
//!
//! let table = client.get_data(&query)?;
//! for row in table.rows() {
//!     println!("{} {:?}", row.time(), row.get("T2M"));
//! }
//! # Ok::<(), power_s3::PowerError>(())
//! ```

pub mod accessor;
pub mod buckets;
pub mod classify;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod query;
pub mod table;
pub mod testdata;
pub mod validation;

// Re-export commonly used types at crate root
pub use accessor::{
    Axes, Dataset, DatasetAccessor, InMemoryAccessor, InMemoryDataset, Selection, ZarrAccessor,
    ZarrDataset,
};
pub use buckets::{BucketEntry, BucketRegistry};
pub use client::PowerClient;
pub use config::ClientConfig;
pub use constants::{default_collection_for, infer_collection, DEFAULT_BUCKETS, DEFAULT_COLLECTION};
pub use error::{AccessError, AccessErrorKind, PowerError, ResolutionError, Result};
pub use query::{Frequency, PowerQuery, TimeBound};
pub use table::{Column, ResultTable, Row};
pub use validation::{validate_coordinates, validate_frequency};
