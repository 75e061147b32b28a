//! Query types for POWER point time-series requests.
//!
//! # Examples
//!
//! ```rust
//! use power_s3::{Frequency, PowerQuery, TimeBound};
//!
//! let query = PowerQuery::new(
//!     30.6,
//!     -96.3,
//!     TimeBound::parse("2023-01-01").unwrap(),
//!     TimeBound::parse("2023-01-10").unwrap(),
//! )
//! .variables(["T2M", "PRECTOTCORR"])
//! .frequency(Frequency::Daily)
//! .collection("meteorology");
//!
//! assert_eq!(query.variables.len(), 2);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_COLLECTION;
use crate::error::{PowerError, Result};
use crate::validation::validate_frequency;

/// Temporal resolution of a POWER dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Hourly,
    Monthly,
    Climatology,
    Annual,
}

impl Frequency {
    /// All supported frequencies.
    pub const ALL: [Frequency; 5] = [
        Self::Daily,
        Self::Hourly,
        Self::Monthly,
        Self::Climatology,
        Self::Annual,
    ];

    /// Name used in store paths and templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::Monthly => "monthly",
            Self::Climatology => "climatology",
            Self::Annual => "annual",
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Daily
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        validate_frequency(s)
    }
}

/// Precision of a parsed [`TimeBound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Day,
    Minute,
    Second,
}

/// A date or datetime bound of a query's time range.
///
/// As an end bound the value covers its whole resolution: `2023-01-10`
/// includes every timestamp on that day and `2023-01-10T06:30` every
/// timestamp within that minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBound {
    start: NaiveDateTime,
    resolution: Resolution,
}

impl TimeBound {
    /// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` or `YYYY-MM-DDTHH:MM:SS`
    /// (a space may replace the `T`).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from(date));
        }

        for (format, resolution) in [
            ("%Y-%m-%dT%H:%M:%S", Resolution::Second),
            ("%Y-%m-%d %H:%M:%S", Resolution::Second),
            ("%Y-%m-%dT%H:%M", Resolution::Minute),
            ("%Y-%m-%d %H:%M", Resolution::Minute),
        ] {
            if let Ok(start) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self { start, resolution });
            }
        }

        Err(PowerError::InvalidDate {
            value: s.to_string(),
        })
    }

    /// Earliest instant covered by this bound.
    pub fn earliest(&self) -> NaiveDateTime {
        self.start
    }

    /// Latest instant covered by this bound (inclusive).
    pub fn latest(&self) -> NaiveDateTime {
        let span = match self.resolution {
            Resolution::Day => Duration::days(1),
            Resolution::Minute => Duration::minutes(1),
            Resolution::Second => Duration::seconds(1),
        };
        self.start + span - Duration::nanoseconds(1)
    }
}

impl From<NaiveDate> for TimeBound {
    fn from(date: NaiveDate) -> Self {
        Self {
            start: date.and_time(NaiveTime::MIN),
            resolution: Resolution::Day,
        }
    }
}

impl From<NaiveDateTime> for TimeBound {
    fn from(start: NaiveDateTime) -> Self {
        Self {
            start,
            resolution: Resolution::Second,
        }
    }
}

impl FromStr for TimeBound {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolution {
            Resolution::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            Resolution::Minute => write!(f, "{}", self.start.format("%Y-%m-%dT%H:%M")),
            Resolution::Second => write!(f, "{}", self.start.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// A point time-series request.
///
/// Use [`PowerQuery::new`] and the builder methods; frequency defaults to
/// daily and collection to `meteorology`.
#[derive(Debug, Clone)]
pub struct PowerQuery {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,

    /// Start of the time range (inclusive)
    pub start: TimeBound,

    /// End of the time range (inclusive)
    pub end: TimeBound,

    /// Variable names to fetch (e.g., "T2M", "PRECTOTCORR"), in output order
    pub variables: Vec<String>,

    /// Dataset frequency
    pub frequency: Frequency,

    /// Collection key in the client's bucket registry
    pub collection: String,
}

impl PowerQuery {
    /// Create a query for a location and time range.
    pub fn new(latitude: f64, longitude: f64, start: TimeBound, end: TimeBound) -> Self {
        Self {
            latitude,
            longitude,
            start,
            end,
            variables: Vec::new(),
            frequency: Frequency::default(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Create a query from date strings.
    pub fn parse_dates(latitude: f64, longitude: f64, start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(
            latitude,
            longitude,
            TimeBound::parse(start)?,
            TimeBound::parse(end)?,
        ))
    }

    /// Set the variables to fetch, replacing any previous list.
    pub fn variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    /// Append one variable.
    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variables.push(variable.into());
        self
    }

    /// Set the dataset frequency.
    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the collection.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_frequency_round_trip_names() {
        for freq in Frequency::ALL {
            assert_eq!(freq.as_str().parse::<Frequency>().unwrap(), freq);
        }
        assert!("weekly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_date_bound_covers_whole_day() {
        let bound = TimeBound::parse("2023-01-10").unwrap();
        assert_eq!(bound.earliest(), dt("2023-01-10 00:00:00"));
        assert!(bound.latest() > dt("2023-01-10 23:59:59"));
        assert!(bound.latest() < dt("2023-01-11 00:00:00"));
    }

    #[test]
    fn test_minute_bound() {
        let bound = TimeBound::parse("2023-01-10T06:30").unwrap();
        assert_eq!(bound.earliest(), dt("2023-01-10 06:30:00"));
        assert!(bound.latest() < dt("2023-01-10 06:31:00"));
        assert_eq!(bound.to_string(), "2023-01-10T06:30");
    }

    #[test]
    fn test_invalid_date() {
        assert!(TimeBound::parse("2023-13-01").is_err());

        let err = TimeBound::parse("01/10/2023").unwrap_err();
        assert!(matches!(err, PowerError::InvalidDate { ref value } if value == "01/10/2023"));
        assert!(err.is_caller_error());
        assert_eq!(
            err.to_string(),
            "Invalid date: '01/10/2023'. Expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]."
        );
    }

    #[test]
    fn test_query_builder_defaults() {
        let query = PowerQuery::parse_dates(30.6, -96.3, "2023-01-01", "2023-01-10")
            .unwrap()
            .variable("T2M");

        assert_eq!(query.frequency, Frequency::Daily);
        assert_eq!(query.collection, "meteorology");
        assert_eq!(query.variables, vec!["T2M".to_string()]);
    }

    #[test]
    fn test_query_builder_overrides() {
        let query = PowerQuery::parse_dates(0.0, 0.0, "2020-01-01", "2020-12-31")
            .unwrap()
            .variables(["ALLSKY_KT", "TOA_SW_DWN"])
            .frequency(Frequency::Monthly)
            .collection("solar");

        assert_eq!(query.frequency, Frequency::Monthly);
        assert_eq!(query.collection, "solar");
        assert_eq!(query.variables.len(), 2);
    }
}
