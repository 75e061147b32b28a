//! Fixed tables: default buckets, coordinate bounds, frequencies and
//! well-known variables.

/// Placeholder substituted with the frequency name in bucket templates.
pub const FREQUENCY_PLACEHOLDER: &str = "{freq}";

/// Built-in collection → store template table.
///
/// Layout on S3:
/// `s3://nasa-power/{source}/temporal/power_{source}_{freq}_temporal_utc.zarr`
///
/// Never mutated; every client registry starts from a copy.
pub const DEFAULT_BUCKETS: &[(&str, &str)] = &[
    (
        "meteorology",
        "s3://nasa-power/merra2/temporal/power_merra2_{freq}_temporal_utc.zarr",
    ),
    (
        "solar",
        "s3://nasa-power/srb/temporal/power_srb_{freq}_temporal_utc.zarr",
    ),
];

/// Collection used when a query does not name one.
pub const DEFAULT_COLLECTION: &str = "meteorology";

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported frequency names, in display order.
pub const FREQUENCY_NAMES: &[&str] = &["daily", "hourly", "monthly", "climatology", "annual"];

/// AWS region hosting the public `nasa-power` bucket.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Names recognised for each coordinate axis, in lookup order.
pub const TIME_NAMES: &[&str] = &["time"];
pub const LAT_NAMES: &[&str] = &["lat", "latitude"];
pub const LON_NAMES: &[&str] = &["lon", "longitude"];

/// Common variables and the collection that publishes them.
///
/// Solar parameters mostly start with ALLSKY, CLR, TOA or SZA; meteorology
/// ones are T2M, PRECTOT, RH, WS and friends.
const VARIABLE_COLLECTIONS: &[(&str, &str)] = &[
    // MERRA-2
    ("T2M", "meteorology"),
    ("T2M_MAX", "meteorology"),
    ("T2M_MIN", "meteorology"),
    ("PRECTOTCORR", "meteorology"),
    ("RH2M", "meteorology"),
    ("WS10M", "meteorology"),
    ("PS", "meteorology"),
    // SRB
    ("ALLSKY_SFC_SW_DWN", "solar"),
    ("CLR_SFC_SW_DWN", "solar"),
    ("ALLSKY_KT", "solar"),
    ("ALLSKY_SFC_LW_DWN", "solar"),
    ("TOA_SW_DWN", "solar"),
];

/// Collection that publishes a well-known variable, if any.
pub fn default_collection_for(variable: &str) -> Option<&'static str> {
    VARIABLE_COLLECTIONS
        .iter()
        .find(|(name, _)| *name == variable)
        .map(|(_, collection)| *collection)
}

/// Collection shared by all of `variables`, if they agree on one.
///
/// Unknown variables are ignored; returns `None` when none are known or the
/// known ones disagree.
pub fn infer_collection<S: AsRef<str>>(variables: &[S]) -> Option<&'static str> {
    let mut found: Option<&'static str> = None;
    for variable in variables {
        if let Some(collection) = default_collection_for(variable.as_ref()) {
            match found {
                None => found = Some(collection),
                Some(existing) if existing != collection => return None,
                Some(_) => {}
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buckets_are_templates() {
        for (_, template) in DEFAULT_BUCKETS {
            assert!(template.contains(FREQUENCY_PLACEHOLDER));
            assert!(template.starts_with("s3://nasa-power/"));
        }
    }

    #[test]
    fn test_default_collection_for() {
        assert_eq!(default_collection_for("T2M"), Some("meteorology"));
        assert_eq!(default_collection_for("ALLSKY_KT"), Some("solar"));
        assert_eq!(default_collection_for("FAKEVAR"), None);
    }

    #[test]
    fn test_infer_collection() {
        assert_eq!(infer_collection(&["T2M", "RH2M"]), Some("meteorology"));
        assert_eq!(infer_collection(&["FAKEVAR", "TOA_SW_DWN"]), Some("solar"));
        assert_eq!(infer_collection(&["T2M", "TOA_SW_DWN"]), None);
        assert_eq!(infer_collection::<&str>(&[]), None);
    }
}
