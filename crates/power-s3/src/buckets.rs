//! Per-client bucket registry: collection → store location.
//!
//! Each [`BucketRegistry`] starts as a copy of
//! [`DEFAULT_BUCKETS`](crate::constants::DEFAULT_BUCKETS), so updates on one
//! client never leak into another client or into the defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{DEFAULT_BUCKETS, FREQUENCY_PLACEHOLDER};
use crate::error::{PowerError, ResolutionError, Result};
use crate::query::Frequency;

/// Where to find the stores of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketEntry {
    /// URL pattern with a `{freq}` placeholder.
    Template(String),
    /// Explicit URL per frequency.
    FrequencyMap(BTreeMap<Frequency, String>),
}

/// Mapping from collection name to [`BucketEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRegistry {
    entries: BTreeMap<String, BucketEntry>,
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::from_defaults()
    }
}

impl BucketRegistry {
    /// A fresh copy of the built-in table.
    pub fn from_defaults() -> Self {
        let entries = DEFAULT_BUCKETS
            .iter()
            .map(|(collection, template)| {
                (
                    collection.to_string(),
                    BucketEntry::Template(template.to_string()),
                )
            })
            .collect();
        Self { entries }
    }

    /// A registry with no collections.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a mapping.
    ///
    /// Without a frequency, `url` becomes the collection's template and
    /// replaces whatever was there. With a frequency, a missing or template
    /// entry is first replaced by an empty frequency map (the template is
    /// dropped), then `url` is set for that frequency.
    pub fn update(
        &mut self,
        collection: impl Into<String>,
        frequency: Option<Frequency>,
        url: impl Into<String>,
    ) {
        let collection = collection.into();
        let url = url.into();

        match frequency {
            None => {
                self.entries
                    .insert(collection.clone(), BucketEntry::Template(url));
            }
            Some(freq) => {
                let entry = self
                    .entries
                    .entry(collection.clone())
                    .or_insert_with(|| BucketEntry::FrequencyMap(BTreeMap::new()));
                if matches!(entry, BucketEntry::Template(_)) {
                    *entry = BucketEntry::FrequencyMap(BTreeMap::new());
                }
                if let BucketEntry::FrequencyMap(map) = entry {
                    map.insert(freq, url);
                }
            }
        }

        info!(collection = %collection, frequency = ?frequency, "Updated bucket mapping");
    }

    /// Resolve the store location for a collection and frequency.
    pub fn resolve(
        &self,
        collection: &str,
        frequency: Frequency,
    ) -> std::result::Result<String, ResolutionError> {
        let entry = self
            .entries
            .get(collection)
            .ok_or_else(|| ResolutionError::UnknownCollection {
                collection: collection.to_string(),
                known: self.collections(),
            })?;

        match entry {
            BucketEntry::Template(template) => {
                format_template(template, frequency).map_err(|reason| {
                    ResolutionError::MalformedBucketConfig {
                        collection: collection.to_string(),
                        reason,
                    }
                })
            }
            BucketEntry::FrequencyMap(map) => map
                .get(&frequency)
                .filter(|url| !url.is_empty())
                .cloned()
                .ok_or_else(|| ResolutionError::FrequencyNotMapped {
                    collection: collection.to_string(),
                    frequency: frequency.to_string(),
                }),
        }
    }

    /// The entry for a collection, if any.
    pub fn entry(&self, collection: &str) -> Option<&BucketEntry> {
        self.entries.get(collection)
    }

    /// Known collection names, sorted.
    pub fn collections(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Apply overrides from a YAML file.
    ///
    /// ```yaml
    /// meteorology: s3://my-mirror/merra2/power_merra2_{freq}.zarr
    /// solar:
    ///   daily: s3://my-mirror/srb/daily.zarr
    ///   monthly: s3://my-mirror/srb/monthly.zarr
    /// ```
    ///
    /// Entries go through [`BucketRegistry::update`], so a frequency map
    /// replaces an existing template for that collection.
    pub fn load_overrides(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PowerError::config(format!(
                "failed to read bucket overrides '{}': {}",
                path.display(),
                e
            ))
        })?;
        self.apply_overrides_yaml(&text).map_err(|e| match e {
            PowerError::Config(msg) => {
                PowerError::config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Apply overrides from YAML text. See [`BucketRegistry::load_overrides`].
    pub fn apply_overrides_yaml(&mut self, yaml: &str) -> Result<()> {
        let overrides: BTreeMap<String, BucketEntry> = serde_yaml::from_str(yaml)
            .map_err(|e| PowerError::config(format!("invalid bucket overrides: {}", e)))?;

        for (collection, entry) in overrides {
            match entry {
                BucketEntry::Template(url) => self.update(collection, None, url),
                BucketEntry::FrequencyMap(map) => {
                    for (freq, url) in map {
                        self.update(collection.clone(), Some(freq), url);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Substitute the frequency into a template.
///
/// A template without the placeholder resolves to itself. Any brace left
/// after substitution means an unknown placeholder.
fn format_template(template: &str, frequency: Frequency) -> std::result::Result<String, String> {
    if template.trim().is_empty() {
        return Err("empty URL template".to_string());
    }
    let url = template.replace(FREQUENCY_PLACEHOLDER, frequency.as_str());
    if url.contains('{') || url.contains('}') {
        return Err(format!(
            "template '{}' has placeholders other than {}",
            template, FREQUENCY_PLACEHOLDER
        ));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = BucketRegistry::from_defaults();
        assert_eq!(registry.collections(), vec!["meteorology", "solar"]);
        assert_eq!(
            registry.resolve("meteorology", Frequency::Daily).unwrap(),
            "s3://nasa-power/merra2/temporal/power_merra2_daily_temporal_utc.zarr"
        );
        assert_eq!(
            registry.resolve("solar", Frequency::Monthly).unwrap(),
            "s3://nasa-power/srb/temporal/power_srb_monthly_temporal_utc.zarr"
        );
    }

    #[test]
    fn test_template_resolution() {
        let mut registry = BucketRegistry::empty();
        registry.update("x", None, "s3://x/{freq}.zarr");
        assert_eq!(
            registry.resolve("x", Frequency::Daily).unwrap(),
            "s3://x/daily.zarr"
        );
    }

    #[test]
    fn test_instance_isolation() {
        let mut a = BucketRegistry::from_defaults();
        let b = BucketRegistry::from_defaults();

        a.update("meteorology", Some(Frequency::Daily), "s3://custom-daily.zarr");

        assert!(matches!(
            a.entry("meteorology"),
            Some(BucketEntry::FrequencyMap(_))
        ));
        match b.entry("meteorology") {
            Some(BucketEntry::Template(t)) => {
                assert_eq!(t, DEFAULT_BUCKETS[0].1);
                assert!(t.contains("{freq}"));
            }
            other => panic!("expected template, got {:?}", other),
        }
        assert_eq!(BucketRegistry::from_defaults(), b);
    }

    #[test]
    fn test_template_to_frequency_map_transition() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", None, "s3://t/{freq}.zarr");
        assert!(matches!(registry.entry("c"), Some(BucketEntry::Template(_))));

        registry.update("c", Some(Frequency::Hourly), "s3://u.zarr");
        let mut expected = BTreeMap::new();
        expected.insert(Frequency::Hourly, "s3://u.zarr".to_string());
        assert_eq!(
            registry.entry("c"),
            Some(&BucketEntry::FrequencyMap(expected))
        );

        // The template is gone: other frequencies are no longer resolvable.
        let err = registry.resolve("c", Frequency::Daily).unwrap_err();
        assert!(matches!(err, ResolutionError::FrequencyNotMapped { .. }));
    }

    #[test]
    fn test_frequency_map_extends() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", Some(Frequency::Daily), "s3://d.zarr");
        registry.update("c", Some(Frequency::Monthly), "s3://m.zarr");

        assert_eq!(registry.resolve("c", Frequency::Daily).unwrap(), "s3://d.zarr");
        assert_eq!(registry.resolve("c", Frequency::Monthly).unwrap(), "s3://m.zarr");
    }

    #[test]
    fn test_template_replaces_frequency_map() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", Some(Frequency::Daily), "s3://d.zarr");
        registry.update("c", None, "s3://new/{freq}.zarr");
        assert_eq!(
            registry.entry("c"),
            Some(&BucketEntry::Template("s3://new/{freq}.zarr".to_string()))
        );
    }

    #[test]
    fn test_unknown_collection() {
        let registry = BucketRegistry::from_defaults();
        match registry.resolve("nonexistent", Frequency::Daily) {
            Err(ResolutionError::UnknownCollection { collection, known }) => {
                assert_eq!(collection, "nonexistent");
                assert_eq!(known, vec!["meteorology", "solar"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_mapped_url_is_unmapped() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", Some(Frequency::Daily), "");
        assert!(matches!(
            registry.resolve("c", Frequency::Daily),
            Err(ResolutionError::FrequencyNotMapped { .. })
        ));
    }

    #[test]
    fn test_malformed_template() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", None, "s3://x/{frequency}.zarr");
        assert!(matches!(
            registry.resolve("c", Frequency::Daily),
            Err(ResolutionError::MalformedBucketConfig { .. })
        ));

        registry.update("c", None, "  ");
        assert!(matches!(
            registry.resolve("c", Frequency::Daily),
            Err(ResolutionError::MalformedBucketConfig { .. })
        ));
    }

    #[test]
    fn test_template_without_placeholder() {
        let mut registry = BucketRegistry::empty();
        registry.update("c", None, "s3://fixed.zarr");
        assert_eq!(registry.resolve("c", Frequency::Annual).unwrap(), "s3://fixed.zarr");
    }

    #[test]
    fn test_yaml_overrides() {
        let mut registry = BucketRegistry::from_defaults();
        registry
            .apply_overrides_yaml(
                "meteorology: s3://mirror/merra2_{freq}.zarr\n\
                 solar:\n  daily: s3://mirror/srb_daily.zarr\n",
            )
            .unwrap();

        assert_eq!(
            registry.resolve("meteorology", Frequency::Hourly).unwrap(),
            "s3://mirror/merra2_hourly.zarr"
        );
        assert_eq!(
            registry.resolve("solar", Frequency::Daily).unwrap(),
            "s3://mirror/srb_daily.zarr"
        );
        assert!(registry.resolve("solar", Frequency::Monthly).is_err());
    }

    #[test]
    fn test_yaml_overrides_reject_bad_frequency() {
        let mut registry = BucketRegistry::from_defaults();
        let err = registry
            .apply_overrides_yaml("solar:\n  weekly: s3://x.zarr\n")
            .unwrap_err();
        assert!(matches!(err, PowerError::Config(_)));
    }

    #[test]
    fn test_load_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buckets.yaml");
        std::fs::write(&path, "extra: s3://extra/{freq}.zarr\n").unwrap();

        let mut registry = BucketRegistry::from_defaults();
        registry.load_overrides(&path).unwrap();
        assert_eq!(registry.collections(), vec!["extra", "meteorology", "solar"]);

        let missing = registry.load_overrides(&dir.path().join("nope.yaml"));
        assert!(matches!(missing, Err(PowerError::Config(_))));
    }
}
