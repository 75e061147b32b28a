//! Error types for POWER data access.

use thiserror::Error;

use crate::classify::looks_like_not_found;

/// Errors returned to callers of [`PowerClient`](crate::PowerClient).
///
/// The variants fall into two families: caller errors (fix the request or
/// the registry) and access errors (the environment, network or remote
/// store failed). See [`PowerError::is_caller_error`].
#[derive(Error, Debug)]
pub enum PowerError {
    /// Latitude or longitude outside the valid range.
    #[error("Invalid {axis}: {value}. Must be between {min} and {max}.")]
    InvalidCoordinate {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Frequency is not one of the supported values.
    #[error("Invalid frequency: '{value}'. Supported values: {}", crate::constants::FREQUENCY_NAMES.join(", "))]
    InvalidFrequency { value: String },

    /// Start or end date could not be parsed.
    #[error("Invalid date: '{value}'. Expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS].")]
    InvalidDate { value: String },

    /// Collection has no entry in the client's bucket registry.
    #[error("Invalid collection: '{collection}'. Supported: [{}]", .known.join(", "))]
    InvalidCollection {
        collection: String,
        known: Vec<String>,
    },

    /// One or more requested variables are absent from the dataset.
    #[error("Variables not found in {frequency} dataset: [{}]", .missing.join(", "))]
    VariableNotFound {
        frequency: String,
        missing: Vec<String>,
    },

    /// The store could not be located, opened or read.
    #[error("{message}")]
    DataAccess {
        message: String,
        location: Option<String>,
        #[source]
        source: Option<AccessError>,
    },

    /// Bad configuration value (environment or overrides file).
    #[error("configuration error: {0}")]
    Config(String),
}

impl PowerError {
    /// Create a DataAccess error without an underlying cause.
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for errors the caller can fix by changing the request or registry.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. }
                | Self::InvalidFrequency { .. }
                | Self::InvalidDate { .. }
                | Self::InvalidCollection { .. }
                | Self::VariableNotFound { .. }
                | Self::Config(_)
        )
    }

    /// True for failures while resolving, contacting or reading the store.
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::DataAccess { .. })
    }

    /// The location that was being accessed, when known.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::DataAccess { location, .. } => location.as_deref(),
            _ => None,
        }
    }
}

/// Result type for POWER client operations.
pub type Result<T> = std::result::Result<T, PowerError>;

/// Failure to map a (collection, frequency) pair onto a store location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown collection '{collection}' (known: [{}])", .known.join(", "))]
    UnknownCollection {
        collection: String,
        known: Vec<String>,
    },

    #[error("Frequency '{frequency}' is not mapped for collection '{collection}'.")]
    FrequencyNotMapped {
        collection: String,
        frequency: String,
    },

    #[error("Malformed bucket configuration for '{collection}': {reason}")]
    MalformedBucketConfig { collection: String, reason: String },
}

impl From<ResolutionError> for PowerError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::UnknownCollection { collection, known } => {
                PowerError::InvalidCollection { collection, known }
            }
            other => PowerError::DataAccess {
                message: other.to_string(),
                location: None,
                source: None,
            },
        }
    }
}

/// Coarse classification of an accessor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessErrorKind {
    /// The store, an array, or a key inside it does not exist.
    NotFound,
    /// Anything else: network, decoding, unexpected layout.
    Other,
}

/// Error raised by a [`DatasetAccessor`](crate::DatasetAccessor) or
/// [`Dataset`](crate::Dataset).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct AccessError {
    kind: AccessErrorKind,
    message: String,
}

impl AccessError {
    /// Create a NotFound access error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: AccessErrorKind::NotFound,
            message: message.into(),
        }
    }

    /// Create an access error of kind Other.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: AccessErrorKind::Other,
            message: message.into(),
        }
    }

    /// Build from an untyped failure description.
    ///
    /// The kind is guessed with [`looks_like_not_found`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if looks_like_not_found(&message) {
            AccessErrorKind::NotFound
        } else {
            AccessErrorKind::Other
        };
        Self { kind, message }
    }

    pub fn kind(&self) -> AccessErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == AccessErrorKind::NotFound
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Append detail to the message, keeping the kind.
    pub fn context(mut self, detail: impl AsRef<str>) -> Self {
        self.message = format!("{} ({})", self.message, detail.as_ref());
        self
    }
}

impl From<object_store::Error> for AccessError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => Self::not_found(err.to_string()),
            other => Self::from_message(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_collection_maps_to_invalid_collection() {
        let err: PowerError = ResolutionError::UnknownCollection {
            collection: "nope".to_string(),
            known: vec!["meteorology".to_string(), "solar".to_string()],
        }
        .into();

        assert!(matches!(err, PowerError::InvalidCollection { .. }));
        assert!(err.is_caller_error());
        let msg = err.to_string();
        assert!(msg.contains("meteorology"));
        assert!(msg.contains("solar"));
    }

    #[test]
    fn test_unmapped_frequency_maps_to_data_access() {
        let err: PowerError = ResolutionError::FrequencyNotMapped {
            collection: "solar".to_string(),
            frequency: "hourly".to_string(),
        }
        .into();

        assert!(err.is_access_error());
        assert!(err.to_string().contains("hourly"));
        assert!(err.to_string().contains("solar"));
    }

    #[test]
    fn test_access_error_from_message() {
        assert!(AccessError::from_message("HTTP 404 Not Found").is_not_found());
        assert!(!AccessError::from_message("connection reset by peer").is_not_found());
    }

    #[test]
    fn test_access_error_context_keeps_kind() {
        let err = AccessError::not_found("missing .zmetadata").context("listing failed: 503");
        assert!(err.is_not_found());
        assert_eq!(err.message(), "missing .zmetadata (listing failed: 503)");
    }
}
