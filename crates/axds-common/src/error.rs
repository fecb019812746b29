//! Error types for the AXDS catalog client.

use thiserror::Error;

/// Result type alias using AxdsError.
pub type AxdsResult<T> = Result<T, AxdsError>;

/// Primary error type for catalog operations.
#[derive(Debug, Error)]
pub enum AxdsError {
    // === Configuration Errors ===
    #[error("Datatype must be one of {allowed:?} but is {got}")]
    UnknownDatatype {
        got: String,
        allowed: &'static [&'static str],
    },

    #[error("Output type must be one of {allowed:?} but is {got}")]
    UnknownOutType {
        got: String,
        allowed: &'static [&'static str],
    },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Unknown standard names: {0:?}. Check available values with `available_names()`")]
    UnknownStandardNames(Vec<String>),

    // === Lookup Errors ===
    #[error("Entry not found in catalog: {0}")]
    EntryNotFound(String),

    // === Network / Remote Errors ===
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("No results were returned for the search. Search url: {0}")]
    NoResults(String),

    #[error("No data available for dataset {0}")]
    NoData(String),

    // === Data Errors ===
    #[error("Failed to read data: {0}")]
    DataRead(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of errors, for callers that only care about the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller asked for something invalid.
    Configuration,
    /// A name was not present in the catalog.
    Lookup,
    /// The remote service was unreachable or answered with something unusable.
    Remote,
    /// Data was fetched but could not be turned into a container.
    Data,
}

impl AxdsError {
    /// Get the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AxdsError::UnknownDatatype { .. }
            | AxdsError::UnknownOutType { .. }
            | AxdsError::InvalidParameter { .. }
            | AxdsError::InvalidBbox(_)
            | AxdsError::InvalidTime(_)
            | AxdsError::UnknownStandardNames(_) => ErrorCategory::Configuration,

            AxdsError::EntryNotFound(_) => ErrorCategory::Lookup,

            AxdsError::Network { .. }
            | AxdsError::HttpStatus { .. }
            | AxdsError::MalformedResponse { .. }
            | AxdsError::NoResults(_)
            | AxdsError::NoData(_) => ErrorCategory::Remote,

            AxdsError::DataRead(_) | AxdsError::Internal(_) => ErrorCategory::Data,
        }
    }

    /// Shorthand for an [`AxdsError::InvalidParameter`].
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        AxdsError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for AxdsError {
    fn from(err: std::io::Error) -> Self {
        AxdsError::DataRead(err.to_string())
    }
}

impl From<serde_json::Error> for AxdsError {
    fn from(err: serde_json::Error) -> Self {
        AxdsError::Internal(format!("JSON error: {}", err))
    }
}
