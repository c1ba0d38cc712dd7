//! Error types for the bulk loading pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - loader misconfiguration (fatal, aborts the whole run)
//! - [`StoreError`] - persistence layer failures
//! - [`SourceError`] - record source failures
//! - [`LoadError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations, allowing `?`
//! to work across error boundaries.
//!
//! Only configuration and source-setup failures escape
//! [`BulkLoader::load`](crate::BulkLoader::load); per-record failures (bad
//! record shape, missing required data, entity validation) are folded into
//! the [`LoadResult`](crate::LoadResult) skip list instead.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Loader misconfiguration.
///
/// These indicate the loader itself is unusable for any record, so they
/// abort the entire run rather than being absorbed per record.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No record source has been configured.
    #[error("No source has been configured for the bulk loader")]
    MissingSource,

    /// The configured target type does not exist in the store schema.
    #[error("Unknown target type: {0}")]
    UnknownTarget(String),

    /// A column maps to a routine that was never registered.
    #[error("Column '{column}' routes to unknown routine '{routine}'")]
    UnknownRoutine { column: String, routine: String },

    /// A list-scoped loader targets a list holding a different entity type.
    #[error("List '{list}' does not hold entities of type '{target}'")]
    ListMismatch { list: String, target: String },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Persistence layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity validation failed at save time.
    #[error("{0}")]
    Validation(String),

    /// Entity type not declared in the schema.
    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    /// Membership list not defined on the store.
    #[error("Unknown list: {0}")]
    UnknownList(String),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Record source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the backing file.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV data.
    #[error("Invalid CSV data: {0}")]
    Csv(#[from] csv::Error),

    /// The source contains no data at all.
    #[error("Source is empty")]
    Empty,

    /// Headerless source without a provided header row.
    #[error("No header row available; provide column names explicitly")]
    MissingHeader,
}

// =============================================================================
// Load Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the error type returned by [`BulkLoader::load`](crate::BulkLoader::load).
#[derive(Debug, Error)]
pub enum LoadError {
    /// Loader misconfiguration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence layer failure outside the per-record validation path.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Record source failure.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for configuration building.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ConfigError -> LoadError
        let config_err = ConfigError::MissingSource;
        let load_err: LoadError = config_err.into();
        assert!(load_err.to_string().contains("No source"));

        // SourceError -> LoadError
        let source_err = SourceError::Empty;
        let load_err: LoadError = source_err.into();
        assert!(load_err.to_string().contains("empty"));
    }

    #[test]
    fn test_validation_error_carries_message() {
        let err = StoreError::Validation("Title cannot be blank".into());
        assert_eq!(err.to_string(), "Title cannot be blank");
    }
}
