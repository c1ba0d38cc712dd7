//! # Bulkload - configurable bulk record import
//!
//! Bulkload reconciles tabular data (CSV files, in-memory record arrays)
//! into a persistence store: columns are mapped to fields and relations,
//! values are transformed, duplicates are matched and updated in place,
//! and every record's fate is accounted for in a returned result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / array │────▶│  Column map │────▶│  Transform  │────▶│    Store    │
//! │  (records)  │     │  (+routing) │     │ (rel+dedup) │     │ (save/skip) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bulkload::{BulkLoader, CsvSource, LoaderConfig, MemStore};
//!
//! let config = LoaderConfig::builder("Student")
//!     .map_column("First Name", "FirstName")
//!     .duplicate_check("Email")
//!     .build()?;
//! let loader = BulkLoader::new(config).with_source(CsvSource::new("students.csv"));
//! let result = loader.load(&mut store)?;
//! println!("{}", result.message());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`store`] - Persistence abstraction: [`Schema`], [`Entity`], the [`Store`] trait
//! - [`source`] - Record sources: CSV with auto-detection, in-memory arrays
//! - [`loader`] - The loader itself: configuration, processing, orchestration
//! - [`result`] - Per-run outcome accumulation and messaging

// Core modules
pub mod error;
pub mod result;
pub mod store;

// Input
pub mod source;

// Loading
pub mod loader;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, LoadError, SourceError, StoreError};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{Entity, EntityId, FieldDef, MemStore, RelationDef, Schema, Store, TypeDef};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::csv::{decode_content, detect_delimiter, detect_encoding, CsvSource};
pub use source::{is_empty_value, ArraySource, Record, RecordSource};

// =============================================================================
// Re-exports - Loader
// =============================================================================

pub use loader::config::{
    DuplicateCheck, LoaderConfig, LoaderConfigBuilder, TransformSpec, ROUTINE_PREFIX,
};
pub use loader::{BulkLoader, ListLoader};

// =============================================================================
// Re-exports - Result
// =============================================================================

pub use result::{LoadResult, MessageType, Skipped};
