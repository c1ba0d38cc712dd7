//! Record sources.
//!
//! A source supplies a finite, ordered sequence of raw [`Record`]s for the
//! loader to consume. CSV syntax, file handling and encodings are entirely the
//! source's concern; the loader only ever sees key-value records.
//!
//! - [`ArraySource`] - in-memory, restartable; useful for tests
//! - [`CsvSource`](csv::CsvSource) - file-backed, parsed once per `open()`

pub mod csv;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SourceResult;

/// One raw row of input data: an ordered mapping of column key to value.
pub type Record = IndexMap<String, Value>;

/// Check if a value is "empty": null, blank string, zero, `false`, or an
/// empty collection. The string `"0"` is a real value, the number `0` is not.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// A source of raw records.
///
/// `open` yields the records in stable order. Whether a source can be opened
/// again after partial consumption is source-specific: [`ArraySource`] is
/// restartable, file-backed sources re-parse the file on every call. Sources
/// must not leak resources when the iterator is dropped early; file-backed
/// sources achieve this by reading eagerly and releasing the handle before
/// the iterator is returned.
pub trait RecordSource {
    fn open(&self) -> SourceResult<Box<dyn Iterator<Item = Record>>>;
}

// =============================================================================
// Array-backed source
// =============================================================================

/// In-memory source. The output is the same as the input, on every `open()`.
#[derive(Debug, Clone, Default)]
pub struct ArraySource {
    records: Vec<Record>,
}

impl ArraySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl RecordSource for ArraySource {
    fn open(&self) -> SourceResult<Box<dyn Iterator<Item = Record>>> {
        Ok(Box::new(self.records.clone().into_iter()))
    }
}

/// Build a [`Record`] from string pairs. Test fixture helper.
#[cfg(test)]
pub(crate) fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
