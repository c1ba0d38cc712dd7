//! Loader configuration.
//!
//! A [`LoaderConfig`] is an immutable value built once via
//! [`LoaderConfig::builder`] and handed to the loader; nothing about a run
//! can drift mid-iteration. Column targets and routed transforms are resolved
//! at build time, not looked up per record.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::source::Record;
use crate::store::{Entity, Store};

/// Routing prefix marking a column-map target as a named routine
/// rather than a field name.
pub const ROUTINE_PREFIX: &str = "->";

// =============================================================================
// Callback types
// =============================================================================

/// Per-field transform: `(value, placeholder) -> replacement`.
///
/// May mutate the placeholder directly; returning `Some` assigns the
/// replacement to the field, returning `None` leaves the field to whatever
/// the callback did itself.
pub type ValueTransform = Box<dyn Fn(&Value, &mut Entity) -> Option<Value>>;

/// Relation lookup: `(value, placeholder, store) -> related entity`.
pub type RelationLookup = Box<dyn Fn(&Value, &Entity, &dyn Store) -> Option<Entity>>;

/// Duplicate lookup: `(field name, candidate record, store) -> existing entity`.
pub type DuplicateLookup = Box<dyn Fn(&str, &Record, &dyn Store) -> Option<Entity>>;

/// Named routine a column can route to: `(placeholder, column key, value, record)`.
///
/// The column key is the *original* input column, so several columns routed
/// to the same routine remain individually addressable.
pub type Routine = Box<dyn Fn(&mut Entity, &str, &Value, &Record)>;

/// Record-level callback run on every entity just before it is written.
pub type RecordCallback = Box<dyn Fn(&mut Entity, &Record)>;

/// Transform callback attached to a field.
///
/// Scalar fields take the `Value` variant; relation fields take the
/// `Relation` variant, which produces the related entity to link.
pub enum TransformCallback {
    Value(ValueTransform),
    Relation(RelationLookup),
}

// =============================================================================
// Column map
// =============================================================================

/// Where a mapped column's value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTarget {
    /// A canonical field name, possibly a dot-notation relation path.
    Field(String),
    /// A named routine; the original column key is retained so multiple
    /// columns can share one routine.
    Routed(String),
}

impl ColumnTarget {
    /// Parse a raw column-map value, recognizing the `->` routing prefix.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(ROUTINE_PREFIX) {
            Some(routine) => Self::Routed(routine.to_string()),
            None => Self::Field(raw.to_string()),
        }
    }
}

// =============================================================================
// Transform specification
// =============================================================================

/// Per-field transformation rule.
#[derive(Default)]
pub struct TransformSpec {
    pub(crate) callback: Option<TransformCallback>,
    pub(crate) required: bool,
    pub(crate) link: Option<bool>,
    pub(crate) create: Option<bool>,
    pub(crate) list: Option<String>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scalar value callback.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &mut Entity) -> Option<Value> + 'static,
    {
        self.callback = Some(TransformCallback::Value(Box::new(callback)));
        self
    }

    /// Attach a relation lookup callback.
    pub fn with_relation_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &Entity, &dyn Store) -> Option<Entity> + 'static,
    {
        self.callback = Some(TransformCallback::Relation(Box::new(callback)));
        self
    }

    /// Reject the record when this field's mapped value is empty.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Allow or forbid linking an already-persisted related entity.
    /// Unset falls back to the loader-wide default.
    pub fn link(mut self, link: bool) -> Self {
        self.link = Some(link);
        self
    }

    /// Allow or forbid persisting a newly built related entity.
    /// Unset falls back to the loader-wide default.
    pub fn create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }

    /// Track resolved relation entities in a named membership list.
    pub fn list(mut self, list: impl Into<String>) -> Self {
        self.list = Some(list.into());
        self
    }
}

// =============================================================================
// Duplicate checks
// =============================================================================

/// A rule used to find a pre-existing entity a record should update
/// instead of insert. Checks run in declaration order; first match wins.
pub enum DuplicateCheck {
    /// Match on exact equality of one field. Dot-notation paths match on the
    /// relation's resolved foreign key column.
    Field(String),
    /// Custom lookup callback, trusted verbatim.
    Callback {
        field: String,
        callback: DuplicateLookup,
    },
}

// =============================================================================
// Loader configuration
// =============================================================================

/// Immutable configuration for one loader.
pub struct LoaderConfig {
    pub(crate) target: String,
    pub(crate) column_map: IndexMap<String, ColumnTarget>,
    pub(crate) transforms: IndexMap<String, TransformSpec>,
    pub(crate) duplicate_checks: Vec<DuplicateCheck>,
    pub(crate) routines: IndexMap<String, Routine>,
    pub(crate) record_callback: Option<RecordCallback>,
    pub(crate) mappable_override: Option<IndexMap<String, String>>,
    pub(crate) link_relations: bool,
    pub(crate) create_relations: bool,
    pub(crate) delete_existing: bool,
    pub(crate) atomic: bool,
}

impl LoaderConfig {
    /// Start building a configuration for the given target entity type.
    pub fn builder(target: impl Into<String>) -> LoaderConfigBuilder {
        LoaderConfigBuilder {
            target: target.into(),
            column_map: IndexMap::new(),
            transforms: IndexMap::new(),
            duplicate_checks: Vec::new(),
            routines: IndexMap::new(),
            record_callback: None,
            mappable_override: None,
            link_relations: true,
            create_relations: true,
            delete_existing: false,
            atomic: false,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Builder for [`LoaderConfig`].
pub struct LoaderConfigBuilder {
    target: String,
    column_map: IndexMap<String, ColumnTarget>,
    transforms: IndexMap<String, TransformSpec>,
    duplicate_checks: Vec<DuplicateCheck>,
    routines: IndexMap<String, Routine>,
    record_callback: Option<RecordCallback>,
    mappable_override: Option<IndexMap<String, String>>,
    link_relations: bool,
    create_relations: bool,
    delete_existing: bool,
    atomic: bool,
}

impl LoaderConfigBuilder {
    /// Rename an incoming column. A target starting with `->` routes the
    /// value to the routine of that name instead of a field.
    pub fn map_column(mut self, from: impl Into<String>, to: &str) -> Self {
        self.column_map.insert(from.into(), ColumnTarget::parse(to));
        self
    }

    /// Attach a transform specification to a canonical field.
    pub fn transform(mut self, field: impl Into<String>, spec: TransformSpec) -> Self {
        self.transforms.insert(field.into(), spec);
        self
    }

    /// Append a field-equality duplicate check.
    pub fn duplicate_check(mut self, field: impl Into<String>) -> Self {
        self.duplicate_checks.push(DuplicateCheck::Field(field.into()));
        self
    }

    /// Append a callback duplicate check.
    pub fn duplicate_check_callback<F>(mut self, field: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&str, &Record, &dyn Store) -> Option<Entity> + 'static,
    {
        self.duplicate_checks.push(DuplicateCheck::Callback {
            field: field.into(),
            callback: Box::new(callback),
        });
        self
    }

    /// Register a named routine that routed columns can target.
    pub fn routine<F>(mut self, name: impl Into<String>, routine: F) -> Self
    where
        F: Fn(&mut Entity, &str, &Value, &Record) + 'static,
    {
        self.routines.insert(name.into(), Box::new(routine));
        self
    }

    /// Run a callback on every entity just before it is written.
    pub fn record_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Entity, &Record) + 'static,
    {
        self.record_callback = Some(Box::new(callback));
        self
    }

    /// Replace scaffolded mappable columns with an explicit mapping.
    pub fn mappable_columns(mut self, columns: IndexMap<String, String>) -> Self {
        self.mappable_override = Some(columns);
        self
    }

    /// Loader-wide default for linking already-persisted related entities.
    pub fn link_relations(mut self, link: bool) -> Self {
        self.link_relations = link;
        self
    }

    /// Loader-wide default for persisting newly built related entities.
    pub fn create_relations(mut self, create: bool) -> Self {
        self.create_relations = create;
        self
    }

    /// Delete every existing record of the target type before loading.
    pub fn delete_existing(mut self, delete: bool) -> Self {
        self.delete_existing = delete;
        self
    }

    /// Wrap each record's writes in a transaction, rolling back relation
    /// writes when the record itself fails validation. Requires a store
    /// with transaction support; silently best-effort otherwise.
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> ConfigResult<LoaderConfig> {
        for (column, target) in &self.column_map {
            if let ColumnTarget::Routed(routine) = target {
                if !self.routines.contains_key(routine) {
                    return Err(ConfigError::UnknownRoutine {
                        column: column.clone(),
                        routine: routine.clone(),
                    });
                }
            }
        }

        Ok(LoaderConfig {
            target: self.target,
            column_map: self.column_map,
            transforms: self.transforms,
            duplicate_checks: self.duplicate_checks,
            routines: self.routines,
            record_callback: self.record_callback,
            mappable_override: self.mappable_override,
            link_relations: self.link_relations,
            create_relations: self.create_relations,
            delete_existing: self.delete_existing,
            atomic: self.atomic,
        })
    }
}

impl LoaderConfig {
    /// Effective link policy for one field.
    pub(crate) fn effective_link(&self, spec: Option<&TransformSpec>) -> bool {
        spec.and_then(|s| s.link).unwrap_or(self.link_relations)
    }

    /// Effective create policy for one field.
    pub(crate) fn effective_create(&self, spec: Option<&TransformSpec>) -> bool {
        spec.and_then(|s| s.create).unwrap_or(self.create_relations)
    }
}
