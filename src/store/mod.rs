//! Persistence layer abstraction.
//!
//! The loader never talks to a concrete database. It depends on the [`Store`]
//! trait for entity construction, field assignment, relation lookup, uniqueness
//! queries and writes, and on an explicit [`Schema`] description for field and
//! relation introspection.
//!
//! - [`Schema`] / [`TypeDef`] / [`FieldDef`] / [`RelationDef`] - schema description
//! - [`Entity`] - a field bag with optional identity and dirty tracking
//! - [`Store`] - the operations the loader requires from a backend
//! - [`MemStore`](memory::MemStore) - in-memory implementation for the CLI and tests

pub mod memory;

pub use memory::MemStore;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::StoreResult;

/// Identity assigned to a persisted entity.
pub type EntityId = u64;

// =============================================================================
// Schema description
// =============================================================================

/// A declared data field with its human-readable label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Display label, used for mappable-column scaffolding.
    #[serde(default)]
    pub label: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }

    /// Label to display, falling back to the field name.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// A has-one relation to another entity type.
///
/// The foreign key column is always `"{name}ID"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    /// Name of the related entity type.
    pub target: String,
}

impl RelationDef {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// The foreign key column holding the related entity's identity.
    pub fn foreign_key(&self) -> String {
        format!("{}ID", self.name)
    }
}

/// Declared shape of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Add a data field.
    pub fn field(mut self, name: &str, label: &str) -> Self {
        self.fields.push(FieldDef::new(name, label));
        self
    }

    /// Add a has-one relation.
    pub fn relation(mut self, name: &str, target: &str) -> Self {
        self.relations.push(RelationDef::new(name, target));
        self
    }
}

/// Full schema description a [`Store`] exposes to the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    types: IndexMap<String, TypeDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type.
    pub fn define(mut self, def: TypeDef) -> Self {
        self.types.insert(def.name.clone(), def);
        self
    }

    /// Look up a type definition.
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Does `type_name` declare a relation called `relation`, and if so,
    /// which entity type does it target?
    pub fn relation_target(&self, type_name: &str, relation: &str) -> Option<&str> {
        self.type_def(type_name)?
            .relations
            .iter()
            .find(|r| r.name == relation)
            .map(|r| r.target.as_str())
    }

    /// Field name to display label mapping for one type.
    pub fn field_labels(&self, type_name: &str) -> Vec<(String, String)> {
        self.type_def(type_name)
            .map(|def| {
                def.fields
                    .iter()
                    .map(|f| (f.name.clone(), f.display_label().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A persistent (or not-yet-persisted) entity as a typed field bag.
///
/// A freshly constructed entity is a *placeholder*: it has no identity until
/// a [`Store`] saves it. Field assignment tracks dirtiness so the loader can
/// tell a real update apart from a write that changed nothing.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    type_name: String,
    id: Option<EntityId>,
    fields: IndexMap<String, Value>,
    #[serde(skip)]
    dirty: BTreeSet<String>,
}

impl Entity {
    /// Construct an unsaved placeholder of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            fields: IndexMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Identity, if this entity has been persisted.
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Has this entity been persisted?
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Assign a field value. Marks the field dirty only when the value
    /// actually differs from what is already set.
    pub fn set(&mut self, field: &str, value: Value) {
        if self.fields.get(field) == Some(&value) {
            return;
        }
        self.fields.insert(field.to_string(), value);
        self.dirty.insert(field.to_string());
    }

    /// Read a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All field values, in assignment order.
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Fields assigned (with an actual value change) since the last save.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Has any field changed since the last save?
    pub fn is_changed(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Reset dirty tracking, e.g. after loading from or writing to a store.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

// =============================================================================
// Store trait
// =============================================================================

/// Operations the loader requires from a persistence backend.
///
/// Entities are exchanged by value; `save` assigns identity to placeholders
/// and may fail with [`StoreError::Validation`](crate::StoreError::Validation),
/// which the loader absorbs as a per-record skip.
pub trait Store {
    /// Schema description for field and relation introspection.
    fn schema(&self) -> &Schema;

    /// Persist the entity, assigning identity on first save.
    ///
    /// Clears the entity's dirty tracking on success.
    fn save(&mut self, entity: &mut Entity) -> StoreResult<EntityId>;

    /// Fetch an entity by type and identity.
    fn get(&self, type_name: &str, id: EntityId) -> Option<Entity>;

    /// First entity of `type_name` whose `field` equals `value` exactly,
    /// in insertion order.
    fn query_first(&self, type_name: &str, field: &str, value: &Value) -> Option<Entity>;

    /// Delete every entity of the given type. Returns the number deleted.
    fn delete_all(&mut self, type_name: &str) -> usize;

    /// Entity type a membership list holds.
    fn list_target(&self, list: &str) -> StoreResult<String>;

    /// Current members of a membership list, in insertion order.
    fn list_members(&self, list: &str) -> StoreResult<Vec<EntityId>>;

    /// Is the entity already a member of the list?
    fn list_contains(&self, list: &str, id: EntityId) -> bool;

    /// Add an entity to a membership list. Idempotent.
    fn add_to_list(&mut self, list: &str, id: EntityId) -> StoreResult<()>;

    /// Delete every entity currently in the list and empty it.
    /// Returns the number of entities deleted.
    fn delete_list_members(&mut self, list: &str) -> StoreResult<usize>;

    /// Begin a per-record transaction. Returns `false` when the backend
    /// does not support transactions; the loader then proceeds without
    /// rollback protection.
    fn begin_txn(&mut self) -> bool {
        false
    }

    /// Commit the current transaction.
    fn commit_txn(&mut self) {}

    /// Roll back the current transaction.
    fn rollback_txn(&mut self) {}
}
