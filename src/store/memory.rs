//! In-memory [`Store`] implementation.
//!
//! `MemStore` backs the CLI and the test suite. It keeps entities in
//! insertion order per type, supports named membership lists, optional
//! per-type validators, and snapshot-based per-record transactions.

use indexmap::IndexMap;
use serde_json::Value;

use super::{Entity, EntityId, Schema, Store};
use crate::error::{StoreError, StoreResult};

/// Per-type validation hook run before every save.
pub type Validator = Box<dyn Fn(&Entity) -> Result<(), String>>;

#[derive(Clone)]
struct ListState {
    target: String,
    members: Vec<EntityId>,
}

#[derive(Clone)]
struct Snapshot {
    rows: IndexMap<String, IndexMap<EntityId, Entity>>,
    lists: IndexMap<String, ListState>,
    next_id: EntityId,
}

/// In-memory persistence backend.
pub struct MemStore {
    schema: Schema,
    rows: IndexMap<String, IndexMap<EntityId, Entity>>,
    lists: IndexMap<String, ListState>,
    validators: IndexMap<String, Validator>,
    next_id: EntityId,
    snapshot: Option<Snapshot>,
}

impl MemStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: IndexMap::new(),
            lists: IndexMap::new(),
            validators: IndexMap::new(),
            next_id: 1,
            snapshot: None,
        }
    }

    /// Define a named membership list holding entities of `target` type.
    pub fn define_list(&mut self, name: impl Into<String>, target: impl Into<String>) {
        self.lists.insert(
            name.into(),
            ListState {
                target: target.into(),
                members: Vec::new(),
            },
        );
    }

    /// Register a validation hook run before every save of `type_name`.
    pub fn set_validator<F>(&mut self, type_name: impl Into<String>, validator: F)
    where
        F: Fn(&Entity) -> Result<(), String> + 'static,
    {
        self.validators.insert(type_name.into(), Box::new(validator));
    }

    /// Number of stored entities of one type.
    pub fn count(&self, type_name: &str) -> usize {
        self.rows.get(type_name).map_or(0, IndexMap::len)
    }

    /// All stored entities of one type, in insertion order.
    pub fn all(&self, type_name: &str) -> Vec<Entity> {
        self.rows
            .get(type_name)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn list_state(&self, list: &str) -> StoreResult<&ListState> {
        self.lists
            .get(list)
            .ok_or_else(|| StoreError::UnknownList(list.to_string()))
    }
}

impl Store for MemStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn save(&mut self, entity: &mut Entity) -> StoreResult<EntityId> {
        let type_name = entity.type_name().to_string();
        if self.schema.type_def(&type_name).is_none() {
            return Err(StoreError::UnknownType(type_name));
        }
        if let Some(validator) = self.validators.get(&type_name) {
            validator(entity).map_err(StoreError::Validation)?;
        }
        let id = match entity.id() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                entity.assign_id(id);
                id
            }
        };
        entity.clear_dirty();
        self.rows
            .entry(type_name)
            .or_default()
            .insert(id, entity.clone());
        Ok(id)
    }

    fn get(&self, type_name: &str, id: EntityId) -> Option<Entity> {
        self.rows.get(type_name)?.get(&id).cloned()
    }

    fn query_first(&self, type_name: &str, field: &str, value: &Value) -> Option<Entity> {
        self.rows
            .get(type_name)?
            .values()
            .find(|entity| entity.get(field) == Some(value))
            .cloned()
    }

    fn delete_all(&mut self, type_name: &str) -> usize {
        let deleted = self.rows.shift_remove(type_name).map_or(0, |rows| rows.len());
        for list in self.lists.values_mut() {
            if list.target == type_name {
                list.members.clear();
            }
        }
        deleted
    }

    fn list_target(&self, list: &str) -> StoreResult<String> {
        Ok(self.list_state(list)?.target.clone())
    }

    fn list_members(&self, list: &str) -> StoreResult<Vec<EntityId>> {
        Ok(self.list_state(list)?.members.clone())
    }

    fn list_contains(&self, list: &str, id: EntityId) -> bool {
        self.lists
            .get(list)
            .is_some_and(|state| state.members.contains(&id))
    }

    fn add_to_list(&mut self, list: &str, id: EntityId) -> StoreResult<()> {
        let state = self
            .lists
            .get_mut(list)
            .ok_or_else(|| StoreError::UnknownList(list.to_string()))?;
        if !state.members.contains(&id) {
            state.members.push(id);
        }
        Ok(())
    }

    fn delete_list_members(&mut self, list: &str) -> StoreResult<usize> {
        let state = self
            .lists
            .get_mut(list)
            .ok_or_else(|| StoreError::UnknownList(list.to_string()))?;
        let target = state.target.clone();
        let members = std::mem::take(&mut state.members);
        let mut deleted = 0;
        if let Some(rows) = self.rows.get_mut(&target) {
            for id in &members {
                if rows.shift_remove(id).is_some() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    fn begin_txn(&mut self) -> bool {
        self.snapshot = Some(Snapshot {
            rows: self.rows.clone(),
            lists: self.lists.clone(),
            next_id: self.next_id,
        });
        true
    }

    fn commit_txn(&mut self) {
        self.snapshot = None;
    }

    fn rollback_txn(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.rows = snapshot.rows;
            self.lists = snapshot.lists;
            self.next_id = snapshot.next_id;
        }
    }
}
