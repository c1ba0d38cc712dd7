//! Per-record processing.
//!
//! Drives one raw record through mapping, required-field validation,
//! placeholder construction, the two-pass transform (relations strictly
//! before scalars), duplicate resolution, merge, persist and outcome
//! classification. Expected domain conditions never escape as errors; they
//! become skip outcomes.

use indexmap::IndexSet;

use super::config::{ColumnTarget, LoaderConfig, TransformCallback};
use super::duplicates::find_existing;
use super::mapper::map_columns;
use super::relation::resolve_relation;
use crate::error::{LoadError, StoreError};
use crate::source::{is_empty_value, Record};
use crate::store::{Entity, Store};

/// Classified outcome of one record.
pub(crate) enum Outcome {
    Created(Entity),
    Updated(Entity),
    Skipped { index: usize, reason: String },
}

/// Shared context for processing all records of one run.
pub(crate) struct RecordContext<'a> {
    pub config: &'a LoaderConfig,
    /// Fields eligible for transformation, computed once per run.
    pub fields: &'a IndexSet<String>,
    pub preview: bool,
}

enum Applied {
    Persisted(Outcome),
    ValidationFailed(String),
}

/// Process one record. Only configuration misuse and unexpected store
/// failures propagate as errors.
pub(crate) fn process_record(
    ctx: &RecordContext<'_>,
    store: &mut dyn Store,
    raw: &Record,
    index: usize,
) -> Result<Outcome, LoadError> {
    if raw.is_empty() || raw.values().all(is_empty_value) {
        return Ok(Outcome::Skipped {
            index,
            reason: "Empty/invalid record data.".into(),
        });
    }

    let mapped = map_columns(raw, &ctx.config.column_map);

    let missing: Vec<&str> = ctx
        .config
        .transforms
        .iter()
        .filter(|(_, spec)| spec.required)
        .filter(|(field, _)| !mapped.get(field.as_str()).is_some_and(|v| !is_empty_value(v)))
        .map(|(field, _)| field.as_str())
        .collect();
    if !missing.is_empty() {
        return Ok(Outcome::Skipped {
            index,
            reason: format!("Required data is missing: {}", missing.join(", ")),
        });
    }

    let in_txn = ctx.config.atomic && !ctx.preview && store.begin_txn();
    match apply_record(ctx, store, &mapped, index) {
        Ok(Applied::Persisted(outcome)) => {
            if in_txn {
                store.commit_txn();
            }
            Ok(outcome)
        }
        Ok(Applied::ValidationFailed(reason)) => {
            if in_txn {
                store.rollback_txn();
            }
            Ok(Outcome::Skipped { index, reason })
        }
        Err(err) => {
            if in_txn {
                store.rollback_txn();
            }
            Err(err)
        }
    }
}

/// Transform, reconcile and persist one mapped record.
fn apply_record(
    ctx: &RecordContext<'_>,
    store: &mut dyn Store,
    mapped: &Record,
    index: usize,
) -> Result<Applied, LoadError> {
    let config = ctx.config;
    let mut placeholder = Entity::new(&config.target);

    // first pass: resolve relations before anything else, as scalar
    // transforms may rely on the relation being attached
    for (key, value) in mapped {
        if is_empty_value(value) {
            continue;
        }
        if store
            .schema()
            .relation_target(&config.target, relation_root(key))
            .is_some()
        {
            resolve_relation(store, config, key, value, &mut placeholder, ctx.preview)?;
        }
    }

    // second pass: scalar fields
    for (key, value) in mapped {
        if is_empty_value(value) {
            continue;
        }
        if store
            .schema()
            .relation_target(&config.target, relation_root(key))
            .is_some()
        {
            continue;
        }
        if let Some(ColumnTarget::Routed(name)) = config.column_map.get(key) {
            if let Some(routine) = config.routines.get(name) {
                routine(&mut placeholder, key, value, mapped);
            }
            continue;
        }
        if !ctx.fields.contains(key) {
            continue;
        }
        match config.transforms.get(key).and_then(|s| s.callback.as_ref()) {
            Some(TransformCallback::Value(callback)) => {
                if let Some(replacement) = callback(value, &mut placeholder) {
                    placeholder.set(key, replacement);
                }
            }
            _ => placeholder.set(key, value.clone()),
        }
    }

    // locate an existing entity to merge into
    let existing = if placeholder.id().is_none() && !config.duplicate_checks.is_empty() {
        let snapshot: Record = placeholder.fields().clone();
        find_existing(store, config, &snapshot)
    } else {
        None
    };

    let (mut entity, is_update) = match existing {
        Some(mut found) => {
            found.clear_dirty();
            let populated: Vec<String> = placeholder.dirty_fields().map(str::to_string).collect();
            for field in populated {
                if let Some(value) = placeholder.get(&field) {
                    found.set(&field, value.clone());
                }
            }
            (found, true)
        }
        None => (placeholder, false),
    };

    if let Some(callback) = &config.record_callback {
        callback(&mut entity, mapped);
    }

    // save clears dirty tracking, so classify change before writing
    let changed = entity.is_changed();

    if !ctx.preview {
        match store.save(&mut entity) {
            Ok(_) => {}
            Err(StoreError::Validation(reason)) => return Ok(Applied::ValidationFailed(reason)),
            Err(other) => return Err(other.into()),
        }
    }

    let outcome = if is_update {
        if changed {
            Outcome::Updated(entity)
        } else {
            Outcome::Skipped {
                index,
                reason: "No data was changed.".into(),
            }
        }
    } else {
        Outcome::Created(entity)
    };
    Ok(Applied::Persisted(outcome))
}

/// Root name of a possibly dot-notated field path.
fn relation_root(key: &str) -> &str {
    key.split_once('.').map_or(key, |(root, _)| root)
}
