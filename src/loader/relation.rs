//! Relation resolution.
//!
//! Given a dot-notation relation field (`Relation.Column`), locate or build
//! the related entity, apply the link/create policy, and attach its identity
//! to the placeholder's foreign key column. Resolution failure is never a
//! record failure; the foreign key is simply left unset.

use serde_json::{json, Value};

use super::config::{LoaderConfig, TransformCallback};
use crate::error::{StoreError, StoreResult};
use crate::store::{Entity, Store};

/// A resolved relation: the relation name paired with the related entity.
pub(crate) struct ResolvedRelation {
    pub relation: String,
    pub entity: Entity,
}

/// Resolve one relation field on the placeholder.
///
/// Only called for fields whose root name matches a declared relation on the
/// target type. Returns the handle for diagnostics; `Ok(None)` means the
/// foreign key stays unset.
pub(crate) fn resolve_relation(
    store: &mut dyn Store,
    config: &LoaderConfig,
    field_path: &str,
    value: &Value,
    placeholder: &mut Entity,
    preview: bool,
) -> StoreResult<Option<ResolvedRelation>> {
    let (relation, column) = match field_path.split_once('.') {
        Some((relation, column)) => (relation, Some(column)),
        None => (field_path, None),
    };
    let target = match store.schema().relation_target(&config.target, relation) {
        Some(target) => target.to_string(),
        None => return Ok(None),
    };
    let spec = config.transforms.get(field_path);
    let foreign_key = format!("{relation}ID");

    // An earlier column in the same record may already have attached the
    // relation; reuse it and just update the addressed column.
    let mut candidate = placeholder
        .get(&foreign_key)
        .and_then(Value::as_u64)
        .and_then(|id| store.get(&target, id));
    if let (Some(attached), Some(column)) = (&mut candidate, column) {
        attached.set(column, value.clone());
    }

    if candidate.is_none() {
        if let Some(TransformCallback::Relation(lookup)) = spec.and_then(|s| s.callback.as_ref()) {
            candidate = lookup(value, placeholder, store);
            if let (Some(found), Some(column)) = (&mut candidate, column) {
                found.set(column, value.clone());
            }
        } else if let Some(column) = column {
            candidate = store.query_first(&target, column, value);
            if candidate.is_none() {
                let mut built = Entity::new(&target);
                built.set(column, value.clone());
                candidate = Some(built);
            }
        }
    }

    let mut candidate = match candidate {
        Some(candidate) => candidate,
        None => return Ok(None),
    };

    let link = config.effective_link(spec);
    let create = config.effective_create(spec);

    if candidate.is_saved() {
        if !link {
            return Ok(None);
        }
        if candidate.is_changed() && !preview {
            match store.save(&mut candidate) {
                Ok(_) => {}
                Err(StoreError::Validation(reason)) => {
                    log::debug!("relation '{relation}' update rejected: {reason}");
                    return Ok(None);
                }
                Err(other) => return Err(other),
            }
        }
    } else {
        if !create || preview {
            return Ok(None);
        }
        match store.save(&mut candidate) {
            Ok(_) => {}
            Err(StoreError::Validation(reason)) => {
                log::debug!("relation '{relation}' rejected: {reason}");
                return Ok(None);
            }
            Err(other) => return Err(other),
        }
    }

    if let Some(list) = spec.and_then(|s| s.list.as_ref()) {
        if !preview {
            if let Some(id) = candidate.id() {
                if !store.list_contains(list, id) {
                    store.add_to_list(list, id)?;
                }
            }
        }
    }

    let id = match candidate.id() {
        Some(id) => id,
        None => return Ok(None),
    };
    placeholder.set(&foreign_key, json!(id));

    Ok(Some(ResolvedRelation {
        relation: relation.to_string(),
        entity: candidate,
    }))
}
