//! Duplicate detection.
//!
//! Searches the configured duplicate checks in declaration order against a
//! candidate's field values and returns the first existing entity found.
//! Runs after the relation-resolution pass, so dot-notation checks match on
//! resolved foreign key columns rather than raw input values.

use super::config::{DuplicateCheck, LoaderConfig};
use crate::source::{is_empty_value, Record};
use crate::store::{Entity, Schema, Store};

/// Find an existing entity matching the candidate's field values, or `None`.
///
/// Must not mutate state. An empty check list means no duplicate detection:
/// every record is an insert.
pub(crate) fn find_existing(
    store: &dyn Store,
    config: &LoaderConfig,
    candidate: &Record,
) -> Option<Entity> {
    for check in &config.duplicate_checks {
        match check {
            DuplicateCheck::Field(name) => {
                let field = resolve_check_field(store.schema(), &config.target, name);
                match candidate.get(&field) {
                    Some(value) if !is_empty_value(value) => {
                        if let Some(existing) = store.query_first(&config.target, &field, value) {
                            return Some(existing);
                        }
                    }
                    // empty value: skip to the next check
                    _ => {}
                }
            }
            DuplicateCheck::Callback { field, callback } => {
                if let Some(existing) = callback(field, candidate, store) {
                    return Some(existing);
                }
            }
        }
    }
    None
}

/// Resolve a dot-notation check (`Relation.Column`) to the relation's
/// foreign key column; plain field names pass through.
fn resolve_check_field(schema: &Schema, target: &str, name: &str) -> String {
    if let Some((root, _)) = name.split_once('.') {
        if schema.relation_target(target, root).is_some() {
            return format!("{root}ID");
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::record;
    use crate::store::{MemStore, TypeDef};
    use serde_json::json;

    fn store() -> MemStore {
        let mut store = MemStore::new(
            crate::store::Schema::new()
                .define(TypeDef::new("Course").field("Title", "Title"))
                .define(
                    TypeDef::new("Student")
                        .field("FirstName", "First Name")
                        .field("Email", "Email")
                        .relation("Course", "Course"),
                ),
        );
        let mut student = Entity::new("Student");
        student.set("FirstName", json!("joe"));
        student.set("Email", json!("joe@x.test"));
        student.set("CourseID", json!(7));
        store.save(&mut student).unwrap();
        store
    }

    #[test]
    fn test_first_matching_check_wins() {
        let store = store();
        let config = LoaderConfig::builder("Student")
            .duplicate_check("Email")
            .duplicate_check("FirstName")
            .build()
            .unwrap();

        let found = find_existing(
            &store,
            &config,
            &record(&[("Email", "joe@x.test"), ("FirstName", "someone else")]),
        );
        assert_eq!(found.unwrap().get("FirstName"), Some(&json!("joe")));
    }

    #[test]
    fn test_empty_value_skips_to_next_check() {
        let store = store();
        let config = LoaderConfig::builder("Student")
            .duplicate_check("Email")
            .duplicate_check("FirstName")
            .build()
            .unwrap();

        let found = find_existing(
            &store,
            &config,
            &record(&[("Email", ""), ("FirstName", "joe")]),
        );
        assert!(found.is_some());
    }

    #[test]
    fn test_no_checks_means_no_match() {
        let store = store();
        let config = LoaderConfig::builder("Student").build().unwrap();
        assert!(find_existing(&store, &config, &record(&[("Email", "joe@x.test")])).is_none());
    }

    #[test]
    fn test_dot_notation_matches_on_foreign_key() {
        let store = store();
        let config = LoaderConfig::builder("Student")
            .duplicate_check("Course.Title")
            .build()
            .unwrap();

        let mut candidate = Record::new();
        candidate.insert("CourseID".into(), json!(7));
        assert!(find_existing(&store, &config, &candidate).is_some());

        let mut other = Record::new();
        other.insert("CourseID".into(), json!(8));
        assert!(find_existing(&store, &config, &other).is_none());
    }

    #[test]
    fn test_callback_check_is_trusted_verbatim() {
        let store = store();
        let config = LoaderConfig::builder("Student")
            .duplicate_check_callback("FirstName", |field, candidate, store| {
                let value = candidate.get(field)?;
                store.query_first("Student", "FirstName", value)
            })
            .build()
            .unwrap();

        assert!(find_existing(&store, &config, &record(&[("FirstName", "joe")])).is_some());
        assert!(find_existing(&store, &config, &record(&[("FirstName", "jane")])).is_none());
    }
}
