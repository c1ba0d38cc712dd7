//! Bulk loading orchestration.
//!
//! [`BulkLoader`] drives a [`RecordSource`] through per-record processing
//! against a [`Store`], accumulating a [`LoadResult`]. [`ListLoader`] scopes
//! a loader to a named membership list: every imported entity joins the list
//! and the delete-existing step removes only that list's members.
//!
//! Records are processed strictly in source order; relation and duplicate
//! lookups may depend on entities written by earlier records of the same run.

pub mod config;

mod duplicates;
mod mapper;
mod process;
mod relation;

use indexmap::{IndexMap, IndexSet};

use self::config::{ColumnTarget, LoaderConfig};
use self::process::{process_record, Outcome, RecordContext};
use crate::error::{ConfigError, LoadError};
use crate::result::LoadResult;
use crate::source::RecordSource;
use crate::store::{Schema, Store};

// =============================================================================
// BulkLoader
// =============================================================================

/// Imports records from a source into a store.
///
/// Configuration is frozen at construction; the only entry points are
/// [`load`](Self::load) and its dry-run twin [`preview`](Self::preview).
pub struct BulkLoader {
    config: LoaderConfig,
    source: Option<Box<dyn RecordSource>>,
}

impl BulkLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            source: None,
        }
    }

    /// Attach the record source.
    pub fn with_source(mut self, source: impl RecordSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn set_source(&mut self, source: impl RecordSource + 'static) {
        self.source = Some(Box::new(source));
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Import every record from the source.
    pub fn load(&self, store: &mut dyn Store) -> Result<LoadResult, LoadError> {
        self.run(store, false, None)
    }

    /// Dry run: performs every processing step except writes, so the
    /// returned result shows what a real load would do.
    pub fn preview(&self, store: &mut dyn Store) -> Result<LoadResult, LoadError> {
        self.run(store, true, None)
    }

    /// Field-path to label mapping of everything input data can be mapped
    /// into. Consumed by UIs offering column mapping choices.
    pub fn mappable_columns(&self, schema: &Schema) -> IndexMap<String, String> {
        scaffold_mappable_columns(&self.config, schema)
    }

    fn run(
        &self,
        store: &mut dyn Store,
        preview: bool,
        scope: Option<&str>,
    ) -> Result<LoadResult, LoadError> {
        if store.schema().type_def(&self.config.target).is_none() {
            return Err(ConfigError::UnknownTarget(self.config.target.clone()).into());
        }
        if let Some(list) = scope {
            if store.list_target(list)? != self.config.target {
                return Err(ConfigError::ListMismatch {
                    list: list.to_string(),
                    target: self.config.target.clone(),
                }
                .into());
            }
        }
        let source = self.source.as_ref().ok_or(ConfigError::MissingSource)?;

        let mut result = LoadResult::new();
        if self.config.delete_existing && !preview {
            let deleted = match scope {
                Some(list) => store.delete_list_members(list)?,
                None => store.delete_all(&self.config.target),
            };
            log::info!("deleted {deleted} existing '{}' records", self.config.target);
            result.set_deleted(deleted);
        }

        // computed once per run, reused for every record
        let fields = eligible_fields(&self.config, store.schema());
        let ctx = RecordContext {
            config: &self.config,
            fields: &fields,
            preview,
        };

        for (index, raw) in source.open()?.enumerate() {
            match process_record(&ctx, store, &raw, index)? {
                Outcome::Created(entity) => {
                    if !preview {
                        if let (Some(list), Some(id)) = (scope, entity.id()) {
                            store.add_to_list(list, id)?;
                        }
                    }
                    result.add_created(entity);
                }
                Outcome::Updated(entity) => {
                    if !preview {
                        if let (Some(list), Some(id)) = (scope, entity.id()) {
                            store.add_to_list(list, id)?;
                        }
                    }
                    result.add_updated(entity);
                }
                Outcome::Skipped { index, reason } => {
                    log::debug!("record {index} skipped: {reason}");
                    result.add_skipped(Some(index), reason);
                }
            }
        }

        log::info!(
            "load of '{}' finished: {} created, {} updated, {} skipped",
            self.config.target,
            result.created_count(),
            result.updated_count(),
            result.skipped_count()
        );
        Ok(result)
    }
}

// =============================================================================
// ListLoader
// =============================================================================

/// A loader scoped to a named membership list.
///
/// Every created or updated entity is added to the list after persistence,
/// and delete-existing removes the list's current members instead of the
/// whole backing collection.
pub struct ListLoader {
    loader: BulkLoader,
    list: String,
}

impl ListLoader {
    pub fn new(config: LoaderConfig, list: impl Into<String>) -> Self {
        Self {
            loader: BulkLoader::new(config),
            list: list.into(),
        }
    }

    pub fn with_source(mut self, source: impl RecordSource + 'static) -> Self {
        self.loader.set_source(source);
        self
    }

    pub fn list(&self) -> &str {
        &self.list
    }

    pub fn load(&self, store: &mut dyn Store) -> Result<LoadResult, LoadError> {
        self.loader.run(store, false, Some(&self.list))
    }

    pub fn preview(&self, store: &mut dyn Store) -> Result<LoadResult, LoadError> {
        self.loader.run(store, true, Some(&self.list))
    }

    pub fn mappable_columns(&self, schema: &Schema) -> IndexMap<String, String> {
        self.loader.mappable_columns(schema)
    }
}

// =============================================================================
// Mappable-field scaffolding
// =============================================================================

/// Build the field-path to label mapping data can be mapped into.
///
/// An explicit configured mapping wins outright. Otherwise: the target
/// type's own fields, then each has-one relation's fields under
/// `Relation.Field` keys, then any transform-spec field not already present
/// (so manually configured virtual fields remain mappable). Each block is
/// sorted case-insensitively by label.
pub(crate) fn scaffold_mappable_columns(
    config: &LoaderConfig,
    schema: &Schema,
) -> IndexMap<String, String> {
    if let Some(explicit) = &config.mappable_override {
        return explicit.clone();
    }

    let mut map = IndexMap::new();
    for (field, label) in sorted_field_labels(schema, &config.target) {
        map.insert(field, label);
    }
    if let Some(def) = schema.type_def(&config.target) {
        for relation in &def.relations {
            for (field, label) in sorted_field_labels(schema, &relation.target) {
                map.insert(
                    format!("{}.{}", relation.name, field),
                    format!("{}: {}", relation.name, label),
                );
            }
        }
    }
    for field in config.transforms.keys() {
        if !map.contains_key(field) {
            map.insert(field.clone(), field.clone());
        }
    }
    map
}

fn sorted_field_labels(schema: &Schema, type_name: &str) -> Vec<(String, String)> {
    let mut fields = schema.field_labels(type_name);
    fields.sort_by(|a, b| a.1.to_lowercase().cmp(&b.1.to_lowercase()));
    fields
}

/// Fields eligible for the transform pass: every mappable field path plus
/// the original keys of routed columns.
pub(crate) fn eligible_fields(config: &LoaderConfig, schema: &Schema) -> IndexSet<String> {
    let mut fields: IndexSet<String> = scaffold_mappable_columns(config, schema)
        .into_keys()
        .collect();
    for (column, target) in &config.column_map {
        if matches!(target, ColumnTarget::Routed(_)) {
            fields.insert(column.clone());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::config::TransformSpec;
    use super::*;
    use crate::source::{record, ArraySource, Record};
    use crate::store::{Entity, MemStore, TypeDef};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .define(TypeDef::new("Course").field("Title", "Title"))
            .define(
                TypeDef::new("Student")
                    .field("FirstName", "First Name")
                    .field("Surname", "Surname")
                    .field("Email", "Email")
                    .relation("Course", "Course"),
            )
    }

    fn store() -> MemStore {
        MemStore::new(schema())
    }

    fn student_rows() -> Vec<Record> {
        vec![
            record(&[("FirstName", "joe"), ("Email", "joe@x.test")]),
            record(&[("FirstName", "jane"), ("Email", "jane@x.test")]),
            record(&[("FirstName", "jim"), ("Email", "jim@x.test")]),
        ]
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let mut store = store();
        let loader = BulkLoader::new(LoaderConfig::builder("Student").build().unwrap());
        assert!(matches!(
            loader.load(&mut store),
            Err(LoadError::Config(ConfigError::MissingSource))
        ));
    }

    #[test]
    fn test_unknown_target_is_fatal() {
        let mut store = store();
        let loader = BulkLoader::new(LoaderConfig::builder("Teacher").build().unwrap())
            .with_source(ArraySource::new(student_rows()));
        assert!(matches!(
            loader.load(&mut store),
            Err(LoadError::Config(ConfigError::UnknownTarget(_)))
        ));
    }

    #[test]
    fn test_second_run_with_duplicate_checks_is_idempotent() {
        let mut store = store();
        let make_loader = || {
            BulkLoader::new(
                LoaderConfig::builder("Student")
                    .duplicate_check("Email")
                    .create_relations(false)
                    .build()
                    .unwrap(),
            )
            .with_source(ArraySource::new(student_rows()))
        };

        let first = make_loader().load(&mut store).unwrap();
        assert_eq!(first.created_count(), 3);

        let second = make_loader().load(&mut store).unwrap();
        assert_eq!(second.created_count(), 0);
        assert_eq!(second.updated_count() + second.skipped_count(), 3);
        assert_eq!(store.count("Student"), 3);
        for skip in second.skipped() {
            assert_eq!(skip.reason, "No data was changed.");
        }
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_bucket() {
        let mut store = store();
        let rows = vec![
            record(&[("FirstName", "joe")]),
            Record::new(),
            record(&[("FirstName", "")]),
            record(&[("FirstName", "jane")]),
        ];
        let total = rows.len();
        let loader = BulkLoader::new(LoaderConfig::builder("Student").build().unwrap())
            .with_source(ArraySource::new(rows));

        let result = loader.load(&mut store).unwrap();
        assert_eq!(
            result.created_count() + result.updated_count() + result.skipped_count(),
            total
        );
    }

    fn linked_count(store: &MemStore) -> usize {
        store
            .all("Student")
            .iter()
            .filter(|s| s.get("CourseID").is_some())
            .count()
    }

    #[test]
    fn test_relation_link_create_matrix() {
        let rows = || {
            vec![
                record(&[("FirstName", "joe"), ("Course.Title", "Math")]),
                record(&[("FirstName", "jane"), ("Course.Title", "Biology")]),
                record(&[("FirstName", "jim"), ("Course.Title", "Chemistry")]),
            ]
        };
        // (link, create, students linked, courses in store)
        let cases = [
            (true, true, 3, 3),
            (false, false, 0, 1),
            (true, false, 1, 1),
            (false, true, 2, 3),
        ];

        for (link, create, expect_linked, expect_courses) in cases {
            let mut store = store();
            let mut math = Entity::new("Course");
            math.set("Title", json!("Math"));
            store.save(&mut math).unwrap();

            let loader = BulkLoader::new(
                LoaderConfig::builder("Student")
                    .link_relations(link)
                    .create_relations(create)
                    .build()
                    .unwrap(),
            )
            .with_source(ArraySource::new(rows()));

            let result = loader.load(&mut store).unwrap();
            assert_eq!(result.created_count(), 3, "link={link} create={create}");
            assert_eq!(
                linked_count(&store),
                expect_linked,
                "link={link} create={create}"
            );
            assert_eq!(
                store.count("Course"),
                expect_courses,
                "link={link} create={create}"
            );
        }
    }

    #[test]
    fn test_tracked_relation_list_stays_duplicate_free_across_runs() {
        let mut store = store();
        store.define_list("Offered", "Course");
        let rows = || {
            vec![
                record(&[("FirstName", "a"), ("Course.Title", "Math")]),
                record(&[("FirstName", "b"), ("Course.Title", "Biology")]),
                record(&[("FirstName", "c"), ("Course.Title", "Chemistry")]),
            ]
        };
        let make_loader = || {
            BulkLoader::new(
                LoaderConfig::builder("Student")
                    .transform("Course.Title", TransformSpec::new().list("Offered"))
                    .build()
                    .unwrap(),
            )
            .with_source(ArraySource::new(rows()))
        };

        make_loader().load(&mut store).unwrap();
        make_loader().load(&mut store).unwrap();
        assert_eq!(store.list_members("Offered").unwrap().len(), 3);
        assert_eq!(store.count("Course"), 3);
    }

    #[test]
    fn test_delete_existing_reports_count() {
        let mut store = store();
        for _ in 0..2 {
            let mut old = Entity::new("Student");
            old.set("FirstName", json!("stale"));
            store.save(&mut old).unwrap();
        }

        let loader = BulkLoader::new(
            LoaderConfig::builder("Student")
                .delete_existing(true)
                .build()
                .unwrap(),
        )
        .with_source(ArraySource::new(student_rows()));

        let result = loader.load(&mut store).unwrap();
        assert_eq!(result.deleted_count(), 2);
        assert_eq!(result.created_count(), 3);
        assert_eq!(store.count("Student"), 3);
    }

    #[test]
    fn test_preview_touches_nothing() {
        let mut store = store();
        let mut old = Entity::new("Student");
        old.set("FirstName", json!("stale"));
        store.save(&mut old).unwrap();

        let loader = BulkLoader::new(
            LoaderConfig::builder("Student")
                .delete_existing(true)
                .build()
                .unwrap(),
        )
        .with_source(ArraySource::new(vec![record(&[
            ("FirstName", "joe"),
            ("Course.Title", "Math"),
        ])]));

        let result = loader.preview(&mut store).unwrap();
        assert_eq!(result.created_count(), 1);
        assert_eq!(result.deleted_count(), 0);
        assert_eq!(store.count("Student"), 1);
        assert_eq!(store.count("Course"), 0);
    }

    #[test]
    fn test_list_loader_attaches_and_deletes_within_scope() {
        let mut store = store();
        store.define_list("ClassOf2026", "Student");

        // one stale member and one unrelated student
        let mut member = Entity::new("Student");
        member.set("FirstName", json!("stale"));
        let member_id = store.save(&mut member).unwrap();
        store.add_to_list("ClassOf2026", member_id).unwrap();
        let mut outsider = Entity::new("Student");
        outsider.set("FirstName", json!("outsider"));
        store.save(&mut outsider).unwrap();

        let loader = ListLoader::new(
            LoaderConfig::builder("Student")
                .delete_existing(true)
                .build()
                .unwrap(),
            "ClassOf2026",
        )
        .with_source(ArraySource::new(student_rows()));

        let result = loader.load(&mut store).unwrap();
        assert_eq!(result.deleted_count(), 1);
        assert_eq!(result.created_count(), 3);
        assert_eq!(store.list_members("ClassOf2026").unwrap().len(), 3);
        // the unrelated student survives a scoped delete
        assert_eq!(store.count("Student"), 4);
    }

    #[test]
    fn test_list_loader_rejects_mismatched_list() {
        let mut store = store();
        store.define_list("Offered", "Course");
        let loader = ListLoader::new(
            LoaderConfig::builder("Student").build().unwrap(),
            "Offered",
        )
        .with_source(ArraySource::new(student_rows()));

        assert!(matches!(
            loader.load(&mut store),
            Err(LoadError::Config(ConfigError::ListMismatch { .. }))
        ));
    }

    #[test]
    fn test_mappable_columns_scaffold() {
        let config = LoaderConfig::builder("Student")
            .transform("NickName", TransformSpec::new())
            .build()
            .unwrap();
        let loader = BulkLoader::new(config);
        let columns = loader.mappable_columns(&schema());

        let keys: Vec<&String> = columns.keys().collect();
        assert_eq!(
            keys,
            ["Email", "FirstName", "Surname", "Course.Title", "NickName"]
        );
        assert_eq!(columns["FirstName"], "First Name");
        assert_eq!(columns["Course.Title"], "Course: Title");
        // virtual field labelled by its own key, verbatim
        assert_eq!(columns["NickName"], "NickName");
    }

    #[test]
    fn test_explicit_mappable_columns_win() {
        let mut explicit = IndexMap::new();
        explicit.insert("Surname".to_string(), "Family name".to_string());
        let config = LoaderConfig::builder("Student")
            .mappable_columns(explicit)
            .build()
            .unwrap();
        let loader = BulkLoader::new(config);

        let columns = loader.mappable_columns(&schema());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns["Surname"], "Family name");
    }
}
