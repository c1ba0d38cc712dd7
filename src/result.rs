//! Result accumulation for a bulk load run.
//!
//! A [`LoadResult`] is created once per `load()` call, mutated only while
//! that call iterates the source, and returned to the caller. Every processed
//! record lands in exactly one of created / updated / skipped.

use serde::Serialize;

use crate::store::Entity;

/// A record that was not imported, with the reason why.
#[derive(Debug, Clone, Serialize)]
pub struct Skipped {
    /// Index of the originating record in source order, when known.
    pub index: Option<usize>,
    pub reason: String,
}

/// Overall tone of the result, for user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Good,
    Warning,
    Bad,
}

/// Accumulated outcome of one load run.
#[derive(Debug, Default, Serialize)]
pub struct LoadResult {
    created: Vec<Entity>,
    updated: Vec<Entity>,
    skipped: Vec<Skipped>,
    deleted: usize,
}

impl LoadResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_created(&mut self, entity: Entity) {
        self.created.push(entity);
    }

    pub(crate) fn add_updated(&mut self, entity: Entity) {
        self.updated.push(entity);
    }

    pub(crate) fn add_skipped(&mut self, index: Option<usize>, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            index,
            reason: reason.into(),
        });
    }

    pub(crate) fn set_deleted(&mut self, count: usize) {
        self.deleted = count;
    }

    /// Entities created during the run.
    pub fn created(&self) -> &[Entity] {
        &self.created
    }

    /// Entities updated during the run.
    pub fn updated(&self) -> &[Entity] {
        &self.updated
    }

    /// Records skipped during the run, with reasons.
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of entities removed by the delete-existing step.
    pub fn deleted_count(&self) -> usize {
        self.deleted
    }

    /// Number of records that made it into the store.
    pub fn total_count(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    /// Ordered human-readable messages describing the result.
    ///
    /// Zero-valued categories are omitted. When nothing was created or
    /// updated, a "Nothing to import" message is appended even if records
    /// were skipped.
    pub fn message_list(&self) -> Vec<String> {
        let mut output = Vec::new();
        if self.created_count() > 0 {
            output.push(format!("Imported {} new records.", self.created_count()));
        }
        if self.updated_count() > 0 {
            output.push(format!("Updated {} records.", self.updated_count()));
        }
        if self.deleted_count() > 0 {
            output.push(format!("Deleted {} records.", self.deleted_count()));
        }
        if self.skipped_count() > 0 {
            output.push(format!("Skipped {} bad records.", self.skipped_count()));
        }
        if self.created_count() == 0 && self.updated_count() == 0 {
            output.push("Nothing to import".to_string());
        }
        output
    }

    /// Newline-joined summary message.
    pub fn message(&self) -> String {
        self.message_list().join("\n")
    }

    /// Classify the run as good, warning or bad.
    pub fn message_type(&self) -> MessageType {
        let mut message_type = MessageType::Bad;
        if self.total_count() > 0 {
            message_type = MessageType::Good;
        }
        if self.skipped_count() > 0 {
            message_type = MessageType::Warning;
        }
        message_type
    }
}
