//! Column mapping.
//!
//! Renames incoming record keys to canonical target field names. Columns
//! routed to a named routine keep their original key, so several input
//! columns can share one routine while remaining individually addressable.

use indexmap::IndexMap;

use super::config::ColumnTarget;
use crate::source::Record;

/// Apply the column map to one record. Keys absent from the map pass
/// through unchanged. No side effects.
pub(crate) fn map_columns(record: &Record, column_map: &IndexMap<String, ColumnTarget>) -> Record {
    let mut mapped = Record::new();
    for (key, value) in record {
        let out_key = match column_map.get(key) {
            Some(ColumnTarget::Field(name)) => name.clone(),
            // routed columns stay addressable under their own key
            Some(ColumnTarget::Routed(_)) | None => key.clone(),
        };
        mapped.insert(out_key, value.clone());
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::record;

    fn column_map(pairs: &[(&str, &str)]) -> IndexMap<String, ColumnTarget> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ColumnTarget::parse(v)))
            .collect()
    }

    #[test]
    fn test_renames_mapped_keys() {
        let map = column_map(&[("Prenom", "FirstName")]);
        let mapped = map_columns(&record(&[("Prenom", "joe"), ("Surname", "Bloggs")]), &map);

        assert_eq!(mapped["FirstName"], "joe");
        assert_eq!(mapped["Surname"], "Bloggs");
        assert!(!mapped.contains_key("Prenom"));
    }

    #[test]
    fn test_routed_columns_keep_original_key() {
        let map = column_map(&[
            ("HomeEmail", "->importEmail"),
            ("WorkEmail", "->importEmail"),
        ]);
        let mapped = map_columns(
            &record(&[("HomeEmail", "a@x.test"), ("WorkEmail", "b@x.test")]),
            &map,
        );

        assert_eq!(mapped["HomeEmail"], "a@x.test");
        assert_eq!(mapped["WorkEmail"], "b@x.test");
    }

    #[test]
    fn test_relation_path_targets() {
        let map = column_map(&[("Course Title", "Course.Title")]);
        let mapped = map_columns(&record(&[("Course Title", "Math")]), &map);

        assert_eq!(mapped["Course.Title"], "Math");
    }
}
