//! Header label -> canonical field mapping
//!
//! Three layers are merged, later layers winning when the same header label
//! appears twice:
//! 1. persisted, user-editable mappings (from a [`MappingSource`])
//! 2. the table's built-in defaults
//! 3. per-call overrides

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::MappingSource;

use super::types::{MappingEntry, TableSpec};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Canonical form of a header label: trimmed, inner whitespace runs collapsed
pub fn normalize_header(label: &str) -> String {
    WHITESPACE.replace_all(label.trim(), " ").into_owned()
}

/// Ordered, merged header mapping for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a header to a field. A header that is already mapped keeps its
    /// position and takes the new field.
    pub fn insert(&mut self, header: &str, field: &str) {
        let header = normalize_header(header);
        let field = field.trim();
        if header.is_empty() || field.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|e| e.header == header) {
            Some(entry) => entry.field = field.to_string(),
            None => self.entries.push(MappingEntry::new(header, field)),
        }
    }

    /// Field mapped to a header label, if any
    pub fn field_for(&self, header: &str) -> Option<&str> {
        let header = normalize_header(header);
        self.entries
            .iter()
            .find(|e| e.header == header)
            .map(|e| e.field.as_str())
    }

    /// All header labels mapping to a field, in mapping order
    pub fn headers_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.header.as_str())
    }

    /// Entries in mapping order
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose field is not a column of the table
    fn retain_known(&mut self, spec: &TableSpec) {
        self.entries.retain(|e| {
            let known = spec.has_column(&e.field);
            if !known {
                log::warn!(
                    "Ignoring mapping '{}' -> '{}': not a column of '{}'",
                    e.header,
                    e.field,
                    spec.name
                );
            }
            known
        });
    }
}

/// Merge the three mapping layers for a table
pub fn merge_mappings(
    spec: &TableSpec,
    persisted: &[(String, String)],
    overrides: &[MappingEntry],
) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();

    for (header, field) in persisted {
        mapping.insert(header, field);
    }
    for entry in &spec.builtin_mapping {
        mapping.insert(&entry.header, &entry.field);
    }
    for entry in overrides {
        mapping.insert(&entry.header, &entry.field);
    }

    mapping.retain_known(spec);
    mapping
}

/// Build the mapping for a run, reading the persisted layer from `source`.
///
/// A failing source is not fatal: the run continues with the built-in and
/// override layers only.
pub async fn resolve_mapping(
    source: &dyn MappingSource,
    spec: &TableSpec,
    overrides: &[MappingEntry],
) -> ColumnMapping {
    let persisted = match source.column_mappings(&spec.name).await {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!(
                "Column mappings for '{}' unavailable, using built-in defaults: {:#}",
                spec.name,
                e
            );
            Vec::new()
        }
    };

    let mapping = merge_mappings(spec, &persisted, overrides);
    log::debug!(
        "Resolved {} header mappings for '{}' ({} persisted, {} overrides)",
        mapping.len(),
        spec.name,
        persisted.len(),
        overrides.len()
    );
    mapping
}
