//! Row classification and minimal patch construction.
//!
//! Inserts carry the content fingerprint; update patches hold the key and
//! the changed fields only.

use std::collections::BTreeSet;

use super::fetch::ExistingRecords;
use super::fingerprint::content_fingerprint;
use super::normalize::{NormalizedRow, NormalizedUpload};
use super::types::{CellValue, Record, RowClassification, TableSpec};

/// Classify one row against its persisted counterpart (if any)
pub fn classify_row(
    spec: &TableSpec,
    row: &NormalizedRow,
    existing: Option<&Record>,
    upload_columns: &BTreeSet<String>,
) -> RowClassification {
    let Some(existing) = existing else {
        let fingerprint = content_fingerprint(&row.record, upload_columns);
        let mut record = row.record.clone();
        spec.apply_fallbacks(&row.key, &mut record);
        if let Some(field) = &spec.fingerprint_field {
            record.insert(field.clone(), CellValue::String(fingerprint.clone()));
        }
        log::debug!("Row {}: '{}' not persisted, insert", row.row_number, row.key);
        return RowClassification::Insert {
            key: row.key.clone(),
            record,
            fingerprint,
        };
    };

    let mut patch = diff_fields(spec, &row.key, &row.record, existing, upload_columns);
    if patch.is_empty() {
        log::debug!("Row {}: '{}' unchanged, skip", row.row_number, row.key);
        return RowClassification::Skip {
            key: row.key.clone(),
        };
    }

    log::debug!(
        "Row {}: '{}' changed ({}), update",
        row.row_number,
        row.key,
        patch.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    patch.insert(spec.key_field.clone(), CellValue::String(row.key.clone()));

    RowClassification::Update {
        key: row.key.clone(),
        patch,
    }
}

/// Fields of `incoming` that differ from `existing`, restricted to the upload
/// columns. The key and fingerprint fields are never part of the result, and
/// neither is a field `incoming` does not carry.
///
/// Both sides are normalized before comparing, so blank, whitespace-only,
/// NaN and missing persisted values all count as null. A required field is never set
/// to null: the persisted value stays, or the fallback is written when the
/// persisted value is itself null.
pub fn diff_fields(
    spec: &TableSpec,
    key: &str,
    incoming: &Record,
    existing: &Record,
    upload_columns: &BTreeSet<String>,
) -> Record {
    let mut patch = Record::new();

    for field in upload_columns {
        if *field == spec.key_field || spec.fingerprint_field.as_deref() == Some(field.as_str()) {
            continue;
        }
        // This row had no such header
        let Some(new_value) = incoming.get(field) else {
            continue;
        };

        let new_value = new_value.normalized();
        let old_value = normalized(existing.get(field));

        if new_value == old_value {
            continue;
        }

        if new_value.is_null() && spec.is_required(field) {
            match spec.required_field(field) {
                Some(rule) if old_value.is_null() => {
                    patch.insert(field.clone(), rule.default_for(key));
                }
                _ => {
                    log::debug!("'{}': keeping required field '{}' ({})", key, field, old_value);
                }
            }
            continue;
        }

        patch.insert(field.clone(), new_value);
    }

    patch
}

fn normalized(value: Option<&CellValue>) -> CellValue {
    value.map(|v| v.normalized()).unwrap_or(CellValue::Null)
}

/// Classify every normalized row, in upload order
pub fn classify_all(
    spec: &TableSpec,
    upload: &NormalizedUpload,
    existing: &ExistingRecords,
) -> Vec<RowClassification> {
    let classifications: Vec<RowClassification> = upload
        .rows
        .iter()
        .map(|row| classify_row(spec, row, existing.get(&row.key), &upload.upload_columns))
        .collect();

    log::info!(
        "Diff complete for '{}': {} insert, {} update, {} unchanged",
        spec.name,
        classifications.iter().filter(|c| c.is_insert()).count(),
        classifications.iter().filter(|c| c.is_update()).count(),
        classifications.iter().filter(|c| c.is_skip()).count()
    );

    classifications
}
