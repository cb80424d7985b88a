//! Raw upload rows -> keyed canonical records
//!
//! The first row carrying a key wins; later duplicates and keyless rows are
//! reported and dropped. A field belongs to the upload column set as soon as
//! its header appears in any row, even with a blank cell.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};

use super::mapping::{ColumnMapping, normalize_header};
use super::types::{CellValue, RawRow, Record, RowError, RowErrorKind, TableSpec};

/// Largest serial Excel can display (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// A row that survived normalization
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// 1-based position in the upload
    pub row_number: usize,
    /// Trimmed natural key
    pub key: String,
    /// Canonical record, key field included
    pub record: Record,
}

/// Output of the normalizer
#[derive(Debug, Clone, Default)]
pub struct NormalizedUpload {
    /// Surviving rows in upload order, unique by key
    pub rows: Vec<NormalizedRow>,
    /// Canonical fields whose header was present in the upload
    pub upload_columns: BTreeSet<String>,
    /// Rows dropped (blank, keyless or duplicate)
    pub skipped: usize,
    /// One entry per keyless or duplicate row
    pub errors: Vec<RowError>,
}

impl NormalizedUpload {
    /// Keys of the surviving rows, in upload order
    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }
}

/// Normalize an upload against the merged mapping
pub fn normalize_rows(rows: &[RawRow], mapping: &ColumnMapping, spec: &TableSpec) -> NormalizedUpload {
    let mut upload = NormalizedUpload::default();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let cells: HashMap<String, &CellValue> = row
            .iter()
            .map(|(header, value)| (normalize_header(header), value))
            .collect();

        for header in cells.keys() {
            if let Some(field) = mapping.field_for(header) {
                upload.upload_columns.insert(field.to_string());
            }
        }

        let key = mapping
            .headers_for(&spec.key_field)
            .filter_map(|header| cells.get(header))
            .find_map(|value| value.as_key());

        let Some(key) = key else {
            upload.skipped += 1;
            if row.is_blank() {
                log::debug!("Row {}: blank, skipping", row_number);
            } else {
                log::debug!("Row {}: no value for key '{}', skipping", row_number, spec.key_field);
                upload.errors.push(
                    RowError::new(
                        RowErrorKind::KeyMissing,
                        format!("row {}", row_number),
                        format!("no value for key field '{}'", spec.key_field),
                    )
                    .with_column(spec.key_field.clone()),
                );
            }
            continue;
        };

        if let Some(first) = first_seen.get(&key) {
            log::debug!(
                "Row {}: key '{}' already seen in row {}, skipping",
                row_number,
                key,
                first
            );
            upload.skipped += 1;
            upload.errors.push(RowError::new(
                RowErrorKind::DuplicateKey,
                key.clone(),
                format!("duplicate of row {} in this upload, ignored", first),
            ));
            continue;
        }
        first_seen.insert(key.clone(), row_number);

        let mut record = Record::new();
        for entry in mapping.entries() {
            // Later entries overwrite earlier ones targeting the same field
            if let Some(value) = cells.get(&entry.header) {
                record.insert(entry.field.clone(), coerce_cell(spec, &entry.field, value));
            }
        }
        record.insert(spec.key_field.clone(), CellValue::String(key.clone()));

        upload.rows.push(NormalizedRow {
            row_number,
            key,
            record,
        });
    }

    log::info!(
        "Normalized {} rows for '{}': {} kept, {} skipped, {} upload columns",
        rows.len(),
        spec.name,
        upload.rows.len(),
        upload.skipped,
        upload.upload_columns.len()
    );

    upload
}

/// Coerce one uploaded cell for a field
pub fn coerce_cell(spec: &TableSpec, field: &str, value: &CellValue) -> CellValue {
    if value.is_blank() {
        return CellValue::Null;
    }
    if !spec.is_date_field(field) {
        return value.clone();
    }
    match value {
        CellValue::String(s) => CellValue::String(s.trim().to_string()),
        CellValue::Number(serial) => excel_serial_to_date(*serial)
            .map(|d| CellValue::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let day = serial.trunc() as i64;
    // Excel counts a 1900-02-29 that never existed as day 60
    let epoch = match day {
        60 => return None,
        ..60 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_signed(Duration::days(day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mapping::merge_mappings;
    use crate::sync::types::{ColumnKind, ColumnSpec, MappingEntry};

    fn spec() -> TableSpec {
        TableSpec {
            name: "materials".to_string(),
            key_field: "material_number".to_string(),
            columns: vec![
                ColumnSpec::new("material_number", ColumnKind::Text),
                ColumnSpec::new("material_name", ColumnKind::Text),
                ColumnSpec::new("cas_no", ColumnKind::Text),
                ColumnSpec::new("registered_on", ColumnKind::Date),
            ],
            builtin_mapping: vec![
                MappingEntry::new("자재번호", "material_number"),
                MappingEntry::new("Material No", "material_number"),
                MappingEntry::new("자재명", "material_name"),
                MappingEntry::new("Name", "material_name"),
                MappingEntry::new("CAS", "cas_no"),
                MappingEntry::new("등록일", "registered_on"),
            ],
            required: vec![],
            fingerprint_field: None,
        }
    }

    fn normalize(rows: &[RawRow]) -> NormalizedUpload {
        let spec = spec();
        let mapping = merge_mappings(&spec, &[], &[]);
        normalize_rows(rows, &mapping, &spec)
    }

    #[test]
    fn test_blank_cell_is_null_and_column_present() {
        let rows = vec![RawRow::new().with("자재번호", "M-1").with("CAS", "")];
        let upload = normalize(&rows);

        assert_eq!(upload.rows.len(), 1);
        assert_eq!(upload.rows[0].record["cas_no"], CellValue::Null);
        assert!(upload.upload_columns.contains("cas_no"));
        assert!(!upload.upload_columns.contains("material_name"));
        assert!(!upload.rows[0].record.contains_key("material_name"));
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let rows = vec![
            RawRow::new().with("자재번호", "M-1").with("자재명", "Oil A"),
            RawRow::new().with("자재번호", " M-1 ").with("자재명", "Oil A dup"),
        ];
        let upload = normalize(&rows);

        assert_eq!(upload.rows.len(), 1);
        assert_eq!(upload.rows[0].record["material_name"], CellValue::from("Oil A"));
        assert_eq!(upload.skipped, 1);
        assert_eq!(upload.errors.len(), 1);
        assert_eq!(upload.errors[0].kind, RowErrorKind::DuplicateKey);
        assert_eq!(upload.errors[0].key, "M-1");
    }

    #[test]
    fn test_key_from_first_non_blank_header() {
        let rows = vec![
            RawRow::new()
                .with("자재번호", "  ")
                .with("Material No", "M-7"),
        ];
        let upload = normalize(&rows);
        assert_eq!(upload.rows[0].key, "M-7");
        assert_eq!(upload.rows[0].record["material_number"], CellValue::from("M-7"));
    }

    #[test]
    fn test_missing_key_dropped() {
        let rows = vec![
            RawRow::new().with("자재명", "No key"),
            RawRow::new().with("자재번호", "").with("자재명", ""),
        ];
        let upload = normalize(&rows);

        assert!(upload.rows.is_empty());
        assert_eq!(upload.skipped, 2);
        // The fully blank row is not reported
        assert_eq!(upload.errors.len(), 1);
        assert_eq!(upload.errors[0].kind, RowErrorKind::KeyMissing);
        assert_eq!(upload.errors[0].key, "row 1");
    }

    #[test]
    fn test_later_mapping_entry_wins() {
        let rows = vec![
            RawRow::new()
                .with("자재번호", "M-1")
                .with("자재명", "first")
                .with("Name", "second"),
        ];
        let upload = normalize(&rows);
        assert_eq!(upload.rows[0].record["material_name"], CellValue::from("second"));
    }

    #[test]
    fn test_date_coercion() {
        let rows = vec![
            RawRow::new().with("자재번호", "M-1").with("등록일", " 2024-03-01 "),
            RawRow::new().with("자재번호", "M-2").with("등록일", 45352.0),
            RawRow::new().with("자재번호", "M-3").with("등록일", "   "),
        ];
        let upload = normalize(&rows);

        assert_eq!(upload.rows[0].record["registered_on"], CellValue::from("2024-03-01"));
        assert_eq!(upload.rows[1].record["registered_on"], CellValue::from("2024-03-01"));
        assert_eq!(upload.rows[2].record["registered_on"], CellValue::Null);
    }

    #[test]
    fn test_excel_serials_around_1900_leap_day() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);

        assert_eq!(excel_serial_to_date(1.0), date(1900, 1, 1));
        assert_eq!(excel_serial_to_date(59.0), date(1900, 2, 28));
        assert_eq!(excel_serial_to_date(60.0), None);
        assert_eq!(excel_serial_to_date(60.5), None);
        assert_eq!(excel_serial_to_date(61.0), date(1900, 3, 1));
        assert_eq!(excel_serial_to_date(45352.75), date(2024, 3, 1));
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_numeric_key() {
        let rows = vec![RawRow::new().with("자재번호", 1001.0)];
        let upload = normalize(&rows);
        assert_eq!(upload.keys(), vec!["1001".to_string()]);
    }

    #[test]
    fn test_header_whitespace_tolerated() {
        let rows = vec![RawRow::new().with(" 자재번호 ", "M-1").with("CAS ", "1-2-3")];
        let upload = normalize(&rows);
        assert_eq!(upload.rows[0].record["cas_no"], CellValue::from("1-2-3"));
    }
}
