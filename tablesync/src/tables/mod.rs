//! Built-in `materials` and `products` tables, with Korean and English
//! header defaults

use crate::sync::{ColumnKind, ColumnSpec, Fallback, MappingEntry, RequiredField, TableSpec};

/// Category written when an upload leaves it blank
pub const UNSPECIFIED_CATEGORY: &str = "unspecified";

/// Raw material registry, keyed by material number
pub fn materials() -> TableSpec {
    TableSpec {
        name: "materials".to_string(),
        key_field: "material_number".to_string(),
        columns: vec![
            ColumnSpec::new("material_number", ColumnKind::Text),
            ColumnSpec::new("material_name", ColumnKind::Text),
            ColumnSpec::new("category", ColumnKind::Text),
            ColumnSpec::new("cas_no", ColumnKind::Text),
            ColumnSpec::new("flash_point", ColumnKind::Number),
            ColumnSpec::new("supplier", ColumnKind::Text),
            ColumnSpec::new("hazardous", ColumnKind::Bool),
            ColumnSpec::new("registered_on", ColumnKind::Date),
            ColumnSpec::new("note", ColumnKind::Text),
            ColumnSpec::new("content_hash", ColumnKind::Text),
        ],
        builtin_mapping: mapping(&[
            ("자재번호", "material_number"),
            ("자재코드", "material_number"),
            ("Material No", "material_number"),
            ("자재명", "material_name"),
            ("Material Name", "material_name"),
            ("분류", "category"),
            ("Category", "category"),
            ("CAS", "cas_no"),
            ("CAS No", "cas_no"),
            ("인화점", "flash_point"),
            ("Flash Point", "flash_point"),
            ("공급사", "supplier"),
            ("Supplier", "supplier"),
            ("위험물", "hazardous"),
            ("등록일", "registered_on"),
            ("비고", "note"),
        ]),
        required: vec![
            RequiredField::new("material_name", Fallback::Key),
            RequiredField::new("category", Fallback::Literal(UNSPECIFIED_CATEGORY.to_string())),
        ],
        fingerprint_field: Some("content_hash".to_string()),
    }
}

/// Finished product catalogue, keyed by product code
pub fn products() -> TableSpec {
    TableSpec {
        name: "products".to_string(),
        key_field: "product_code".to_string(),
        columns: vec![
            ColumnSpec::new("product_code", ColumnKind::Text),
            ColumnSpec::new("product_name", ColumnKind::Text),
            ColumnSpec::new("category", ColumnKind::Text),
            ColumnSpec::new("volume_ml", ColumnKind::Number),
            ColumnSpec::new("launched_on", ColumnKind::Date),
            ColumnSpec::new("discontinued", ColumnKind::Bool),
        ],
        builtin_mapping: mapping(&[
            ("제품코드", "product_code"),
            ("Product Code", "product_code"),
            ("제품명", "product_name"),
            ("Product Name", "product_name"),
            ("분류", "category"),
            ("Category", "category"),
            ("용량", "volume_ml"),
            ("출시일", "launched_on"),
            ("단종", "discontinued"),
        ]),
        required: vec![
            RequiredField::new("product_name", Fallback::Key),
            RequiredField::new("category", Fallback::Literal(UNSPECIFIED_CATEGORY.to_string())),
        ],
        fingerprint_field: None,
    }
}

fn mapping(pairs: &[(&str, &str)]) -> Vec<MappingEntry> {
    pairs
        .iter()
        .map(|(header, field)| MappingEntry::new(*header, *field))
        .collect()
}

/// All tables shipped with the binary
pub fn builtin_tables() -> Vec<TableSpec> {
    vec![materials(), products()]
}

/// Combine built-in tables with tables from config.
///
/// A configured table with the same name replaces the built-in one.
pub fn all_tables(configured: &[TableSpec]) -> Vec<TableSpec> {
    let mut tables: Vec<TableSpec> = builtin_tables()
        .into_iter()
        .filter(|b| !configured.iter().any(|c| c.name == b.name))
        .collect();
    tables.extend(configured.iter().cloned());
    tables
}

/// Find a table by name among built-in and configured tables
pub fn find_table(configured: &[TableSpec], name: &str) -> Option<TableSpec> {
    all_tables(configured).into_iter().find(|t| t.name == name)
}
