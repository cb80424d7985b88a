//! Per-table configuration passed into every sync run

use serde::{Deserialize, Serialize};

use super::{CellValue, Record};

/// Storage kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Bool,
    /// Date-like text; uploads get trimmed and Excel serials converted
    Date,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Number => write!(f, "number"),
            ColumnKind::Bool => write!(f, "bool"),
            ColumnKind::Date => write!(f, "date"),
        }
    }
}

/// A column of the target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub field: String,
    #[serde(default = "default_kind")]
    pub kind: ColumnKind,
}

fn default_kind() -> ColumnKind {
    ColumnKind::Text
}

impl ColumnSpec {
    pub fn new(field: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

/// One header label -> canonical field pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub header: String,
    pub field: String,
}

impl MappingEntry {
    pub fn new(header: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            field: field.into(),
        }
    }
}

/// Value used when a required field would otherwise be null
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Copy the natural key
    Key,
    /// A fixed sentinel such as "unspecified"
    Literal(String),
}

/// A field that an upload may never clear
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredField {
    pub field: String,
    pub fallback: Fallback,
}

impl RequiredField {
    pub fn new(field: impl Into<String>, fallback: Fallback) -> Self {
        Self {
            field: field.into(),
            fallback,
        }
    }

    /// Resolve the fallback value for a record with the given key
    pub fn default_for(&self, key: &str) -> CellValue {
        match &self.fallback {
            Fallback::Key => CellValue::String(key.to_string()),
            Fallback::Literal(s) => CellValue::String(s.clone()),
        }
    }
}

/// Everything the engine needs to know about one target table.
///
/// Built once by the host (see [`crate::tables`]) and handed to each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name in the store
    pub name: String,
    /// Natural key field (unique within the table)
    pub key_field: String,
    /// All canonical columns, key included
    pub columns: Vec<ColumnSpec>,
    /// Built-in header label mapping, used beneath the persisted one
    #[serde(default)]
    pub builtin_mapping: Vec<MappingEntry>,
    /// Fields that are never cleared by an upload
    #[serde(default)]
    pub required: Vec<RequiredField>,
    /// Column receiving the content fingerprint, if any
    #[serde(default)]
    pub fingerprint_field: Option<String>,
}

impl TableSpec {
    /// Look up a column by field name
    pub fn column(&self, field: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Check whether the field is a column of this table
    pub fn has_column(&self, field: &str) -> bool {
        self.column(field).is_some()
    }

    /// Check whether the field is date-flagged
    pub fn is_date_field(&self, field: &str) -> bool {
        self.column(field)
            .map(|c| c.kind == ColumnKind::Date)
            .unwrap_or(false)
    }

    /// Get the required-field rule for a field
    pub fn required_field(&self, field: &str) -> Option<&RequiredField> {
        self.required.iter().find(|r| r.field == field)
    }

    /// The natural key is always required, on top of the configured list
    pub fn is_required(&self, field: &str) -> bool {
        field == self.key_field || self.required_field(field).is_some()
    }

    /// Fill required fields that are missing or null in a new record
    pub fn apply_fallbacks(&self, key: &str, record: &mut Record) {
        for rule in &self.required {
            let missing = record
                .get(&rule.field)
                .map(|v| v.is_blank())
                .unwrap_or(true);
            if missing {
                record.insert(rule.field.clone(), rule.default_for(key));
            }
        }
    }

    /// Validate internal consistency of the spec
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("table name is empty".to_string());
        }
        if !self.has_column(&self.key_field) {
            return Err(format!(
                "key field '{}' is not a column of '{}'",
                self.key_field, self.name
            ));
        }
        for rule in &self.required {
            if !self.has_column(&rule.field) {
                return Err(format!(
                    "required field '{}' is not a column of '{}'",
                    rule.field, self.name
                ));
            }
        }
        if let Some(fp) = &self.fingerprint_field {
            if !self.has_column(fp) {
                return Err(format!(
                    "fingerprint field '{}' is not a column of '{}'",
                    fp, self.name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TableSpec {
        TableSpec {
            name: "materials".to_string(),
            key_field: "material_number".to_string(),
            columns: vec![
                ColumnSpec::new("material_number", ColumnKind::Text),
                ColumnSpec::new("material_name", ColumnKind::Text),
                ColumnSpec::new("category", ColumnKind::Text),
                ColumnSpec::new("registered_on", ColumnKind::Date),
            ],
            builtin_mapping: vec![],
            required: vec![
                RequiredField::new("material_name", Fallback::Key),
                RequiredField::new("category", Fallback::Literal("unspecified".to_string())),
            ],
            fingerprint_field: None,
        }
    }

    #[test]
    fn test_apply_fallbacks() {
        let mut record = Record::new();
        record.insert("material_number".to_string(), CellValue::from("M-1"));
        record.insert("material_name".to_string(), CellValue::from("  "));

        spec().apply_fallbacks("M-1", &mut record);

        assert_eq!(record["material_name"], CellValue::from("M-1"));
        assert_eq!(record["category"], CellValue::from("unspecified"));
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let mut bad = spec();
        bad.key_field = "code".to_string();
        assert!(bad.validate().is_err());
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn test_is_date_field() {
        let spec = spec();
        assert!(spec.is_date_field("registered_on"));
        assert!(!spec.is_date_field("material_name"));
        assert!(spec.is_required("material_number"));
    }
}
