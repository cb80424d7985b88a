//! Cell value representation for uploaded and persisted rows

use serde::{Deserialize, Serialize};

/// A single cell, either from an upload or read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Null/empty value
    Null,
    /// Boolean (checkbox columns)
    Bool(bool),
    /// Numeric value (integers are carried as whole floats)
    Number(f64),
    /// Text value
    String(String),
}

impl CellValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// A cell counts as blank when it is null or a whitespace-only string
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            CellValue::Bool(_) => false,
        }
    }

    /// Collapse every flavour of "nothing" into `Null`.
    ///
    /// Blank or whitespace-only strings and NaN become `Null`; everything
    /// else is returned unchanged. Two cells are considered equal for diffing
    /// when their normalized forms are structurally equal.
    pub fn normalized(&self) -> CellValue {
        if self.is_blank() {
            CellValue::Null
        } else {
            self.clone()
        }
    }

    /// Render a natural key value. Whole numbers drop their fractional part,
    /// so a key typed as `1001` in a spreadsheet matches the stored `"1001"`.
    pub fn as_key(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Number(n) if n.is_nan() => None,
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// Convert to JSON value for hashing and display
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Parse from JSON value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            serde_json::Value::String(s) => CellValue::String(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                // Nested values are not cell-shaped, keep their text
                CellValue::String(json.to_string())
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "(null)"),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}
