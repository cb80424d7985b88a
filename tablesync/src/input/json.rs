//! Read upload rows from JSON
//!
//! Accepts either an array of objects or `{ "rows": [ ... ] }`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::sync::RawRow;

pub fn read_json(path: &Path) -> Result<Vec<RawRow>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    parse_rows(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_rows(contents: &str) -> Result<Vec<RawRow>> {
    let value: Value = serde_json::from_str(contents)?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("rows") {
            Some(Value::Array(items)) => items,
            _ => bail!("expected an array of rows or an object with a \"rows\" array"),
        },
        _ => bail!("expected an array of rows or an object with a \"rows\" array"),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(obj) => Ok(RawRow::from_json_object(obj)),
            other => bail!("row {} is not an object: {}", i + 1, other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::CellValue;

    #[test]
    fn test_array_of_objects() {
        let rows = parse_rows(r#"[{"자재번호": "M-1", "인화점": 61, "위험물": true, "CAS": null}]"#).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("인화점"), Some(&CellValue::Number(61.0)));
        assert_eq!(rows[0].get("위험물"), Some(&CellValue::Bool(true)));
        assert_eq!(rows[0].get("CAS"), Some(&CellValue::Null));
    }

    #[test]
    fn test_rows_wrapper() {
        let rows = parse_rows(r#"{"rows": [{"제품코드": "P-1"}, {"제품코드": "P-2"}]}"#).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_non_object_row_rejected() {
        assert!(parse_rows(r#"[{"a": 1}, 3]"#).is_err());
        assert!(parse_rows(r#""text""#).is_err());
    }
}
