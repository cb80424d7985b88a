//! Raw upload rows and canonical records

use std::collections::BTreeMap;

use super::CellValue;

/// A canonical record: canonical field name -> value.
///
/// Sorted by field name so iteration (and anything hashed from it) is stable.
pub type Record = BTreeMap<String, CellValue>;

/// One parsed spreadsheet row: header label -> raw cell, in sheet order.
///
/// A header that is present with an empty cell is kept as `CellValue::Null`;
/// a header that is absent is simply not in the row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Set a cell, replacing an earlier cell with the same header
    pub fn insert(&mut self, header: impl Into<String>, value: CellValue) {
        let header = header.into();
        match self.cells.iter_mut().find(|(h, _)| *h == header) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((header, value)),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, header: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(header, value.into());
        self
    }

    /// Get a cell by exact header
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, v)| v)
    }

    /// Iterate cells in sheet order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v))
    }

    /// Headers in sheet order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when the row has no non-blank cell at all
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_blank())
    }

    /// Build a row from a JSON object
    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        obj.iter()
            .map(|(k, v)| (k.clone(), CellValue::from_json(v)))
            .collect()
    }
}

impl FromIterator<(String, CellValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (header, value) in iter {
            row.insert(header, value);
        }
        row
    }
}

/// Render a record as a JSON object (for logs and `--json` output)
pub fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}
