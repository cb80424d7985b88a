//! Read upload rows from spreadsheet files (xlsx, xls, ods)

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Range, Reader, open_workbook_auto};

use crate::sync::{CellValue, RawRow};

/// Read one worksheet; the first row holds the header labels
pub fn read_excel(path: &Path, sheet: Option<&str>) -> Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let range = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("Failed to read sheet: {}", name))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("Spreadsheet has no sheets: {}", path.display()))?
            .context("Failed to read first sheet")?,
    };

    Ok(rows_from_range(&range))
}

/// Convert a sheet range into rows. Columns without a header and fully
/// empty rows are left out.
pub fn rows_from_range(range: &Range<Data>) -> Vec<RawRow> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_row.iter().map(header_label).collect();

    let mut result = Vec::new();
    for (offset, cells) in rows.enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            log::debug!("Sheet row {}: empty, ignored", offset + 2);
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(cells.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), cell_to_value(cell)))
            .collect();
        result.push(row);
    }
    result
}

fn header_label(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Convert a spreadsheet cell to a cell value
fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        // Kept as the serial day number; date fields are converted later
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::String(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => {
            log::debug!("Cell error {:?} read as empty", e);
            CellValue::Null
        }
    }
}
