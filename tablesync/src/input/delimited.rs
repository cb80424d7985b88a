//! Read upload rows from CSV and TSV files

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use crate::sync::{CellValue, RawRow};

/// Read a delimited file; `.tsv` files are tab separated
pub fn read_csv(path: &Path) -> Result<Vec<RawRow>> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    read_delimited(file, delimiter).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read delimited text with a header line. Every cell is text; empty cells
/// become blank strings and are nulled by the normalizer.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RawRow>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read header line")?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // Spreadsheet exports often start with a byte order mark
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read line {}", index + 2))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), CellValue::String(cell.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
