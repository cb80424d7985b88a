//! Upload file readers
//!
//! Every reader produces [`RawRow`]s keyed by the header labels exactly as
//! they appear in the file; mapping them to fields is the engine's job.

pub mod excel;
pub mod delimited;
pub mod json;

use std::path::Path;

use anyhow::{Result, bail};

use crate::sync::RawRow;

/// Upload formats recognised by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Excel,
    Csv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Some(InputFormat::Excel),
            "csv" | "tsv" => Some(InputFormat::Csv),
            "json" => Some(InputFormat::Json),
            _ => None,
        }
    }
}

/// Read an upload file, picking the reader from its extension.
///
/// `sheet` selects a worksheet for spreadsheet files; the first one is used
/// when it is `None`.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<RawRow>> {
    let rows = match InputFormat::from_path(path) {
        Some(InputFormat::Excel) => excel::read_excel(path, sheet)?,
        Some(InputFormat::Csv) => delimited::read_csv(path)?,
        Some(InputFormat::Json) => json::read_json(path)?,
        None => bail!(
            "Unsupported input file '{}': expected .xlsx, .xls, .ods, .csv, .tsv or .json",
            path.display()
        ),
    };
    log::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a/b.XLSX")), Some(InputFormat::Excel));
        assert_eq!(InputFormat::from_path(Path::new("rows.tsv")), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_path(Path::new("rows.json")), Some(InputFormat::Json));
        assert_eq!(InputFormat::from_path(Path::new("rows.txt")), None);
        assert_eq!(InputFormat::from_path(Path::new("rows")), None);
    }

    #[test]
    fn test_unsupported_file_is_error() {
        assert!(read_rows(Path::new("upload.pdf"), None).is_err());
    }
}
