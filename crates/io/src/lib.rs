//! `sheetmerge-io`: load master/update documents and write merge output.

pub mod csv;
pub mod error;
pub mod xlsx;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sheetmerge_recon::{Document, MergeResult};

pub use error::IoError;
pub use xlsx::WriteOptions;

/// Input file families, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Excel,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }
}

/// Load one table. `sheet` selects a worksheet in Excel files and is ignored for CSV.
pub fn load_document(path: &Path, sheet: Option<&str>) -> Result<Document, IoError> {
    let document = match Format::from_path(path) {
        Some(Format::Csv) => {
            if let Some(sheet) = sheet {
                log::warn!("{}: sheet '{sheet}' ignored for CSV input", path.display());
            }
            csv::import(path)?
        }
        Some(Format::Excel) => xlsx::import(path, sheet)?,
        None => return Err(IoError::UnsupportedFormat { path: path.to_path_buf() }),
    };
    log::info!(
        "loaded {}: {} column(s), {} row(s)",
        path.display(),
        document.headers.len(),
        document.rows.len()
    );
    Ok(document)
}

/// Write the merged table. Only `.csv`/`.tsv` and `.xlsx` are writable.
pub fn save_merged(path: &Path, result: &MergeResult, options: &WriteOptions) -> Result<(), IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" => csv::export(result, path)?,
        "xlsx" => xlsx::export(result, path, options)?,
        _ => return Err(IoError::UnsupportedFormat { path: path.to_path_buf() }),
    }
    log::info!("wrote {} row(s) to {}", result.rows.len(), path.display());
    Ok(())
}

/// Write the full MergeResult (meta, rows, report) as pretty JSON.
pub fn write_report(path: &Path, result: &MergeResult) -> Result<(), IoError> {
    let write_err = |message: String| IoError::Write {
        path: path.to_path_buf(),
        message,
    };
    let file = File::create(path).map_err(|e| write_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result).map_err(|e| write_err(e.to_string()))?;
    writer.flush().map_err(|e| write_err(e.to_string()))?;
    log::info!("wrote report to {}", path.display());
    Ok(())
}
