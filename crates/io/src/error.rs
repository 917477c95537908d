use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}: sheet '{sheet}' not found (available: {})", path.display(), available.join(", "))]
    SheetNotFound {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },

    #[error("{}: unsupported file type (expected csv, tsv, xlsx, xls, xlsb or ods)", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// No header row.
    #[error("{}: document is empty", path.display())]
    Empty { path: PathBuf },

    #[error("cannot write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl IoError {
    /// True for failures while producing output files.
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}
