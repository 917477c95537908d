use thiserror::Error;

use crate::model::Side;

#[derive(Debug, Error)]
pub enum MergeError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (empty key, bad mapping entry, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// No column of the update document aligns with the master document.
    #[error(
        "schema mismatch: none of the {update_columns} update column(s) align with the {master_columns} master column(s)"
    )]
    SchemaMismatch {
        master_columns: usize,
        update_columns: usize,
    },

    /// A key column does not exist in a document.
    #[error("{side} document: key column '{column}' not found")]
    UnknownKeyColumn { side: Side, column: String },

    /// A shared key column exists on one side only.
    #[error("key column '{column}' must exist in both documents (found in {side} only)")]
    UnalignedKeyColumn { side: Side, column: String },

    /// An explicit column mapping names a header that does not exist.
    #[error("column mapping: {side} column '{column}' not found")]
    UnknownMappedColumn { side: Side, column: String },

    /// A recency column does not exist in its document.
    #[error("{side} document: recency column '{column}' not found")]
    UnknownRecencyColumn { side: Side, column: String },
}

impl MergeError {
    /// True for errors caused by the configuration rather than the data.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::SchemaMismatch { .. })
    }
}
