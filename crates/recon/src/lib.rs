//! `sheetmerge-recon`: key-based reconciliation of a master table with an update table.
//!
//! Pure engine crate: receives loaded documents, returns the merged rows and
//! the audit report. No CLI or file IO.

pub mod align;
pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod keys;
pub mod matcher;
pub mod model;
pub mod recency;
pub mod reconcile;

pub use cell::{Cell, CellValue};
pub use config::{ConflictPolicy, KeySpec, MergeConfig};
pub use engine::{run, run_with_date};
pub use error::MergeError;
pub use model::{Document, MergeReport, MergeResult, ReconciledRow, Row, RowClass, ValueSource};
