use std::fmt;

use serde::Serialize;

use crate::cell::{Cell, EMPTY_CELL};
use crate::config::ConflictPolicy;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One logical table: headers plus rows in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Document {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Build a text-only document. Empty strings become empty cells.
    pub fn from_text(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| Row::new(r.iter().map(|v| Cell::text(*v)).collect()))
                .collect(),
        }
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// Cells in the owning document's column order. Short rows read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn get(&self, col: usize) -> &Cell {
        self.cells.get(col).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Master,
    Update,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Update => write!(f, "update"),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema alignment
// ---------------------------------------------------------------------------

/// One column of the merged schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPair {
    /// Normalized header used for alignment.
    pub name: String,
    /// Header written to the merged document.
    pub header: String,
    pub master: Option<usize>,
    pub update: Option<usize>,
}

impl ColumnPair {
    pub fn is_aligned(&self) -> bool {
        self.master.is_some() && self.update.is_some()
    }
}

/// Merged schema: master columns in master order, then update-only columns
/// in update order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnCorrespondence {
    pub columns: Vec<ColumnPair>,
    pub unmatched_master: Vec<String>,
    pub unmatched_update: Vec<String>,
}

impl ColumnCorrespondence {
    pub fn aligned(&self) -> impl Iterator<Item = &ColumnPair> {
        self.columns.iter().filter(|c| c.is_aligned())
    }

    pub fn aligned_count(&self) -> usize {
        self.aligned().count()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    /// Position in the merged schema of a master column.
    pub fn position_of_master(&self, master_col: usize) -> Option<usize> {
        self.columns.iter().position(|c| c.master == Some(master_col))
    }
}

// ---------------------------------------------------------------------------
// Keys + matching
// ---------------------------------------------------------------------------

pub(crate) const KEY_SEPARATOR: char = '\u{1F}';

/// Normalized record identity. Components are joined with U+001F, which
/// normalization strips from cell text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub(crate) String);

impl RecordKey {
    pub fn from_components<S: AsRef<str>>(parts: &[S]) -> Self {
        let joined: Vec<&str> = parts.iter().map(|p| p.as_ref()).collect();
        Self(joined.join(&KEY_SEPARATOR.to_string()))
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.components().collect();
        write!(f, "{}", parts.join(" | "))
    }
}

impl Serialize for RecordKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub master_row: usize,
    pub update_row: usize,
    pub key: RecordKey,
}

/// Why a row ended up in its side's "-only" list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlyReason {
    /// Key present but absent from the other document.
    NoMatch,
    /// Key column(s) empty.
    Keyless,
    /// A later occurrence of a key already used by an earlier row.
    DuplicateKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlyRow {
    pub row: usize,
    pub key: Option<RecordKey>,
    pub reason: OnlyReason,
}

#[derive(Debug, Default)]
pub struct MatchOutput {
    pub matched: Vec<MatchedPair>,
    pub master_only: Vec<OnlyRow>,
    pub update_only: Vec<OnlyRow>,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    Matched,
    MasterOnly,
    UpdateOnly,
}

impl fmt::Display for RowClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::MasterOnly => write!(f, "master_only"),
            Self::UpdateOnly => write!(f, "update_only"),
        }
    }
}

/// Where a merged cell's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Master,
    Update,
    /// Column does not exist on the row's side; cell is empty.
    Absent,
    /// Run date written by the update stamp.
    Stamped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedCell {
    pub value: Cell,
    pub source: ValueSource,
}

impl MergedCell {
    pub fn from_master(value: &Cell) -> Self {
        Self { value: value.clone(), source: ValueSource::Master }
    }

    pub fn from_update(value: &Cell) -> Self {
        Self { value: value.clone(), source: ValueSource::Update }
    }

    pub fn absent() -> Self {
        Self { value: Cell::empty(), source: ValueSource::Absent }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Both sides non-empty and different; update adopted.
    TookUpdate,
    /// Both sides non-empty and different; master kept.
    KeptMaster,
    /// Both sides non-empty and different; master kept, row needs review.
    Flagged,
    /// Master empty, update adopted.
    Filled,
    /// Update not newer than master's timestamp; master kept.
    Stale,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TookUpdate => write!(f, "took_update"),
            Self::KeptMaster => write!(f, "kept_master"),
            Self::Flagged => write!(f, "flagged"),
            Self::Filled => write!(f, "filled"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub column: String,
    /// Position of the column in the merged schema.
    pub column_index: usize,
    pub master: Cell,
    pub update: Cell,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub class: RowClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<RecordKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_row: Option<usize>,
    /// Set for "-only" rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<OnlyReason>,
    pub cells: Vec<MergedCell>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
    pub needs_review: bool,
    pub stale: bool,
    pub stamped: bool,
}

impl ReconciledRow {
    pub(crate) fn new(class: RowClass, cells: Vec<MergedCell>) -> Self {
        Self {
            class,
            key: None,
            master_row: None,
            update_row: None,
            reason: None,
            cells,
            conflicts: Vec::new(),
            needs_review: false,
            stale: false,
            stamped: false,
        }
    }

    pub fn value(&self, col: usize) -> &Cell {
        self.cells.get(col).map(|c| &c.value).unwrap_or(&EMPTY_CELL)
    }

    pub fn values(&self) -> Vec<Cell> {
        self.cells.iter().map(|c| c.value.clone()).collect()
    }

    pub fn conflict_at(&self, col: usize) -> Option<&FieldConflict> {
        self.conflicts.iter().find(|c| c.column_index == col)
    }

    /// True when an aligned master value was replaced or filled by the update.
    pub fn changed_master(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| matches!(c.resolution, Resolution::TookUpdate | Resolution::Filled))
    }
}

// ---------------------------------------------------------------------------
// Report + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    /// Index into the merged rows.
    pub output_row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub column: String,
    pub master: Cell,
    pub update: Cell,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKeyRecord {
    pub side: Side,
    pub key: String,
    /// Data row indices (0-based, header excluded) in document order. The
    /// first is the one eligible for matching.
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeylessRecord {
    pub side: Side,
    pub row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub master_rows: usize,
    pub update_rows: usize,
    pub output_rows: usize,
    pub matched: usize,
    pub master_only: usize,
    pub update_only: usize,
    pub duplicate_keys_master: usize,
    pub duplicate_keys_update: usize,
    pub keyless_master: usize,
    pub keyless_update: usize,
    /// All field-level audit entries, `filled` and `stale_fields` included.
    pub field_conflicts: usize,
    pub filled: usize,
    /// Update values held back by the recency guard.
    pub stale_fields: usize,
    pub needs_review: usize,
    pub stale_updates: usize,
    pub stamped: usize,
    pub unmatched_master_columns: Vec<String>,
    pub unmatched_update_columns: Vec<String>,
    pub conflicts: Vec<ConflictRecord>,
    pub duplicates: Vec<DuplicateKeyRecord>,
    pub keyless: Vec<KeylessRecord>,
}

impl MergeReport {
    /// Data-quality findings a cautious caller may want to stop on.
    pub fn has_review_items(&self) -> bool {
        self.needs_review > 0 || !self.duplicates.is_empty() || !self.keyless.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeMeta {
    pub config_name: String,
    pub policy: ConflictPolicy,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    pub meta: MergeMeta,
    pub headers: Vec<String>,
    pub rows: Vec<ReconciledRow>,
    pub report: MergeReport,
}

impl MergeResult {
    /// Merged grid as plain cells, headers excluded.
    pub fn grid(&self) -> Vec<Vec<Cell>> {
        self.rows.iter().map(ReconciledRow::values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_read_as_empty() {
        let row = Row::new(vec![Cell::text("a")]);
        assert_eq!(row.get(0), &Cell::text("a"));
        assert!(row.get(5).is_empty());
    }

    #[test]
    fn record_key_display_joins_components() {
        let key = RecordKey::from_components(&["anna", "virtanen"]);
        assert_eq!(key.to_string(), "anna | virtanen");
        assert_eq!(key.components().count(), 2);
    }

    #[test]
    fn document_from_text_maps_empty_strings() {
        let doc = Document::from_text(&["id", "name"], &[&["1", ""]]);
        assert_eq!(doc.column("name"), Some(1));
        assert!(doc.rows[0].get(1).is_empty());
        assert_eq!(doc.rows[0].get(0), &Cell::text("1"));
    }
}
