use std::collections::HashMap;

use crate::align::normalize_header;
use crate::cell::normalize_text;
use crate::config::KeySpec;
use crate::error::MergeError;
use crate::model::{ColumnCorrespondence, Document, DuplicateKeyRecord, RecordKey, Row, Side};

/// How a row's key components combine into a RecordKey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Each component canonicalized on its own, joined with the key separator.
    Composite,
    /// Components joined with a space and normalized as one text value.
    Flattened,
}

/// Key columns resolved against both documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumns {
    pub master: Vec<usize>,
    pub update: Vec<usize>,
    pub mode: KeyMode,
}

/// Resolve the configured key columns.
///
/// Shared keys (`key = "id"` / `key = [...]`) resolve through the column
/// correspondence, so they follow explicit mappings and must be aligned.
/// Per-side keys resolve against each document's own headers.
pub fn resolve_key_columns(
    spec: &KeySpec,
    correspondence: &ColumnCorrespondence,
    master_headers: &[String],
    update_headers: &[String],
) -> Result<KeyColumns, MergeError> {
    if spec.is_per_side() {
        return Ok(KeyColumns {
            master: resolve_on_side(&spec.master_columns(), master_headers, Side::Master)?,
            update: resolve_on_side(&spec.update_columns(), update_headers, Side::Update)?,
            mode: KeyMode::Flattened,
        });
    }

    let mut master = Vec::new();
    let mut update = Vec::new();
    for column in spec.master_columns() {
        let name = normalize_header(column);
        // A key may be named by its master header or, under a mapping, by its update header.
        let pair = correspondence
            .columns
            .iter()
            .find(|c| c.master.is_some() && c.name == name)
            .or_else(|| {
                correspondence.columns.iter().find(|c| {
                    c.update
                        .and_then(|u| update_headers.get(u))
                        .is_some_and(|h| normalize_header(h) == name)
                })
            })
            .ok_or_else(|| MergeError::UnknownKeyColumn {
                side: Side::Master,
                column: column.to_string(),
            })?;

        match (pair.master, pair.update) {
            (Some(m), Some(u)) => {
                master.push(m);
                update.push(u);
            }
            (Some(_), None) => {
                return Err(MergeError::UnalignedKeyColumn {
                    side: Side::Master,
                    column: column.to_string(),
                })
            }
            _ => {
                return Err(MergeError::UnalignedKeyColumn {
                    side: Side::Update,
                    column: column.to_string(),
                })
            }
        }
    }

    Ok(KeyColumns { master, update, mode: KeyMode::Composite })
}

fn resolve_on_side(names: &[&str], headers: &[String], side: Side) -> Result<Vec<usize>, MergeError> {
    names
        .iter()
        .map(|column| {
            let name = normalize_header(column);
            headers
                .iter()
                .position(|h| normalize_header(h) == name)
                .ok_or_else(|| MergeError::UnknownKeyColumn {
                    side,
                    column: column.to_string(),
                })
        })
        .collect()
}

/// Derive a row's key. `None` when any component is empty.
pub fn row_key(row: &Row, columns: &[usize], mode: KeyMode) -> Option<RecordKey> {
    let mut parts = Vec::with_capacity(columns.len());
    for &col in columns {
        let part = row.get(col).canonical();
        if part.is_empty() {
            return None;
        }
        parts.push(part);
    }

    match mode {
        KeyMode::Composite => Some(RecordKey::from_components(&parts)),
        KeyMode::Flattened => {
            let flat = normalize_text(&parts.join(" "));
            Some(RecordKey::from_components(&[flat]))
        }
    }
}

/// RecordKey -> row indices for one document.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    pub side: Side,
    /// Row indices per key in document order; more than one means duplicate.
    pub rows: HashMap<RecordKey, Vec<usize>>,
    /// Key of every row, `None` for keyless rows.
    pub row_keys: Vec<Option<RecordKey>>,
    pub keyless: Vec<usize>,
}

impl KeyIndex {
    /// The row eligible for matching under `key`: its first occurrence.
    pub fn first_row(&self, key: &RecordKey) -> Option<usize> {
        self.rows.get(key).and_then(|rows| rows.first().copied())
    }

    pub fn key_of(&self, row: usize) -> Option<&RecordKey> {
        self.row_keys.get(row).and_then(Option::as_ref)
    }

    /// Duplicate keys ordered by their first occurrence.
    pub fn duplicates(&self) -> Vec<DuplicateKeyRecord> {
        let mut dups: Vec<DuplicateKeyRecord> = self
            .rows
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(key, rows)| DuplicateKeyRecord {
                side: self.side,
                key: key.to_string(),
                rows: rows.clone(),
            })
            .collect();
        dups.sort_by_key(|d| d.rows[0]);
        dups
    }
}

pub fn extract_keys(document: &Document, columns: &[usize], mode: KeyMode, side: Side) -> KeyIndex {
    let mut rows: HashMap<RecordKey, Vec<usize>> = HashMap::new();
    let mut row_keys = Vec::with_capacity(document.rows.len());
    let mut keyless = Vec::new();

    for (i, row) in document.rows.iter().enumerate() {
        let key = row_key(row, columns, mode);
        match &key {
            Some(k) => rows.entry(k.clone()).or_default().push(i),
            None => keyless.push(i),
        }
        row_keys.push(key);
    }

    KeyIndex { side, rows, row_keys, keyless }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::align::align;
    use crate::cell::Cell;

    fn h(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numeric_forms_share_a_key() {
        let a = Row::new(vec![Cell::number(5.0)]);
        let b = Row::new(vec![Cell::text("5.0")]);
        let c = Row::new(vec![Cell::text(" 5 ")]);
        let ka = row_key(&a, &[0], KeyMode::Composite);
        assert!(ka.is_some());
        assert_eq!(ka, row_key(&b, &[0], KeyMode::Composite));
        assert_eq!(ka, row_key(&c, &[0], KeyMode::Composite));
    }

    #[test]
    fn date_and_iso_text_share_a_key() {
        let d = chrono::NaiveDate::from_ymd_opt(2023, 11, 2).unwrap();
        let a = Row::new(vec![Cell::date(d)]);
        let b = Row::new(vec![Cell::text("2023-11-02")]);
        assert_eq!(row_key(&a, &[0], KeyMode::Composite), row_key(&b, &[0], KeyMode::Composite));
    }

    #[test]
    fn any_empty_component_makes_row_keyless() {
        let row = Row::new(vec![Cell::text("Anna"), Cell::text("  ")]);
        assert_eq!(row_key(&row, &[0, 1], KeyMode::Composite), None);
        assert_eq!(row_key(&row, &[0, 1], KeyMode::Flattened), None);
    }

    #[test]
    fn composite_components_do_not_bleed() {
        // "a b" + "c" must differ from "a" + "b c"
        let r1 = Row::new(vec![Cell::text("a b"), Cell::text("c")]);
        let r2 = Row::new(vec![Cell::text("a"), Cell::text("b c")]);
        assert_ne!(
            row_key(&r1, &[0, 1], KeyMode::Composite),
            row_key(&r2, &[0, 1], KeyMode::Composite)
        );
    }

    #[test]
    fn flattened_key_matches_full_name() {
        let parts = Row::new(vec![Cell::text("Anna"), Cell::text("Virtanen")]);
        let full = Row::new(vec![Cell::text("  anna   VIRTANEN ")]);
        assert_eq!(
            row_key(&parts, &[0, 1], KeyMode::Flattened),
            row_key(&full, &[0], KeyMode::Flattened)
        );
    }

    #[test]
    fn extract_tracks_duplicates_and_keyless() {
        let doc = Document::from_text(
            &["id", "name"],
            &[&["1", "a"], &["2", "b"], &["", "c"], &["1", "d"], &["01", "e"]],
        );
        let index = extract_keys(&doc, &[0], KeyMode::Composite, Side::Master);

        assert_eq!(index.keyless, vec![2]);
        let dups = index.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].rows, vec![0, 3]);
        assert_eq!(dups[0].key, "1");
        let one = index.key_of(0).unwrap().clone();
        assert_eq!(index.first_row(&one), Some(0));
        // "01" has a significant leading zero: its own key
        assert_ne!(index.key_of(4), index.key_of(0));
    }

    #[test]
    fn resolve_shared_key_through_mapping() {
        let master = h(&["Member no", "Name"]);
        let update = h(&["Name", "Membership number"]);
        let mut mapping = BTreeMap::new();
        mapping.insert("Membership number".to_string(), "Member no".to_string());
        let corr = align(&master, &update, &mapping, &[]).unwrap();

        let by_master = resolve_key_columns(&KeySpec::Single("member no".into()), &corr, &master, &update).unwrap();
        assert_eq!(by_master.master, vec![0]);
        assert_eq!(by_master.update, vec![1]);
        assert_eq!(by_master.mode, KeyMode::Composite);

        let by_update =
            resolve_key_columns(&KeySpec::Single("Membership number".into()), &corr, &master, &update).unwrap();
        assert_eq!(by_update, by_master);
    }

    #[test]
    fn resolve_rejects_missing_and_unaligned_keys() {
        let master = h(&["id", "name", "notes"]);
        let update = h(&["id", "name"]);
        let corr = align(&master, &update, &BTreeMap::new(), &[]).unwrap();

        let err = resolve_key_columns(&KeySpec::Single("uid".into()), &corr, &master, &update).unwrap_err();
        assert!(matches!(err, MergeError::UnknownKeyColumn { side: Side::Master, .. }));

        let err = resolve_key_columns(&KeySpec::Single("notes".into()), &corr, &master, &update).unwrap_err();
        assert!(matches!(err, MergeError::UnalignedKeyColumn { side: Side::Master, .. }));
    }

    #[test]
    fn resolve_per_side_key() {
        let master = h(&["Etunimi", "Sukunimi", "Email"]);
        let update = h(&["Etu- ja sukunimi", "Email"]);
        let corr = align(&master, &update, &BTreeMap::new(), &[]).unwrap();
        let spec = KeySpec::PerSide {
            master: h(&["etunimi", "sukunimi"]),
            update: h(&["Etu- ja sukunimi"]),
        };
        let cols = resolve_key_columns(&spec, &corr, &master, &update).unwrap();
        assert_eq!(cols.master, vec![0, 1]);
        assert_eq!(cols.update, vec![0]);
        assert_eq!(cols.mode, KeyMode::Flattened);

        let bad = KeySpec::PerSide { master: h(&["Etunimi"]), update: h(&["Nimi"]) };
        let err = resolve_key_columns(&bad, &corr, &master, &update).unwrap_err();
        assert!(matches!(err, MergeError::UnknownKeyColumn { side: Side::Update, .. }));
    }
}
