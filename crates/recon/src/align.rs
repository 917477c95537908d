use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cell::normalize_text;
use crate::error::MergeError;
use crate::model::{ColumnCorrespondence, ColumnPair, Side};

/// Header normalization: trim, collapse internal whitespace, case-fold.
pub fn normalize_header(header: &str) -> String {
    normalize_text(header)
}

/// Align update columns onto master columns.
///
/// `mapping` (update header -> master header) is applied first. Remaining
/// columns align by normalized header. Headers listed in `ignore` are dropped
/// from the update side entirely. Blank headers never align, and when one
/// document repeats a normalized header only the first occurrence aligns.
pub fn align(
    master_headers: &[String],
    update_headers: &[String],
    mapping: &BTreeMap<String, String>,
    ignore: &[String],
) -> Result<ColumnCorrespondence, MergeError> {
    let master_names: Vec<String> = master_headers.iter().map(|h| normalize_header(h)).collect();
    let update_names: Vec<String> = update_headers.iter().map(|h| normalize_header(h)).collect();

    let ignored: HashSet<String> = ignore.iter().map(|h| normalize_header(h)).collect();
    for name in &ignored {
        if !update_names.contains(name) {
            log::debug!("ignored column '{name}' is not in the update document");
        }
    }

    let master_index = first_positions(&master_names);
    let update_index = first_positions(&update_names);

    // master col -> update col
    let mut pairs: HashMap<usize, usize> = HashMap::new();
    let mut update_used: HashSet<usize> = HashSet::new();

    // 1. Explicit mapping
    for (update_col, master_col) in mapping {
        let u = *update_index.get(&normalize_header(update_col)).ok_or_else(|| {
            MergeError::UnknownMappedColumn {
                side: Side::Update,
                column: update_col.clone(),
            }
        })?;
        let m = *master_index.get(&normalize_header(master_col)).ok_or_else(|| {
            MergeError::UnknownMappedColumn {
                side: Side::Master,
                column: master_col.clone(),
            }
        })?;
        if pairs.contains_key(&m) {
            return Err(MergeError::ConfigValidation(format!(
                "column mapping: master column '{master_col}' is mapped more than once"
            )));
        }
        log::debug!("mapped update column '{}' -> master column '{}'", update_headers[u], master_headers[m]);
        pairs.insert(m, u);
        update_used.insert(u);
    }

    // 2. Name-based alignment
    for (u, name) in update_names.iter().enumerate() {
        if name.is_empty() || update_used.contains(&u) || ignored.contains(name) {
            continue;
        }
        if update_index.get(name) != Some(&u) {
            continue; // repeated header on the update side
        }
        if let Some(&m) = master_index.get(name) {
            if let std::collections::hash_map::Entry::Vacant(slot) = pairs.entry(m) {
                slot.insert(u);
                update_used.insert(u);
            }
        }
    }

    // 3. Assemble the merged schema
    let mut correspondence = ColumnCorrespondence::default();
    for (m, header) in master_headers.iter().enumerate() {
        let update = pairs.get(&m).copied();
        if update.is_none() {
            correspondence.unmatched_master.push(header.clone());
        }
        correspondence.columns.push(ColumnPair {
            name: master_names[m].clone(),
            header: header.clone(),
            master: Some(m),
            update,
        });
    }
    let mut taken: HashSet<String> = master_names.iter().filter(|n| !n.is_empty()).cloned().collect();
    for (u, header) in update_headers.iter().enumerate() {
        if update_used.contains(&u) || ignored.contains(&update_names[u]) {
            continue;
        }
        correspondence.unmatched_update.push(header.clone());
        let merged_header = if update_names[u].is_empty() {
            header.clone()
        } else {
            distinct_header(header, &mut taken)
        };
        if &merged_header != header {
            log::warn!("update column '{header}' clashes with a merged column; written as '{merged_header}'");
        }
        correspondence.columns.push(ColumnPair {
            name: normalize_header(&merged_header),
            header: merged_header,
            master: None,
            update: Some(u),
        });
    }

    if correspondence.aligned_count() == 0 {
        return Err(MergeError::SchemaMismatch {
            master_columns: master_headers.len(),
            update_columns: update_headers.len(),
        });
    }

    Ok(correspondence)
}

/// `header`, or `header (update)`, `header (update 2)`, ... when the
/// normalized name is already in the merged schema.
fn distinct_header(header: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = header.to_string();
    let mut n = 1;
    while !taken.insert(normalize_header(&candidate)) {
        candidate = match n {
            1 => format!("{} (update)", header.trim()),
            _ => format!("{} (update {n})", header.trim()),
        };
        n += 1;
    }
    candidate
}

/// Normalized name -> first column carrying it. Blank names are skipped.
fn first_positions(names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, name) in names.iter().enumerate() {
        if !name.is_empty() {
            index.entry(name.clone()).or_insert(i);
        }
    }
    index
}
