use crate::cell::Cell;
use crate::config::ConflictPolicy;
use crate::model::{
    ColumnCorrespondence, FieldConflict, MergedCell, ReconciledRow, Resolution, Row, RowClass,
};

/// Merge a matched pair column by column.
///
/// Aligned columns:
/// - update empty: master kept, whatever master holds.
/// - master empty, update non-empty: update adopted under every policy and
///   audited as `Filled`.
/// - both non-empty and equal after normalization: master kept, no entry.
/// - both non-empty and different: `policy` decides, always audited.
///
/// Master-only columns copy master; update-only columns take the update value.
pub fn reconcile(
    master: &Row,
    update: &Row,
    correspondence: &ColumnCorrespondence,
    policy: ConflictPolicy,
) -> ReconciledRow {
    let mut cells = Vec::with_capacity(correspondence.columns.len());
    let mut conflicts = Vec::new();
    let mut needs_review = false;

    for (idx, column) in correspondence.columns.iter().enumerate() {
        let cell = match (column.master, column.update) {
            (Some(m), Some(u)) => {
                let (m_cell, u_cell) = (master.get(m), update.get(u));
                let (cell, resolution) = resolve_field(m_cell, u_cell, policy);
                if let Some(resolution) = resolution {
                    needs_review |= resolution == Resolution::Flagged;
                    conflicts.push(FieldConflict {
                        column: column.header.clone(),
                        column_index: idx,
                        master: m_cell.clone(),
                        update: u_cell.clone(),
                        resolution,
                    });
                }
                cell
            }
            (Some(m), None) => MergedCell::from_master(master.get(m)),
            (None, Some(u)) => MergedCell::from_update(update.get(u)),
            (None, None) => MergedCell::absent(),
        };
        cells.push(cell);
    }

    let mut row = ReconciledRow::new(RowClass::Matched, cells);
    row.conflicts = conflicts;
    row.needs_review = needs_review;
    row
}

/// Decide one aligned field. Returns the merged cell and, when the values
/// diverge, the resolution to audit.
fn resolve_field(
    master: &Cell,
    update: &Cell,
    policy: ConflictPolicy,
) -> (MergedCell, Option<Resolution>) {
    if update.is_empty() {
        return (MergedCell::from_master(master), None);
    }
    if master.is_empty() {
        return (MergedCell::from_update(update), Some(Resolution::Filled));
    }
    if master.same_value(update) {
        return (MergedCell::from_master(master), None);
    }

    match policy {
        ConflictPolicy::UpdateWins => (MergedCell::from_update(update), Some(Resolution::TookUpdate)),
        ConflictPolicy::MasterWins => (MergedCell::from_master(master), Some(Resolution::KeptMaster)),
        ConflictPolicy::FlagOnly => (MergedCell::from_master(master), Some(Resolution::Flagged)),
    }
}

/// Master row with no counterpart: master values, update-only columns empty.
pub fn master_only_row(master: &Row, correspondence: &ColumnCorrespondence) -> ReconciledRow {
    let cells = correspondence
        .columns
        .iter()
        .map(|c| match c.master {
            Some(m) => MergedCell::from_master(master.get(m)),
            None => MergedCell::absent(),
        })
        .collect();
    ReconciledRow::new(RowClass::MasterOnly, cells)
}

/// Matched pair held back by the recency guard: master values throughout,
/// with every non-empty update value that differs audited as `Stale`.
pub fn stale_row(master: &Row, update: &Row, correspondence: &ColumnCorrespondence) -> ReconciledRow {
    let mut row = master_only_row(master, correspondence);
    row.class = RowClass::Matched;
    row.stale = true;

    for (idx, column) in correspondence.columns.iter().enumerate() {
        let (Some(m), Some(u)) = (column.master, column.update) else {
            continue;
        };
        let (m_cell, u_cell) = (master.get(m), update.get(u));
        if u_cell.is_empty() || m_cell.same_value(u_cell) {
            continue;
        }
        row.conflicts.push(FieldConflict {
            column: column.header.clone(),
            column_index: idx,
            master: m_cell.clone(),
            update: u_cell.clone(),
            resolution: Resolution::Stale,
        });
    }
    row
}

/// Update row with no counterpart: update values, master-only columns empty.
pub fn update_only_row(update: &Row, correspondence: &ColumnCorrespondence) -> ReconciledRow {
    let cells = correspondence
        .columns
        .iter()
        .map(|c| match c.update {
            Some(u) => MergedCell::from_update(update.get(u)),
            None => MergedCell::absent(),
        })
        .collect();
    ReconciledRow::new(RowClass::UpdateOnly, cells)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::align::align;
    use crate::model::ValueSource;

    fn corr(master: &[&str], update: &[&str]) -> ColumnCorrespondence {
        let m: Vec<String> = master.iter().map(|s| s.to_string()).collect();
        let u: Vec<String> = update.iter().map(|s| s.to_string()).collect();
        align(&m, &u, &BTreeMap::new(), &[]).unwrap()
    }

    fn row(values: &[&str]) -> Row {
        Row::new(values.iter().map(|v| Cell::text(*v)).collect())
    }

    #[test]
    fn update_wins_adopts_and_records() {
        let c = corr(&["id", "email"], &["id", "email"]);
        let r = reconcile(&row(&["1", "old@x.com"]), &row(&["1", "new@x.com"]), &c, ConflictPolicy::UpdateWins);

        assert_eq!(r.value(1), &Cell::text("new@x.com"));
        assert_eq!(r.cells[1].source, ValueSource::Update);
        assert_eq!(r.conflicts.len(), 1);
        assert_eq!(r.conflicts[0].column, "email");
        assert_eq!(r.conflicts[0].master, Cell::text("old@x.com"));
        assert_eq!(r.conflicts[0].resolution, Resolution::TookUpdate);
        assert!(!r.needs_review);
    }

    #[test]
    fn master_wins_keeps_and_records() {
        let c = corr(&["id", "email"], &["id", "email"]);
        let r = reconcile(&row(&["1", "old@x.com"]), &row(&["1", "new@x.com"]), &c, ConflictPolicy::MasterWins);

        assert_eq!(r.value(1), &Cell::text("old@x.com"));
        assert_eq!(r.cells[1].source, ValueSource::Master);
        assert_eq!(r.conflicts[0].resolution, Resolution::KeptMaster);
        assert_eq!(r.conflicts[0].update, Cell::text("new@x.com"));
    }

    #[test]
    fn flag_only_keeps_master_and_marks_review() {
        let c = corr(&["id", "email"], &["id", "email"]);
        let r = reconcile(&row(&["1", "old@x.com"]), &row(&["1", "new@x.com"]), &c, ConflictPolicy::FlagOnly);

        assert_eq!(r.value(1), &Cell::text("old@x.com"));
        assert_eq!(r.conflicts[0].resolution, Resolution::Flagged);
        assert!(r.needs_review);
    }

    #[test]
    fn empty_update_never_erases() {
        let c = corr(&["id", "email"], &["id", "email"]);
        for policy in [ConflictPolicy::UpdateWins, ConflictPolicy::MasterWins, ConflictPolicy::FlagOnly] {
            let r = reconcile(&row(&["1", "keep@x.com"]), &row(&["1", ""]), &c, policy);
            assert_eq!(r.value(1), &Cell::text("keep@x.com"));
            assert!(r.conflicts.is_empty());
        }
    }

    #[test]
    fn empty_master_is_filled_under_every_policy() {
        let c = corr(&["id", "email"], &["id", "email"]);
        for policy in [ConflictPolicy::UpdateWins, ConflictPolicy::MasterWins, ConflictPolicy::FlagOnly] {
            let r = reconcile(&row(&["2", ""]), &row(&["2", "b@x.com"]), &c, policy);
            assert_eq!(r.value(1), &Cell::text("b@x.com"));
            assert_eq!(r.conflicts.len(), 1);
            assert_eq!(r.conflicts[0].resolution, Resolution::Filled);
            assert!(!r.needs_review);
        }
    }

    #[test]
    fn normalized_equal_values_are_not_conflicts() {
        let c = corr(&["id", "name", "qty"], &["id", "name", "qty"]);
        let master = Row::new(vec![Cell::text("1"), Cell::text("Bob Smith"), Cell::number(5.0)]);
        let update = Row::new(vec![Cell::text("1"), Cell::text("  bob   smith"), Cell::text("5.0")]);
        let r = reconcile(&master, &update, &c, ConflictPolicy::UpdateWins);

        assert!(r.conflicts.is_empty());
        assert_eq!(r.value(1), &Cell::text("Bob Smith"));
        assert_eq!(r.value(2), &Cell::number(5.0));
    }

    #[test]
    fn typed_difference_is_a_conflict() {
        let c = corr(&["id", "active"], &["id", "active"]);
        let master = Row::new(vec![Cell::text("1"), Cell::boolean(true)]);
        let update = Row::new(vec![Cell::text("1"), Cell::text("yes")]);
        let r = reconcile(&master, &update, &c, ConflictPolicy::UpdateWins);
        assert_eq!(r.conflicts.len(), 1);
    }

    #[test]
    fn unmatched_columns_follow_their_side() {
        let c = corr(&["id", "notes"], &["id", "phone"]);
        let r = reconcile(&row(&["1", "vip"]), &row(&["1", "555"]), &c, ConflictPolicy::UpdateWins);

        assert_eq!(r.value(1), &Cell::text("vip"));
        assert_eq!(r.cells[1].source, ValueSource::Master);
        assert_eq!(r.value(2), &Cell::text("555"));
        assert_eq!(r.cells[2].source, ValueSource::Update);
        assert!(r.conflicts.is_empty());
        assert!(!r.changed_master());
    }

    #[test]
    fn stale_row_keeps_master_and_audits_held_back_values() {
        let c = corr(&["id", "role", "phone", "city"], &["id", "role", "phone", "city"]);
        let r = stale_row(
            &row(&["1", "intern", "", "Oulu"]),
            &row(&["1", "engineer", "0401234567", "oulu"]),
            &c,
        );

        assert_eq!(r.class, RowClass::Matched);
        assert!(r.stale);
        assert_eq!(r.values(), row(&["1", "intern", "", "Oulu"]).cells);
        assert!(r.cells.iter().all(|cell| cell.source == ValueSource::Master));

        let audited: Vec<(&str, &Cell)> = r.conflicts.iter().map(|c| (c.column.as_str(), &c.update)).collect();
        assert_eq!(audited, vec![("role", &Cell::text("engineer")), ("phone", &Cell::text("0401234567"))]);
        assert!(r.conflicts.iter().all(|c| c.resolution == Resolution::Stale));
        assert!(!r.changed_master());
        assert!(!r.needs_review);
    }

    #[test]
    fn only_rows_fill_the_other_side_with_absent() {
        let c = corr(&["id", "notes"], &["id", "phone"]);

        let m = master_only_row(&row(&["1", "vip"]), &c);
        assert_eq!(m.class, RowClass::MasterOnly);
        assert_eq!(m.values(), vec![Cell::text("1"), Cell::text("vip"), Cell::empty()]);
        assert_eq!(m.cells[2].source, ValueSource::Absent);

        let u = update_only_row(&row(&["9", "555"]), &c);
        assert_eq!(u.class, RowClass::UpdateOnly);
        assert_eq!(u.values(), vec![Cell::text("9"), Cell::empty(), Cell::text("555")]);
        assert_eq!(u.cells[1].source, ValueSource::Absent);
    }
}
