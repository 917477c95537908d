use crate::keys::KeyIndex;
use crate::model::{
    ColumnCorrespondence, ConflictRecord, KeylessRecord, MergeReport, ReconciledRow, Resolution,
    RowClass, Side,
};

/// Build the merge report from the assembled rows and the key indexes.
pub fn compute_report(
    rows: &[ReconciledRow],
    master_keys: &KeyIndex,
    update_keys: &KeyIndex,
    correspondence: &ColumnCorrespondence,
) -> MergeReport {
    let mut report = MergeReport {
        master_rows: master_keys.row_keys.len(),
        update_rows: update_keys.row_keys.len(),
        output_rows: rows.len(),
        unmatched_master_columns: correspondence.unmatched_master.clone(),
        unmatched_update_columns: correspondence.unmatched_update.clone(),
        ..MergeReport::default()
    };

    for (output_row, row) in rows.iter().enumerate() {
        match row.class {
            RowClass::Matched => report.matched += 1,
            RowClass::MasterOnly => report.master_only += 1,
            RowClass::UpdateOnly => report.update_only += 1,
        }
        if row.needs_review {
            report.needs_review += 1;
        }
        if row.stale {
            report.stale_updates += 1;
        }
        if row.stamped {
            report.stamped += 1;
        }

        for conflict in &row.conflicts {
            match conflict.resolution {
                Resolution::Filled => report.filled += 1,
                Resolution::Stale => report.stale_fields += 1,
                _ => {}
            }
            report.conflicts.push(ConflictRecord {
                output_row,
                key: row.key.as_ref().map(ToString::to_string),
                column: conflict.column.clone(),
                master: conflict.master.clone(),
                update: conflict.update.clone(),
                resolution: conflict.resolution,
            });
        }
    }
    report.field_conflicts = report.conflicts.len();

    let master_dups = master_keys.duplicates();
    let update_dups = update_keys.duplicates();
    report.duplicate_keys_master = master_dups.len();
    report.duplicate_keys_update = update_dups.len();
    report.duplicates = master_dups.into_iter().chain(update_dups).collect();

    report.keyless_master = master_keys.keyless.len();
    report.keyless_update = update_keys.keyless.len();
    report.keyless = master_keys
        .keyless
        .iter()
        .map(|&row| KeylessRecord { side: Side::Master, row })
        .chain(
            update_keys
                .keyless
                .iter()
                .map(|&row| KeylessRecord { side: Side::Update, row }),
        )
        .collect();

    report
}
