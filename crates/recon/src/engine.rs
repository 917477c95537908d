use chrono::NaiveDateTime;

use crate::align::align;
use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::evidence::compute_report;
use crate::keys::{extract_keys, resolve_key_columns};
use crate::matcher::match_keys;
use crate::model::{
    Document, MatchedPair, MergeMeta, MergeResult, OnlyRow, ReconciledRow, Side,
};
use crate::recency::{Admission, RecencyGuard};
use crate::reconcile::{master_only_row, reconcile, stale_row, update_only_row};

/// Merge `update` into `master` per config, stamped with the current local time.
pub fn run(config: &MergeConfig, master: &Document, update: &Document) -> Result<MergeResult, MergeError> {
    run_with_date(config, master, update, chrono::Local::now().naive_local())
}

/// Merge with an explicit run time. Output depends only on the inputs and `now`.
pub fn run_with_date(
    config: &MergeConfig,
    master: &Document,
    update: &Document,
    now: NaiveDateTime,
) -> Result<MergeResult, MergeError> {
    config.validate()?;

    // 1. Schema
    let mut correspondence = align(&master.headers, &update.headers, &config.columns, &config.ignore)?;
    log::debug!(
        "aligned {} column(s); {} master-only, {} update-only",
        correspondence.aligned_count(),
        correspondence.unmatched_master.len(),
        correspondence.unmatched_update.len()
    );

    // 2. Keys
    let key_columns = resolve_key_columns(&config.key, &correspondence, &master.headers, &update.headers)?;
    let guard = match config.recency {
        Some(ref recency) => Some(RecencyGuard::resolve(recency, &master.headers, &update.headers)?),
        None => None,
    };
    if let Some(ref guard) = guard {
        guard.detach_stamp_column(&mut correspondence, &update.headers);
    }

    let master_keys = extract_keys(master, &key_columns.master, key_columns.mode, Side::Master);
    let update_keys = extract_keys(update, &key_columns.update, key_columns.mode, Side::Update);
    for dup in master_keys.duplicates().iter().chain(update_keys.duplicates().iter()) {
        log::warn!(
            "{} document: key '{}' appears {} times (rows {:?}); only the first is matched",
            dup.side,
            dup.key,
            dup.rows.len(),
            dup.rows
        );
    }
    for (side, keyless) in [(Side::Master, &master_keys.keyless), (Side::Update, &update_keys.keyless)] {
        if !keyless.is_empty() {
            log::info!("{side} document: {} row(s) without a key, kept unmatched", keyless.len());
        }
    }

    // 3. Match
    let matches = match_keys(&master_keys, &update_keys);

    // 4. Reconcile + assemble: master order first, then new update rows
    let mut by_master_row: Vec<Option<&MatchedPair>> = vec![None; master.rows.len()];
    for pair in &matches.matched {
        by_master_row[pair.master_row] = Some(pair);
    }
    let mut master_only = matches.master_only.iter().peekable();

    let today = now.date();
    let mut rows: Vec<ReconciledRow> = Vec::with_capacity(master.rows.len() + matches.update_only.len());

    for (i, master_row) in master.rows.iter().enumerate() {
        if let Some(pair) = by_master_row[i] {
            let update_row = &update.rows[pair.update_row];
            let admission = guard
                .as_ref()
                .map(|g| g.admit(master_row, update_row))
                .unwrap_or(Admission::Apply);

            let mut row = match admission {
                Admission::Apply => reconcile(master_row, update_row, &correspondence, config.policy),
                Admission::Stale { update_ts, master_ts } => {
                    log::info!(
                        "key '{}': not updating, update timestamp {} is not newer than master {}",
                        pair.key,
                        update_ts.map(|ts| ts.to_string()).unwrap_or_else(|| "(none)".into()),
                        master_ts
                    );
                    stale_row(master_row, update_row, &correspondence)
                }
            };
            row.key = Some(pair.key.clone());
            row.master_row = Some(i);
            row.update_row = Some(pair.update_row);

            if let Some(ref guard) = guard {
                if guard.stamp && !row.stale && row.changed_master() {
                    guard.apply_stamp(&mut row, &correspondence, today);
                }
            }
            rows.push(row);
        } else if let Some(only) = master_only.next_if(|o| o.row == i) {
            let mut row = master_only_row(master_row, &correspondence);
            tag_only(&mut row, only);
            row.master_row = Some(i);
            rows.push(row);
        }
    }

    for only in &matches.update_only {
        let mut row = update_only_row(&update.rows[only.row], &correspondence);
        tag_only(&mut row, only);
        row.update_row = Some(only.row);
        if let Some(ref guard) = guard {
            if guard.stamp {
                guard.apply_stamp(&mut row, &correspondence, today);
            }
        }
        rows.push(row);
    }

    // 5. Report
    let report = compute_report(&rows, &master_keys, &update_keys, &correspondence);
    log::info!(
        "merged {} row(s): {} matched, {} master-only, {} update-only, {} field conflict(s)",
        report.output_rows,
        report.matched,
        report.master_only,
        report.update_only,
        report.field_conflicts
    );

    Ok(MergeResult {
        meta: MergeMeta {
            config_name: config.name.clone(),
            policy: config.policy,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        },
        headers: correspondence.headers(),
        rows,
        report,
    })
}

fn tag_only(row: &mut ReconciledRow, only: &OnlyRow) {
    row.key = only.key.clone();
    row.reason = Some(only.reason);
}
