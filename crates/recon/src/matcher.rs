use crate::keys::KeyIndex;
use crate::model::{MatchOutput, MatchedPair, OnlyReason, OnlyRow};

/// Pair master and update rows by exact RecordKey.
///
/// Only the first row per key on each side is eligible. Later duplicates and
/// keyless rows go to their side's "-only" list with the reason attached.
/// Every row of both documents lands in exactly one output list; each list is
/// in document order (matched pairs in master order).
pub fn match_keys(master: &KeyIndex, update: &KeyIndex) -> MatchOutput {
    let mut out = MatchOutput::default();

    for (i, key) in master.row_keys.iter().enumerate() {
        let Some(key) = key else {
            out.master_only.push(OnlyRow { row: i, key: None, reason: OnlyReason::Keyless });
            continue;
        };
        if master.first_row(key) != Some(i) {
            out.master_only.push(OnlyRow {
                row: i,
                key: Some(key.clone()),
                reason: OnlyReason::DuplicateKey,
            });
            continue;
        }
        match update.first_row(key) {
            Some(j) => out.matched.push(MatchedPair {
                master_row: i,
                update_row: j,
                key: key.clone(),
            }),
            None => out.master_only.push(OnlyRow {
                row: i,
                key: Some(key.clone()),
                reason: OnlyReason::NoMatch,
            }),
        }
    }

    for (j, key) in update.row_keys.iter().enumerate() {
        let Some(key) = key else {
            out.update_only.push(OnlyRow { row: j, key: None, reason: OnlyReason::Keyless });
            continue;
        };
        if update.first_row(key) != Some(j) {
            out.update_only.push(OnlyRow {
                row: j,
                key: Some(key.clone()),
                reason: OnlyReason::DuplicateKey,
            });
        } else if master.first_row(key).is_none() {
            out.update_only.push(OnlyRow {
                row: j,
                key: Some(key.clone()),
                reason: OnlyReason::NoMatch,
            });
        }
        // otherwise already paired above
    }

    out
}
