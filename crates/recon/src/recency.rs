use chrono::NaiveDateTime;

use crate::align::normalize_header;
use crate::cell::Cell;
use crate::config::RecencyConfig;
use crate::error::MergeError;
use crate::model::{ColumnCorrespondence, MergedCell, ReconciledRow, Row, Side, ValueSource};

/// Timestamp guard resolved against the two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyGuard {
    pub update_col: usize,
    pub master_col: usize,
    pub stamp: bool,
}

/// Outcome of the guard for one matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Apply,
    Stale {
        update_ts: Option<NaiveDateTime>,
        master_ts: NaiveDateTime,
    },
}

impl RecencyGuard {
    pub fn resolve(
        config: &RecencyConfig,
        master_headers: &[String],
        update_headers: &[String],
    ) -> Result<Self, MergeError> {
        let find = |headers: &[String], column: &str, side: Side| {
            let name = normalize_header(column);
            headers
                .iter()
                .position(|h| normalize_header(h) == name)
                .ok_or_else(|| MergeError::UnknownRecencyColumn {
                    side,
                    column: column.to_string(),
                })
        };

        Ok(Self {
            update_col: find(update_headers, &config.update_column, Side::Update)?,
            master_col: find(master_headers, &config.master_column, Side::Master)?,
            stamp: config.stamp,
        })
    }

    /// Apply when master has no usable timestamp, or the update's is strictly newer.
    pub fn admit(&self, master: &Row, update: &Row) -> Admission {
        let Some(master_ts) = master.get(self.master_col).as_datetime() else {
            return Admission::Apply;
        };
        let update_ts = update.get(self.update_col).as_datetime();
        match update_ts {
            Some(ts) if ts > master_ts => Admission::Apply,
            _ => Admission::Stale { update_ts, master_ts },
        }
    }

    /// Detach the stamp column from update values so the run date owns it.
    /// The detached update column is reported as unmatched.
    pub fn detach_stamp_column(&self, correspondence: &mut ColumnCorrespondence, update_headers: &[String]) {
        if !self.stamp {
            return;
        }
        let Some(pair) = correspondence
            .columns
            .iter_mut()
            .find(|c| c.master == Some(self.master_col))
        else {
            return;
        };
        if let Some(u) = pair.update.take() {
            let header = update_headers.get(u).cloned().unwrap_or_default();
            log::debug!(
                "update column '{header}' ignored: '{}' is stamped with the run date",
                pair.header
            );
            correspondence.unmatched_update.push(header);
        }
    }

    /// Write `today` into the stamp column of a merged row.
    pub fn apply_stamp(
        &self,
        row: &mut ReconciledRow,
        correspondence: &ColumnCorrespondence,
        today: chrono::NaiveDate,
    ) {
        let Some(pos) = correspondence.position_of_master(self.master_col) else {
            return;
        };
        if let Some(cell) = row.cells.get_mut(pos) {
            *cell = MergedCell {
                value: Cell::date(today),
                source: ValueSource::Stamped,
            };
            row.stamped = true;
        }
    }
}
