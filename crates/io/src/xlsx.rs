// Excel import (xlsx, xlsm, xls, xlsb, ods) and export (xlsx only)
//
// Import reads one sheet into a Document. Export writes the merged table with
// typed cells and optional provenance highlighting.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use sheetmerge_recon::cell::{datetime_to_excel_serial, excel_serial_to_datetime, DATE_FORMAT, DATETIME_FORMAT};
use sheetmerge_recon::model::{MergedCell, Resolution, ValueSource};
use sheetmerge_recon::{Cell, CellValue, Document, MergeResult, ReconciledRow, Row};

use crate::IoError;

/// Update-sourced values.
pub const UPDATE_FILL: u32 = 0xC6EFCE;
/// Master value replaced by a differing update value.
pub const TOOK_UPDATE_FILL: u32 = 0xFFEB9C;
/// Divergence left for review.
pub const FLAGGED_FILL: u32 = 0xF8CBAD;
/// Run-date stamp.
pub const STAMPED_FILL: u32 = 0xDDEBF7;

pub const DEFAULT_SHEET_NAME: &str = "Merged";

pub fn import(path: &Path, sheet: Option<&str>) -> Result<Document, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .or_else(|| sheet_names.iter().find(|n| n.eq_ignore_ascii_case(wanted)))
            .cloned()
            .ok_or_else(|| IoError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
                available: sheet_names.clone(),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IoError::Empty { path: path.to_path_buf() })?,
    };

    let range = workbook.worksheet_range(&name).map_err(|e| IoError::Parse {
        path: path.to_path_buf(),
        message: format!("sheet '{name}': {e}"),
    })?;
    log::debug!("{}: reading sheet '{name}' ({:?})", path.display(), range.get_size());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in range.rows() {
        let cells: Vec<Cell> = record.iter().map(convert).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        match headers {
            None => headers = Some(cells.iter().map(|c| c.display().trim().to_string()).collect()),
            Some(ref h) => rows.push(Row::new(cells.into_iter().take(h.len()).collect())),
        }
    }

    let headers = headers.ok_or_else(|| IoError::Empty { path: path.to_path_buf() })?;
    Ok(Document::new(headers, rows))
}

/// Map a calamine value to a cell. Date serials use the 1900 date system.
fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::empty(),
        Data::String(s) => Cell::text(s.as_str()),
        Data::Float(n) => Cell::number(*n),
        Data::Int(n) => Cell::number(*n as f64),
        Data::Bool(b) => Cell::boolean(*b),
        Data::Error(e) => Cell::text(e.to_string()),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(value) => Cell::datetime(value),
            None => Cell::number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}

/// Export options for the merged workbook.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub highlight: bool,
    pub sheet_name: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            highlight: true,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

pub fn export(result: &MergeResult, path: &Path, options: &WriteOptions) -> Result<(), IoError> {
    let write_err = |e: XlsxError| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&options.sheet_name).map_err(write_err)?;

    let header_format = Format::new().set_bold();
    for (col, header) in result.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .map_err(write_err)?;
    }
    worksheet.set_freeze_panes(1, 0).map_err(write_err)?;

    for (i, row) in result.rows.iter().enumerate() {
        let row32 = (i + 1) as u32;
        for (col, cell) in row.cells.iter().enumerate() {
            let fill = if options.highlight { fill_for(row, col, cell) } else { None };
            write_cell(worksheet, row32, col as u16, &cell.value, fill).map_err(write_err)?;
        }
    }

    workbook.save(path).map_err(write_err)
}

/// Highlight colour for one merged cell, strongest signal first.
fn fill_for(row: &ReconciledRow, col: usize, cell: &MergedCell) -> Option<u32> {
    if cell.source == ValueSource::Stamped {
        return Some(STAMPED_FILL);
    }
    match row.conflict_at(col).map(|c| c.resolution) {
        Some(Resolution::Flagged) => return Some(FLAGGED_FILL),
        Some(Resolution::TookUpdate) => return Some(TOOK_UPDATE_FILL),
        _ => {}
    }
    (cell.source == ValueSource::Update && !cell.value.is_empty()).then_some(UPDATE_FILL)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    fill: Option<u32>,
) -> Result<(), XlsxError> {
    let mut format = Format::new();
    if let Some(rgb) = fill {
        format = format.set_background_color(Color::RGB(rgb));
    }

    match &cell.value {
        CellValue::Empty => {
            if fill.is_some() {
                worksheet.write_blank(row, col, &format)?;
            }
        }
        CellValue::Text(s) => {
            worksheet.write_string_with_format(row, col, s, &format)?;
        }
        CellValue::Number(n) => {
            if let Some(ref pattern) = cell.format {
                format = format.set_num_format(pattern);
            }
            worksheet.write_number_with_format(row, col, *n, &format)?;
        }
        CellValue::Bool(b) => {
            worksheet.write_boolean_with_format(row, col, *b, &format)?;
        }
        CellValue::Date(dt) => {
            let pattern = cell.format.clone().unwrap_or_else(|| {
                if dt.time() == chrono::NaiveTime::MIN { DATE_FORMAT } else { DATETIME_FORMAT }.to_string()
            });
            format = format.set_num_format(pattern);
            worksheet.write_number_with_format(row, col, datetime_to_excel_serial(dt), &format)?;
        }
    }
    Ok(())
}
