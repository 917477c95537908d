// CSV/TSV import/export

use std::io::Read;
use std::path::Path;

use sheetmerge_recon::cell::{canonical_number, parse_iso_date, parse_plain_number};
use sheetmerge_recon::{Cell, Document, MergeResult, Row};

use crate::IoError;

pub fn import(path: &Path) -> Result<Document, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = match extension(path).as_deref() {
        Some("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    let document = import_from_string(&content, delimiter).map_err(|message| IoError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    document.ok_or_else(|| IoError::Empty { path: path.to_path_buf() })
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else { break };
        if target <= 1 {
            continue;
        }

        // Consistent lines weighted by field count; more columns wins ties
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Excel-exported CSVs are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let open_err = |e: std::io::Error| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(open_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(open_err)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            decoded.into_owned()
        }
    };
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

/// Parse CSV text. `Ok(None)` when there is no header row.
fn import_from_string(content: &str, delimiter: u8) -> Result<Option<Document>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("line {}: {e}", line + 1))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match headers {
            None => headers = Some(record.iter().map(|h| h.trim().to_string()).collect()),
            Some(ref h) => {
                let extra = overflow(&record, h.len());
                if extra > 0 {
                    let at = record.position().map_or(line as u64 + 1, |p| p.line());
                    log::warn!("line {at}: {extra} field(s) beyond the {} header column(s) dropped", h.len());
                }
                let cells: Vec<Cell> = record.iter().take(h.len()).map(infer_cell).collect();
                rows.push(Row::new(cells));
            }
        }
    }

    Ok(headers.map(|h| Document::new(h, rows)))
}

/// Non-empty fields past the header width.
fn overflow(record: &csv::StringRecord, width: usize) -> usize {
    record.iter().skip(width).filter(|f| !f.trim().is_empty()).count()
}

/// Type a CSV field.
///
/// Numbers are only inferred when the text is already in canonical form, so
/// `5.0`, `+3` or `0401234567` stay text and write back unchanged.
pub fn infer_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::empty();
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Cell::boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Cell::boolean(false);
    }
    if let Some(date) = parse_iso_date(trimmed) {
        return Cell::date(date);
    }
    if let Some(n) = parse_plain_number(trimmed) {
        if canonical_number(n) == trimmed {
            return Cell::number(n);
        }
    }
    Cell::text(field)
}

pub fn export(result: &MergeResult, path: &Path) -> Result<(), IoError> {
    let delimiter = if extension(path).as_deref() == Some("tsv") { b'\t' } else { b',' };
    let write_err = |e: csv::Error| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(write_err)?;

    writer.write_record(&result.headers).map_err(write_err)?;
    for row in &result.rows {
        let record: Vec<String> = row.cells.iter().map(|c| c.value.display()).collect();
        writer.write_record(&record).map_err(write_err)?;
    }

    writer.flush().map_err(|e| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use sheetmerge_recon::CellValue;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAge\tCity\nAlice\t30\tParis\nBob\t25\tLondon\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Name;Address;City\n\"Doe, Jane\";\"123 Main St, Apt 4\";Paris\nBob;\"456 Elm\";London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("email\na@x.com\n"), b',');
    }

    #[test]
    fn test_import_types_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "name;phone;joined;age;active\nAnna;0401234567;2024-05-01;42;TRUE\n").unwrap();

        let doc = import(&path).unwrap();
        assert_eq!(doc.headers, vec!["name", "phone", "joined", "age", "active"]);
        let row = &doc.rows[0];
        assert_eq!(row.get(1), &Cell::text("0401234567"));
        assert!(matches!(row.get(2).value, CellValue::Date(_)));
        assert_eq!(row.get(3), &Cell::number(42.0));
        assert_eq!(row.get(4), &Cell::boolean(true));
    }

    #[test]
    fn test_import_skips_blank_rows_and_trims_long_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        fs::write(&path, "id,name,email\n1,Anna\n,,\n\n2,Ben,b@x.com,extra\n").unwrap();

        let doc = import(&path).unwrap();
        assert_eq!(doc.rows.len(), 2);
        assert!(doc.rows[0].get(2).is_empty());
        assert_eq!(doc.rows[1].cells.len(), 3);
    }

    #[test]
    fn test_overflow_counts_dropped_values() {
        let wide = csv::StringRecord::from(vec!["2", "Ben", "b@x.com", "extra", "", "more"]);
        assert_eq!(overflow(&wide, 3), 2);

        let trailing = csv::StringRecord::from(vec!["1", "Anna", "a@x.com", " "]);
        assert_eq!(overflow(&trailing, 3), 0);
        assert_eq!(overflow(&trailing, 5), 0);
    }

    #[test]
    fn test_import_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Jyväskylä" in Windows-1252
        let mut bytes = b"id,city\n1,Jyv".to_vec();
        bytes.extend_from_slice(&[0xE4, b's', b'k', b'y', b'l', 0xE4, b'\n']);
        fs::write(&path, bytes).unwrap();

        let doc = import(&path).unwrap();
        assert_eq!(doc.rows[0].get(1), &Cell::text("Jyväskylä"));
    }

    #[test]
    fn test_import_strips_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}id,name\n1,Anna\n").unwrap();
        assert_eq!(import(&path).unwrap().headers[0], "id");
    }

    #[test]
    fn test_empty_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "\n\n").unwrap();
        assert!(matches!(import(&path), Err(IoError::Empty { .. })));
    }

    #[test]
    fn test_infer_keeps_non_canonical_numbers_as_text() {
        assert_eq!(infer_cell("5.0"), Cell::text("5.0"));
        assert_eq!(infer_cell("-12.5"), Cell::number(-12.5));
        assert_eq!(infer_cell("false"), Cell::boolean(false));
    }
}
