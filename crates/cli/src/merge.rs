//! `sheetmerge merge` / `sheetmerge validate`: config-driven master/update merge.

use std::path::{Path, PathBuf};

use clap::Args;
use sheetmerge_io::{load_document, save_merged, write_report, IoError, WriteOptions};
use sheetmerge_recon::{ConflictPolicy, KeySpec, MergeConfig, MergeError, MergeResult};

use crate::exit_codes::{
    EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_NEEDS_REVIEW, EXIT_READ, EXIT_SCHEMA_MISMATCH, EXIT_USAGE,
    EXIT_WRITE,
};
use crate::CliError;

#[derive(Args, Debug, Default)]
pub struct MergeArgs {
    /// Path to a merge config (.toml). Flags below override its values.
    pub config: Option<PathBuf>,

    /// Master document (csv, tsv, xlsx, xls, xlsb, ods)
    #[arg(long)]
    pub master: Option<PathBuf>,

    /// Update document
    #[arg(long)]
    pub update: Option<PathBuf>,

    /// Key column; repeat for a composite key
    #[arg(long = "key", value_name = "COLUMN")]
    pub keys: Vec<String>,

    /// Conflict policy: update-wins, master-wins or flag-only
    #[arg(long)]
    pub policy: Option<String>,

    /// Worksheet to read from the master workbook
    #[arg(long)]
    pub master_sheet: Option<String>,

    /// Worksheet to read from the update workbook
    #[arg(long)]
    pub update_sheet: Option<String>,

    /// Merged output path (default: <master>_merged.<ext> next to master)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write the JSON report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the merge result as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Merge and report without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Exit 7 and write nothing when duplicate keys, keyless rows or flagged rows exist
    #[arg(long)]
    pub strict: bool,

    /// Do not colour merged cells in xlsx output
    #[arg(long)]
    pub no_highlight: bool,
}

fn merge_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

impl From<MergeError> for CliError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::SchemaMismatch { .. } => merge_err(EXIT_SCHEMA_MISMATCH, err.to_string())
                .with_hint("check the header rows, or map renamed columns under [columns]"),
            MergeError::UnknownKeyColumn { .. } | MergeError::UnalignedKeyColumn { .. } => {
                merge_err(EXIT_INVALID_CONFIG, err.to_string())
                    .with_hint("key columns must exist in both documents (or use key = { master = [...], update = [...] })")
            }
            _ => merge_err(EXIT_INVALID_CONFIG, err.to_string()),
        }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let code = if err.is_write_error() { EXIT_WRITE } else { EXIT_READ };
        let hint = match err {
            IoError::SheetNotFound { .. } => Some("pick a sheet with --master-sheet / --update-sheet".to_string()),
            _ => None,
        };
        CliError { code, message: err.to_string(), hint }
    }
}

pub fn cmd_merge(args: MergeArgs) -> Result<(), CliError> {
    let (mut config, base_dir) = match args.config {
        Some(ref path) => (read_config(path)?, config_dir(path)),
        None => {
            if args.keys.is_empty() {
                return Err(CliError::args("no key column given").with_hint("pass --key COLUMN or a config file"));
            }
            (MergeConfig::new(key_spec(&args.keys)), PathBuf::from("."))
        }
    };

    // Flag overrides
    if !args.keys.is_empty() {
        config.key = key_spec(&args.keys);
    }
    if let Some(ref policy) = args.policy {
        config.policy = policy
            .parse::<ConflictPolicy>()
            .map_err(|e| merge_err(EXIT_USAGE, e.to_string()))?;
    }
    config.validate()?;

    let master_path = args
        .master
        .clone()
        .or_else(|| config.master.as_ref().map(|s| base_dir.join(&s.file)))
        .ok_or_else(|| CliError::args("no master document").with_hint("pass --master or set [master] file"))?;
    let update_path = args
        .update
        .clone()
        .or_else(|| config.update.as_ref().map(|s| base_dir.join(&s.file)))
        .ok_or_else(|| CliError::args("no update document").with_hint("pass --update or set [update] file"))?;
    if master_path == update_path && args.master_sheet == args.update_sheet {
        return Err(CliError::args("master and update are the same document"));
    }

    let master_sheet = args
        .master_sheet
        .clone()
        .or_else(|| config.master.as_ref().and_then(|s| s.sheet.clone()));
    let update_sheet = args
        .update_sheet
        .clone()
        .or_else(|| config.update.as_ref().and_then(|s| s.sheet.clone()));

    log::debug!(
        "merge '{}': master {} (sheet {:?}), update {} (sheet {:?})",
        config.name,
        master_path.display(),
        master_sheet,
        update_path.display(),
        update_sheet
    );
    let master = load_document(&master_path, master_sheet.as_deref())?;
    let update = load_document(&update_path, update_sheet.as_deref())?;

    let result = sheetmerge_recon::run(&config, &master, &update)?;

    if args.json {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| merge_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }
    print_summary(&result);

    if args.strict && result.report.has_review_items() {
        return Err(merge_err(EXIT_NEEDS_REVIEW, "merge needs review; nothing written (--strict)")
            .with_hint("resolve duplicate keys, keyless rows and flagged fields, or drop --strict"));
    }

    if args.dry_run {
        eprintln!("dry run: nothing written");
        return Ok(());
    }

    let output_path = args
        .output
        .clone()
        .or_else(|| config.output.file.as_ref().map(|f| base_dir.join(f)))
        .unwrap_or_else(|| default_output_path(&master_path));
    if output_path == master_path || output_path == update_path {
        return Err(CliError::args(format!(
            "refusing to overwrite input document {}",
            output_path.display()
        )));
    }

    let options = WriteOptions {
        highlight: config.output.highlight && !args.no_highlight,
        ..WriteOptions::default()
    };
    save_merged(&output_path, &result, &options)?;
    eprintln!("wrote {}", output_path.display());

    let report_path = args
        .report
        .clone()
        .or_else(|| config.output.report.as_ref().map(|f| base_dir.join(f)));
    if let Some(ref path) = report_path {
        write_report(path, &result)?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: merge '{}' keyed on {}, policy {}",
        config.name,
        describe_key(&config.key),
        config.policy,
    );
    Ok(())
}

fn read_config(path: &Path) -> Result<MergeConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| merge_err(EXIT_READ, format!("cannot read config {}: {e}", path.display())))?;
    MergeConfig::from_toml(&config_str).map_err(|e| merge_err(EXIT_INVALID_CONFIG, e.to_string()))
}

/// Paths in a config resolve against the config's own directory.
fn config_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn key_spec(keys: &[String]) -> KeySpec {
    match keys {
        [single] => KeySpec::Single(single.clone()),
        many => KeySpec::columns(many),
    }
}

fn describe_key(key: &KeySpec) -> String {
    match key {
        KeySpec::PerSide { master, update } => {
            format!("[{}] / [{}]", master.join(", "), update.join(", "))
        }
        other => format!("[{}]", other.master_columns().join(", ")),
    }
}

/// `<stem>_merged.<ext>` beside the master; non-writable inputs become xlsx.
pub fn default_output_path(master: &Path) -> PathBuf {
    let stem = master
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("master");
    let ext = match master
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => "csv",
        Some("tsv") => "tsv",
        _ => "xlsx",
    };
    master.with_file_name(format!("{stem}_merged.{ext}"))
}

fn print_summary(result: &MergeResult) {
    let r = &result.report;
    eprintln!(
        "merge '{}' ({}): {} rows: {} matched, {} master-only, {} update-only; {} field conflict(s)",
        result.meta.config_name,
        result.meta.policy,
        r.output_rows,
        r.matched,
        r.master_only,
        r.update_only,
        r.field_conflicts,
    );
    if r.stale_updates > 0 || r.stamped > 0 {
        eprintln!(
            "recency: {} stale update(s) skipped ({} value(s) held back), {} row(s) stamped",
            r.stale_updates, r.stale_fields, r.stamped
        );
    }
    if r.duplicate_keys_master + r.duplicate_keys_update > 0 {
        eprintln!(
            "warning: duplicate keys ({} in master, {} in update); only the first occurrence was matched",
            r.duplicate_keys_master, r.duplicate_keys_update,
        );
    }
    if r.keyless_master + r.keyless_update > 0 {
        eprintln!(
            "warning: rows without a key ({} in master, {} in update) were carried over unmatched",
            r.keyless_master, r.keyless_update,
        );
    }
    if r.needs_review > 0 {
        eprintln!("warning: {} row(s) flagged for review", r.needs_review);
    }
    if !r.unmatched_update_columns.is_empty() {
        eprintln!("new columns from update: {}", r.unmatched_update_columns.join(", "));
    }
}
