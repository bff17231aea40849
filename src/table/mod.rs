//! CSV table access layer: header-aware, delimiter-configurable read,
//! write and update primitives over delimited text files.
//!
//! Every mutation is a whole-file rewrite through a temp file and an
//! atomic rename; rows vary in byte length once quoting and UTF-8 are
//! involved, so there is no safe in-place patch. At the expected scale
//! (a few thousand rows) the O(n) rewrite is the correctness trade-off.

pub mod bom;
pub mod lock;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::ServiceError;
pub use lock::LedgerLock;

/// Delimiter configuration for a table file. The ledger contract is
/// `;`-delimited and `"`-quoted; quotes inside a quoted field are
/// doubled. Reader and writer share the exact same configuration so the
/// round trip is lossless for every field value.
#[derive(Clone, Copy, Debug)]
pub struct TableOptions {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
        }
    }
}

impl TableOptions {
    fn reader(&self, data: &[u8]) -> csv::Reader<std::io::Cursor<Vec<u8>>> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(true)
            .has_headers(false)
            .from_reader(std::io::Cursor::new(data.to_vec()))
    }

    fn writer(&self) -> csv::Writer<Vec<u8>> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(true)
            .from_writer(Vec::new())
    }
}

/// One parsed row with its 1-based line number in the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub line_number: u64,
    pub fields: Vec<String>,
}

/// Result of reading a table file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableData {
    pub header: Option<Vec<String>>,
    pub rows: Vec<TableRow>,
}

impl TableData {
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

/// Combinator for [`filter_rows`] criteria.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOp {
    All,
    Any,
}

/// Reads a delimited file into rows. Blank lines are skipped; when
/// `min_columns` is given, rows with fewer fields are skipped as well
/// (tolerance for hand-edited files). A missing file is an explicit
/// `NotFound`, never a panic.
pub fn read_table(
    path: &Path,
    has_header: bool,
    min_columns: Option<usize>,
    options: &TableOptions,
) -> Result<TableData, ServiceError> {
    if !path.is_file() {
        return Err(ServiceError::NotFound(format!(
            "table file {} does not exist",
            path.display()
        )));
    }

    let raw = fs::read(path)?;
    let content = bom::strip_boms(&raw);
    let mut reader = options.reader(content);

    let mut data = TableData::default();
    let mut first = has_header;
    for result in reader.records() {
        let record = result?;
        let line_number = record.position().map(|p| p.line()).unwrap_or(0);
        let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();

        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if first {
            data.header = Some(fields);
            first = false;
            continue;
        }
        if let Some(min) = min_columns {
            if fields.len() < min {
                debug!(line = line_number, width = fields.len(), "Skipping short row");
                continue;
            }
        }
        data.rows.push(TableRow {
            line_number,
            fields,
        });
    }
    Ok(data)
}

/// Writes rows (and an optional header) to a delimited file.
///
/// Overwrite mode always goes through a temp file and an atomic rename.
/// Append mode re-reads the current content and rewrites the whole file
/// the same way, holding the file's advisory lock so concurrent appends
/// cannot discard each other; the header is only emitted when the file
/// is being created. `with_bom` normalizes the output to exactly one
/// leading BOM.
pub fn write_table(
    path: &Path,
    header: Option<&[String]>,
    rows: &[Vec<String>],
    mode: WriteMode,
    with_bom: bool,
    options: &TableOptions,
) -> Result<(), ServiceError> {
    // Append is a read-modify-write span of its own; overwrite callers
    // that need a lock already hold one across their wider span.
    let _lock = match mode {
        WriteMode::Append => Some(LedgerLock::acquire(path)?),
        WriteMode::Overwrite => None,
    };

    let mut writer = options.writer();
    let existing = match mode {
        WriteMode::Append if path.is_file() => fs::read(path)?,
        _ => Vec::new(),
    };

    if existing.is_empty() {
        if let Some(header) = header {
            writer.write_record(header)?;
        }
    }
    for row in rows {
        writer.write_record(row)?;
    }
    let encoded = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let mut content = bom::strip_boms(&existing).to_vec();
    content.extend_from_slice(&encoded);
    let content = if with_bom {
        bom::ensure_single_bom(&content)
    } else {
        content
    };

    atomic_write(path, &content)
}

/// Replaces `path` atomically: write a sibling temp file, then rename it
/// over the target.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ServiceError::Io(e.error))?;
    Ok(())
}

/// Reads the whole table, applies `updates` (column index, new value) to
/// every row whose `match_column` equals `match_value`, and rewrites the
/// file. Short rows are padded with empty strings before updating.
/// Returns the number of rows updated; zero matches is an error, so a
/// mistyped reference cannot silently rewrite nothing.
pub fn update_by_value(
    path: &Path,
    match_column: usize,
    match_value: &str,
    updates: &[(usize, String)],
    options: &TableOptions,
) -> Result<usize, ServiceError> {
    let _lock = LedgerLock::acquire(path)?;
    let data = read_table(path, true, None, options)?;

    let mut updated = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(data.rows.len());
    for row in &data.rows {
        let mut fields = row.fields.clone();
        if fields.get(match_column).map(String::as_str) == Some(match_value) {
            for (idx, value) in updates {
                if fields.len() <= *idx {
                    fields.resize(*idx + 1, String::new());
                }
                fields[*idx] = value.clone();
            }
            updated += 1;
        }
        rows.push(fields);
    }

    if updated == 0 {
        return Err(ServiceError::NotFound(format!(
            "no row matched {match_value:?} in column {match_column} of {}",
            path.display()
        )));
    }

    write_table(
        path,
        data.header.as_deref(),
        &rows,
        WriteMode::Overwrite,
        true,
        options,
    )?;
    info!(file = %path.display(), updated, "Rewrote table after targeted update");
    Ok(updated)
}

/// Copies `path` into `backup_dir` under a timestamp-suffixed name,
/// creating the directory if needed. Returns the backup path.
pub fn create_backup(path: &Path, backup_dir: &Path) -> Result<PathBuf, ServiceError> {
    if !path.is_file() {
        return Err(ServiceError::NotFound(format!(
            "cannot back up missing file {}",
            path.display()
        )));
    }
    fs::create_dir_all(backup_dir)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("backup");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("{stem}_{stamp}.{ext}"));

    fs::copy(path, &backup_path)?;
    info!(from = %path.display(), to = %backup_path.display(), "Created backup");
    Ok(backup_path)
}

/// In-memory filtering over already-read data: keeps rows whose fields
/// satisfy all (`FilterOp::All`) or any (`FilterOp::Any`) of the
/// (column, expected value) criteria.
pub fn filter_rows<'a>(
    data: &'a TableData,
    criteria: &[(usize, String)],
    op: FilterOp,
) -> Vec<&'a TableRow> {
    data.rows
        .iter()
        .filter(|row| {
            let mut checks = criteria
                .iter()
                .map(|(idx, value)| row.fields.get(*idx).map(String::as_str) == Some(value.as_str()));
            match op {
                FilterOp::All => checks.all(|c| c),
                FilterOp::Any => checks.any(|c| c),
            }
        })
        .collect()
}
