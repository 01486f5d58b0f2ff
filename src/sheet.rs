// 📄 Sheet clients - the external tabular projection
//
// `SheetClient` is the only thing the synchronizer knows about the outside
// world. A worksheet is a list of rows, a row is a list of cells.
//
// Implementations:
// - CsvWorkbook: one `<worksheet>.csv` file per worksheet in a directory
// - MemorySheet: in-process double, can be switched offline
// - RetryingSheet: bounded retries with backoff around any other client

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub type Row = Vec<String>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Service unreachable or refused the call
    #[error("sheet service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed worksheet {worksheet:?} row {row}: {reason}")]
    Malformed {
        worksheet: String,
        row: usize,
        reason: String,
    },
}

impl SheetError {
    /// Worth retrying: the same call may succeed a moment later.
    pub fn is_transient(&self) -> bool {
        matches!(self, SheetError::Io(_) | SheetError::Unavailable(_))
    }
}

pub trait SheetClient {
    /// All rows of a worksheet, header included. A worksheet that does not
    /// exist yet reads as empty.
    fn read_rows(&mut self, worksheet: &str) -> Result<Vec<Row>, SheetError>;

    /// Replace the whole worksheet with `rows`.
    fn write_rows(&mut self, worksheet: &str, rows: &[Row]) -> Result<(), SheetError>;
}

// ============================================================================
// CSV WORKBOOK
// ============================================================================

pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvWorkbook { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn worksheet_path(&self, worksheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", worksheet))
    }
}

impl SheetClient for CsvWorkbook {
    fn read_rows(&mut self, worksheet: &str) -> Result<Vec<Row>, SheetError> {
        let path = self.worksheet_path(worksheet);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(rows)
    }

    /// Written to a temp file first and renamed over the old one, so a
    /// reader never sees a half-written worksheet.
    fn write_rows(&mut self, worksheet: &str, rows: &[Row]) -> Result<(), SheetError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.worksheet_path(worksheet);
        let tmp = self.dir.join(format!(".{}.csv.tmp", worksheet));

        let written = write_csv(&tmp, rows).and_then(|()| Ok(fs::rename(&tmp, &path)?));
        if written.is_err() && tmp.exists() {
            if let Err(err) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %err, "could not remove temp worksheet");
            }
        }
        written
    }
}

fn write_csv(path: &Path, rows: &[Row]) -> Result<(), SheetError> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// MEMORY SHEET
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemorySheet {
    worksheets: HashMap<String, Vec<Row>>,
    offline: bool,
    writes: usize,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn worksheet(&self, name: &str) -> Option<&[Row]> {
        self.worksheets.get(name).map(Vec::as_slice)
    }

    /// Seed a worksheet as if someone edited the sheet by hand.
    pub fn put_worksheet(&mut self, name: &str, rows: Vec<Row>) {
        self.worksheets.insert(name.to_string(), rows);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn check_online(&self) -> Result<(), SheetError> {
        if self.offline {
            Err(SheetError::Unavailable("memory sheet is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SheetClient for MemorySheet {
    fn read_rows(&mut self, worksheet: &str) -> Result<Vec<Row>, SheetError> {
        self.check_online()?;
        Ok(self.worksheets.get(worksheet).cloned().unwrap_or_default())
    }

    fn write_rows(&mut self, worksheet: &str, rows: &[Row]) -> Result<(), SheetError> {
        self.check_online()?;
        self.worksheets.insert(worksheet.to_string(), rows.to_vec());
        self.writes += 1;
        Ok(())
    }
}

// ============================================================================
// RETRIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Sleep before attempt n is `backoff_ms * (n - 1)`
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt.saturating_sub(1))))
    }
}

/// Retries transient failures of the wrapped client. Permanent errors
/// (malformed data, CSV encoding) are returned immediately.
pub struct RetryingSheet<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: SheetClient> RetryingSheet<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        RetryingSheet { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    fn with_retries<T>(
        &mut self,
        op: &str,
        worksheet: &str,
        mut call: impl FnMut(&mut C) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call(&mut self.inner) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(
                        op,
                        worksheet,
                        attempt,
                        error = %err,
                        "sheet call failed, retrying"
                    );
                    attempt += 1;
                    thread::sleep(self.policy.delay_before(attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<C: SheetClient> SheetClient for RetryingSheet<C> {
    fn read_rows(&mut self, worksheet: &str) -> Result<Vec<Row>, SheetError> {
        self.with_retries("read", worksheet, |client| client.read_rows(worksheet))
    }

    fn write_rows(&mut self, worksheet: &str, rows: &[Row]) -> Result<(), SheetError> {
        self.with_retries("write", worksheet, |client| client.write_rows(worksheet, rows))
    }
}
