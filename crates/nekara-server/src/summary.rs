//! Append-only CSV log with one row per finished run.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use nekara_types::{SessionInfo, SessionRecord};

pub const SUMMARY_HEADER: &str = "Program,Module,Entry,SessionId,Seed,Result,Reason,ElapsedMs,Decisions";

/// Summary log shared by every session of a router.
#[derive(Debug)]
pub struct SummaryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SummaryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first if the file is new or empty.
    pub fn append(&self, info: &SessionInfo, record: &SessionRecord) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let needs_header = !fs::metadata(&self.path).is_ok_and(|m| m.len() > 0);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{SUMMARY_HEADER}")?;
        }
        writeln!(file, "{}", format_row(info, record))
    }
}

/// Formats one CSV row.
pub fn format_row(info: &SessionInfo, record: &SessionRecord) -> String {
    [
        csv_field(&info.program.program),
        csv_field(&info.program.module),
        csv_field(&info.program.entry),
        record.session_id.to_string(),
        record.scheduling_seed.to_string(),
        record.result.to_string(),
        csv_field(&record.reason),
        record.elapsed_ms.to_string(),
        record.num_decisions.to_string(),
    ]
    .join(",")
}

/// Quotes a field if it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
