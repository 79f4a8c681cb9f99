//! Durable, append-only storage for named records.
//!
//! Records live in a JSON-lines file: one `{"id":N,"name":"..."}` object per
//! line, in insertion order. The whole file is loaded when the store is opened
//! and every insert appends exactly one line.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Identifier assigned by the store when a record is inserted.
pub type RecordId = u64;

/// One stored name together with its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
}

/// Append-only record store backed by a single file.
///
/// The worker opens one `RecordStore` at startup and keeps it for the life of
/// the process. Identifiers start at 1 and grow by one per insert; there is no
/// update or delete.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    file: File,
    records: Vec<Record>,
}

impl RecordStore {
    /// Opens the store at `path`, creating the file (and its parent directory)
    /// when it does not exist yet.
    ///
    /// Opening is idempotent, so it is safe to call on every worker start.
    /// A trailing line without its newline is a torn append and is cut off.
    /// Fails if a complete line is malformed or identifiers are not strictly
    /// increasing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .with_context(|| format!("failed to open record store {}", path.display()))?;

        let records = load_records(&file, &path)?;
        Ok(Self {
            path,
            file,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record for `name` and returns its new identifier.
    ///
    /// The line is flushed and synced before returning, so a successful insert
    /// survives a worker restart.
    pub fn insert(&mut self, name: &str) -> Result<RecordId> {
        let id = self.records.last().map_or(1, |record| record.id + 1);
        let record = Record {
            id,
            name: name.to_string(),
        };

        let mut line = serde_json::to_vec(&record).context("failed to encode record")?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;

        self.records.push(record);
        Ok(id)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// All names, oldest first.
    pub fn list_all(&self) -> Vec<String> {
        self.records.iter().map(|record| record.name.clone()).collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

fn load_records(file: &File, path: &Path) -> Result<Vec<Record>> {
    let mut contents = Vec::new();
    (&*file)
        .read_to_end(&mut contents)
        .with_context(|| format!("failed to read {}", path.display()))?;

    // Every insert ends in a newline, so anything after the last one is an
    // append that never completed and was never acknowledged.
    let complete = contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |end| end + 1);
    if complete < contents.len() {
        warn!(
            path = %path.display(),
            dropped_bytes = contents.len() - complete,
            "truncating incomplete trailing record"
        );
        file.set_len(complete as u64)
            .with_context(|| format!("failed to truncate {}", path.display()))?;
    }

    let mut records: Vec<Record> = Vec::new();
    for (index, line) in contents[..complete].split(|byte| *byte == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record: Record = serde_json::from_slice(line)
            .with_context(|| format!("{}:{}: malformed record", path.display(), index + 1))?;
        if let Some(previous) = records.last() {
            ensure!(
                record.id > previous.id,
                "{}:{}: record id {} does not follow {}",
                path.display(),
                index + 1,
                record.id,
                previous.id
            );
        }
        records.push(record);
    }
    Ok(records)
}
