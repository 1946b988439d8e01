//! Replay log: every call made against a subject, as JSON lines.
//!
//! # Wire format
//!
//! The first line is a [`ReplayHeader`]; every following line is a
//! [`ReplayRecord`]:
//!
//! ```text
//! {"schema_version":1,"suite":"M1","table":"m1_table01","seed":88172645463325252,...}
//! {"slot":null,"call":{"call":"construct"}}
//! {"slot":0,"call":{"call":"table_name"}}
//! {"slot":5,"call":{"call":"put","row":[{"text":"a3"},{"integer":0},{"boolean":true}]}}
//! ```
//!
//! Writing is best-effort. A failed write is logged once and the sink is
//! dropped for the rest of the table; the run itself never fails on it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rowcheck_error::{Result, RowcheckError};
use rowcheck_types::{Row, Schema, Table, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scheduler::Operation;

/// Bumped whenever the record layout changes.
pub const REPLAY_SCHEMA_VERSION: u32 = 1;

/// File name suffix for per-table logs.
pub const REPLAY_FILE_SUFFIX: &str = ".replay.jsonl";

// ── Records ─────────────────────────────────────────────────────────────

/// First line of every replay log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayHeader {
    pub schema_version: u32,
    pub suite: String,
    pub table: String,
    /// Seed of this table's randomness source.
    pub seed: u64,
    pub schema: Schema,
    pub harness_version: String,
}

impl ReplayHeader {
    #[must_use]
    pub fn new(suite: &str, seed: u64, schema: &Schema) -> Self {
        Self {
            schema_version: REPLAY_SCHEMA_VERSION,
            suite: suite.to_owned(),
            table: schema.name().to_owned(),
            seed,
            schema: schema.clone(),
            harness_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// One call against the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ReplayCall {
    Construct,
    TableName,
    ColumnNames,
    ColumnTypes,
    PrimaryIndex,
    Clear,
    Put { row: Row },
    Remove { key: Value },
    Get { key: Value },
    Iterate,
    Fingerprint,
}

impl From<&Operation> for ReplayCall {
    fn from(op: &Operation) -> Self {
        match op {
            Operation::TableName => Self::TableName,
            Operation::ColumnNames => Self::ColumnNames,
            Operation::ColumnTypes => Self::ColumnTypes,
            Operation::PrimaryIndex => Self::PrimaryIndex,
            Operation::Clear => Self::Clear,
            Operation::Iterate => Self::Iterate,
            Operation::Fingerprint => Self::Fingerprint,
            Operation::Put(row) => Self::Put { row: row.clone() },
            Operation::Remove(key) => Self::Remove { key: key.clone() },
            Operation::Get(key) => Self::Get { key: key.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Slot index; `None` for calls outside the slot sequence.
    pub slot: Option<usize>,
    pub call: ReplayCall,
}

// ── Sink ────────────────────────────────────────────────────────────────

/// Append-only writer for one table's replay log.
pub struct ReplayLog {
    table: String,
    sink: Option<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ReplayLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayLog")
            .field("table", &self.table)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl ReplayLog {
    /// A log that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            table: String::new(),
            sink: None,
        }
    }

    pub fn to_writer(table: &str, writer: impl Write + Send + 'static) -> Self {
        Self {
            table: table.to_owned(),
            sink: Some(Box::new(writer)),
        }
    }

    /// Create `<dir>/<table>.replay.jsonl`, truncating any previous log.
    pub fn create(dir: &Path, table: &str) -> Result<Self> {
        let path = replay_path(dir, table);
        let file = std::fs::create_dir_all(dir)
            .and_then(|()| File::create(&path))
            .map_err(|_| RowcheckError::CannotOpenLog { path })?;
        Ok(Self::to_writer(table, BufWriter::new(file)))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn write_header(&mut self, header: &ReplayHeader) {
        self.emit(header);
    }

    pub fn record(&mut self, slot: Option<usize>, call: ReplayCall) {
        if self.sink.is_some() {
            self.emit(&ReplayRecord { slot, call });
        }
    }

    pub fn flush(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                self.drop_sink(&err);
            }
        }
    }

    fn emit<S: Serialize>(&mut self, value: &S) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let outcome = serde_json::to_writer(&mut *sink, value)
            .map_err(std::io::Error::from)
            .and_then(|()| sink.write_all(b"\n"));
        if let Err(err) = outcome {
            self.drop_sink(&err);
        }
    }

    fn drop_sink(&mut self, err: &std::io::Error) {
        warn!(
            table = %self.table,
            error = %err,
            "replay log write failed; continuing without it"
        );
        self.sink = None;
    }
}

/// Where [`ReplayLog::create`] writes the log for `table`.
#[must_use]
pub fn replay_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}{REPLAY_FILE_SUFFIX}"))
}

// ── Script (read side) ──────────────────────────────────────────────────

/// A parsed replay log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayScript {
    pub header: ReplayHeader,
    pub records: Vec<ReplayRecord>,
}

/// What one replayed call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub slot: Option<usize>,
    pub call: ReplayCall,
    pub result: String,
}

impl ReplayScript {
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = serde_json::to_string(&self.header).map_err(RowcheckError::serialization)?;
        out.push('\n');
        for rec in &self.records {
            out.push_str(&serde_json::to_string(rec).map_err(RowcheckError::serialization)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_jsonl(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());
        let (header_no, header_line) = lines.next().ok_or_else(|| RowcheckError::ReplayFormat {
            line: 1,
            detail: "missing header".to_owned(),
        })?;
        let header: ReplayHeader =
            serde_json::from_str(header_line).map_err(|err| RowcheckError::ReplayFormat {
                line: header_no + 1,
                detail: err.to_string(),
            })?;
        if header.schema_version != REPLAY_SCHEMA_VERSION {
            return Err(RowcheckError::ReplayFormat {
                line: header_no + 1,
                detail: format!(
                    "unsupported schema_version {} (expected {REPLAY_SCHEMA_VERSION})",
                    header.schema_version
                ),
            });
        }
        let mut records = Vec::new();
        for (no, line) in lines {
            let record = serde_json::from_str(line).map_err(|err| RowcheckError::ReplayFormat {
                line: no + 1,
                detail: err.to_string(),
            })?;
            records.push(record);
        }
        Ok(Self { header, records })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_jsonl(&std::fs::read_to_string(path)?)
    }

    /// Re-execute every call directly against a subject built by `factory`.
    ///
    /// No guards and no oracle: this is the standalone reproduction path, so
    /// a hang or panic in the subject surfaces exactly as it would in user
    /// code. The subject is built at the `construct` record, or before the
    /// first call if the log has none.
    pub fn replay<T, F>(&self, factory: F) -> Vec<ReplayStep>
    where
        T: Table,
        F: FnOnce(&Schema) -> T,
    {
        let mut factory = Some(factory);
        let mut subject: Option<T> = None;
        let mut steps = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if subject.is_none() {
                let Some(build) = factory.take() else { break };
                subject = Some(build(&self.header.schema));
            }
            let Some(table) = subject.as_mut() else { break };
            let result = apply(table, &record.call);
            debug!(slot = ?record.slot, result = %result, "replayed call");
            steps.push(ReplayStep {
                slot: record.slot,
                call: record.call.clone(),
                result,
            });
        }
        steps
    }
}

fn apply<T: Table>(table: &mut T, call: &ReplayCall) -> String {
    match call {
        ReplayCall::Construct => "constructed".to_owned(),
        ReplayCall::TableName => format!("{:?}", table.table_name()),
        ReplayCall::ColumnNames => format!("{:?}", table.column_names()),
        ReplayCall::ColumnTypes => {
            let types: Vec<String> = table.column_types().iter().map(ToString::to_string).collect();
            format!("{types:?}")
        }
        ReplayCall::PrimaryIndex => table.primary_index().to_string(),
        ReplayCall::Clear => {
            table.clear();
            format!("size={}", table.size())
        }
        ReplayCall::Put { row } => table.put(row.clone()).to_string(),
        ReplayCall::Remove { key } => table.remove(key).to_string(),
        ReplayCall::Get { key } => table
            .get(key)
            .map_or_else(|| "null".to_owned(), |row| row.to_string()),
        ReplayCall::Iterate => {
            let mut cursor = table.cursor();
            let mut rows = 0_usize;
            while cursor.has_next() {
                if cursor.next_row().is_none() {
                    break;
                }
                rows += 1;
            }
            format!("{rows} rows")
        }
        ReplayCall::Fingerprint => table.fingerprint().to_string(),
    }
}
