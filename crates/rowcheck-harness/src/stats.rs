//! Run-wide counters and the final report.
//!
//! ```text
//!  RunStatistics
//!    ├── puts / removes / gets : OpCounter (issued, hits)
//!    ├── passed                : units that passed
//!    └── failures              : FailureKind -> count
//!        │
//!        └── summary(planned) → RunSummary (Display = printed report)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::failure::{FailureKind, HarnessFailure};

// ---------------------------------------------------------------------------
// Per-kind counters
// ---------------------------------------------------------------------------

/// The keyed operations whose hit rates are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyedKind {
    Put,
    Remove,
    Get,
}

impl KeyedKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Put => "Puts",
            Self::Remove => "Removes",
            Self::Get => "Gets",
        }
    }
}

/// Issued and hit counts for one keyed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounter {
    pub issued: u64,
    pub hits: u64,
}

impl OpCounter {
    pub fn record(&mut self, hit: bool) {
        self.issued += 1;
        if hit {
            self.hits += 1;
        }
    }

    #[must_use]
    pub const fn misses(self) -> u64 {
        self.issued - self.hits
    }

    /// `hits / issued * 100`, or `None` when nothing was issued.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(self) -> Option<f64> {
        (self.issued > 0).then(|| self.hits as f64 / self.issued as f64 * 100.0)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn miss_rate(self) -> Option<f64> {
        (self.issued > 0).then(|| self.misses() as f64 / self.issued as f64 * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Counters accumulated over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub puts: OpCounter,
    pub removes: OpCounter,
    pub gets: OpCounter,
    pub passed: u64,
    pub failures: BTreeMap<FailureKind, u64>,
}

impl RunStatistics {
    pub fn record_keyed(&mut self, kind: KeyedKind, hit: bool) {
        self.counter_mut(kind).record(hit);
    }

    pub fn record_pass(&mut self) {
        self.passed += 1;
    }

    pub fn record_failure(&mut self, failure: &HarnessFailure) {
        *self.failures.entry(failure.kind()).or_insert(0) += 1;
    }

    #[must_use]
    pub const fn counter(&self, kind: KeyedKind) -> OpCounter {
        match kind {
            KeyedKind::Put => self.puts,
            KeyedKind::Remove => self.removes,
            KeyedKind::Get => self.gets,
        }
    }

    fn counter_mut(&mut self, kind: KeyedKind) -> &mut OpCounter {
        match kind {
            KeyedKind::Put => &mut self.puts,
            KeyedKind::Remove => &mut self.removes,
            KeyedKind::Get => &mut self.gets,
        }
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failures.values().sum()
    }

    /// Freeze into a report. `planned` is the expected unit count for the
    /// whole run, i.e. slots per table times tables.
    #[must_use]
    pub fn summary(&self, suite: &str, seed: u64, planned: u64) -> RunSummary {
        RunSummary {
            suite: suite.to_owned(),
            seed,
            puts: self.puts,
            removes: self.removes,
            gets: self.gets,
            passed: self.passed,
            planned,
            failures: self.failures.clone(),
            pass_percentage: pass_percentage(self.passed, planned),
        }
    }
}

/// `ceil(passed / planned * 100)`, or `None` when nothing was planned.
#[must_use]
pub fn pass_percentage(passed: u64, planned: u64) -> Option<u32> {
    if planned == 0 {
        return None;
    }
    let scaled = u128::from(passed) * 100;
    let pct = scaled.div_ceil(u128::from(planned));
    Some(u32::try_from(pct).unwrap_or(u32::MAX))
}

// ---------------------------------------------------------------------------
// Final report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub suite: String,
    pub seed: u64,
    pub puts: OpCounter,
    pub removes: OpCounter,
    pub gets: OpCounter,
    pub passed: u64,
    pub planned: u64,
    pub failures: BTreeMap<FailureKind, u64>,
    pub pass_percentage: Option<u32>,
}

impl RunSummary {
    /// The closing line, e.g. `[M1 PASSED 100% OF UNIT TESTS]`.
    #[must_use]
    pub fn verdict_line(&self) -> String {
        match self.pass_percentage {
            Some(p) => format!("[{} PASSED {p}% OF UNIT TESTS]", self.suite),
            None => format!("[{} PASSED undefined OF UNIT TESTS]", self.suite),
        }
    }
}

fn write_counter(f: &mut fmt::Formatter<'_>, kind: KeyedKind, c: OpCounter) -> fmt::Result {
    match (c.hit_rate(), c.miss_rate()) {
        (Some(hit), Some(miss)) => writeln!(
            f,
            "{}: {} ({hit:.0}% Hit, {miss:.0}% Miss)",
            kind.label(),
            group_thousands(c.issued)
        ),
        _ => writeln!(
            f,
            "{}: {} (undefined Hit, undefined Miss)",
            kind.label(),
            group_thousands(c.issued)
        ),
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Seed: {}", self.seed)?;
        write_counter(f, KeyedKind::Put, self.puts)?;
        write_counter(f, KeyedKind::Remove, self.removes)?;
        write_counter(f, KeyedKind::Get, self.gets)?;
        if !self.failures.is_empty() {
            let parts: Vec<String> = self
                .failures
                .iter()
                .map(|(kind, n)| format!("{kind} {}", group_thousands(*n)))
                .collect();
            writeln!(f, "Failures: {}", parts.join(", "))?;
        }
        f.write_str(&self.verdict_line())
    }
}

/// `1234567` -> `"1,234,567"`.
#[must_use]
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
