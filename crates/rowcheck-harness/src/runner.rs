//! Run orchestration: one [`RunContext`] per table sequence, driven slot by
//! slot by a [`Harness`] that owns the run-wide statistics.
//!
//! ```text
//!  Harness::new(config)
//!    ├── begin_table(schema)        construct subject (bounded, ×100 budget)
//!    ├── audit(ctx, allow)          encapsulation check; invalidates on failure
//!    ├── run_slots(ctx)             one unit per slot
//!    │     ├── shadow update (oracle + fingerprint)
//!    │     ├── guarded subject call (bounded or measured)
//!    │     └── comparison (+ inline size cross-check for keyed ops)
//!    └── finish()                   → RunSummary
//! ```
//!
//! Every unit is independent: a failure is recorded and the next slot runs.
//! The only dependency is on a usable subject, which is absent when
//! construction failed or the audit invalidated it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rowcheck_error::Result;
use rowcheck_types::{Encapsulated, Row, Schema, Table, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::AllowList;
use crate::config::{HarnessConfig, TimeoutBudgets};
use crate::failure::{FailureKind, HarnessFailure, panic_message};
use crate::fingerprint::FingerprintTracker;
use crate::guard::{SharedSubject, bounded, measured, run_isolated};
use crate::oracle::ShadowOracle;
use crate::replay::{ReplayCall, ReplayHeader, ReplayLog};
use crate::rng::{RandomSource, derive_table_seed};
use crate::scheduler::{Operation, Schedule, Slot};
use crate::stats::{KeyedKind, RunStatistics, RunSummary};

const SUBJECT_PREREQUISITE: &str = "constructed subject";

// ---------------------------------------------------------------------------
// Per-table state
// ---------------------------------------------------------------------------

/// Everything scoped to one table's sequence. Created by
/// [`Harness::begin_table`] and dropped when the sequence ends.
pub struct RunContext<T: Table> {
    schema: Schema,
    seed: u64,
    subject: Option<SharedSubject<T>>,
    oracle: ShadowOracle,
    fingerprint: FingerprintTracker,
    rng: RandomSource,
    replay: ReplayLog,
    construction: Option<HarnessFailure>,
}

impl<T: Table> RunContext<T> {
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Seed of this table's randomness source.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The subject, unless construction failed or the audit rejected it.
    #[must_use]
    pub const fn subject(&self) -> Option<&SharedSubject<T>> {
        self.subject.as_ref()
    }

    #[must_use]
    pub const fn oracle(&self) -> &ShadowOracle {
        &self.oracle
    }

    #[must_use]
    pub const fn fingerprint(&self) -> &FingerprintTracker {
        &self.fingerprint
    }

    /// Why construction failed, if it did.
    #[must_use]
    pub const fn construction_failure(&self) -> Option<&HarnessFailure> {
        self.construction.as_ref()
    }

    fn require_subject(&self, check: &str) -> std::result::Result<SharedSubject<T>, HarnessFailure> {
        self.subject
            .clone()
            .ok_or_else(|| HarnessFailure::prerequisite(check, SUBJECT_PREREQUISITE))
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One failed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// `None` for construction and audit.
    pub slot: Option<usize>,
    pub label: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one table sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub seed: u64,
    pub slots: usize,
    pub passed: usize,
    pub failures: Vec<UnitFailure>,
}

impl TableReport {
    fn new<T: Table>(ctx: &RunContext<T>) -> Self {
        Self {
            table: ctx.schema.name().to_owned(),
            seed: ctx.seed,
            slots: 0,
            passed: 0,
            failures: Vec::new(),
        }
    }

    /// Failures at slot positions only.
    pub fn slot_failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.failures.iter().filter(|f| f.slot.is_some())
    }

    #[must_use]
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Drives table sequences and accumulates run-wide statistics.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    budgets: TimeoutBudgets,
    base_seed: u64,
    stats: RunStatistics,
    tables_started: u64,
    planned_tables: Option<u64>,
}

impl Harness {
    /// Validate `config` and fix the base seed, drawing one if needed.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let base_seed = RandomSource::seeded(config.seed).seed();
        info!(
            suite = %config.suite,
            seed = base_seed,
            ops_per_table = config.ops_per_table,
            timeout_ms = config.timeout_ms,
            "harness seeded"
        );
        Ok(Self {
            budgets: config.budgets(),
            config,
            base_seed,
            stats: RunStatistics::default(),
            tables_started: 0,
            planned_tables: None,
        })
    }

    /// Fix the number of tables the pass percentage is measured against.
    /// Without it, the tables actually started are used.
    #[must_use]
    pub const fn with_planned_tables(mut self, tables: u64) -> Self {
        self.planned_tables = Some(tables);
        self
    }

    #[must_use]
    pub const fn base_seed(&self) -> u64 {
        self.base_seed
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Start a table sequence with the subject's own constructor.
    pub fn begin_table<T: Table>(&mut self, schema: Schema) -> RunContext<T> {
        self.begin_table_with(schema, |s: &Schema| T::create(s))
    }

    /// Start a table sequence, building the subject with `factory`.
    ///
    /// Construction runs isolated with the construction budget; a hang or
    /// panic leaves the context without a subject.
    pub fn begin_table_with<T, F>(&mut self, schema: Schema, factory: F) -> RunContext<T>
    where
        T: Table,
        F: FnOnce(&Schema) -> T + Send + 'static,
    {
        self.tables_started += 1;
        let seed = derive_table_seed(self.base_seed, schema.name());
        info!(table = schema.name(), seed, signature = %schema.signature(), "table sequence started");

        let mut replay = self.open_replay(&schema);
        replay.write_header(&ReplayHeader::new(&self.config.suite, seed, &schema));
        replay.record(None, ReplayCall::Construct);

        let for_subject = schema.clone();
        let constructed = run_isolated("construct", self.budgets.construction(), move || {
            Ok(factory(&for_subject))
        });
        let (subject, construction) = match constructed {
            Ok(table) => (Some(Arc::new(Mutex::new(table))), None),
            Err(failure) => {
                warn!(table = schema.name(), failure = %failure, "construction failed");
                self.stats.record_failure(&failure);
                (None, Some(failure))
            }
        };

        RunContext {
            oracle: ShadowOracle::new(schema.primary_index()),
            schema,
            seed,
            subject,
            fingerprint: FingerprintTracker::new(),
            rng: RandomSource::seeded(Some(seed)),
            replay,
            construction,
        }
    }

    fn open_replay(&self, schema: &Schema) -> ReplayLog {
        let Some(dir) = self.config.log_dir.as_deref() else {
            return ReplayLog::disabled();
        };
        match ReplayLog::create(dir, schema.name()) {
            Ok(log) => log,
            Err(err) => {
                warn!(
                    table = schema.name(),
                    error = %err,
                    recoverable = err.is_user_recoverable(),
                    hint = err.suggestion().unwrap_or_default(),
                    "replay log unavailable"
                );
                ReplayLog::disabled()
            }
        }
    }

    /// Audit the subject's retained types. On any violation the subject is
    /// dropped from the context and every later slot fails its prerequisite.
    pub fn audit<T>(
        &mut self,
        ctx: &mut RunContext<T>,
        allow: &AllowList,
    ) -> std::result::Result<(), HarnessFailure>
    where
        T: Table + Encapsulated,
    {
        let outcome = ctx.require_subject("encapsulation audit").and_then(|subject| {
            measured(&*subject, "audit", self.budgets.full_scan(), |t| {
                crate::audit::audit(t as &dyn Encapsulated, allow)
            })
        });
        let outcome = outcome.and_then(|violations| {
            if violations.is_empty() {
                return Ok(());
            }
            let violations: Vec<String> = violations.iter().map(ToString::to_string).collect();
            error!(
                table = ctx.schema.name(),
                violations = %violations.join(", "),
                "forbidden retained types"
            );
            ctx.subject = None;
            Err(HarnessFailure::Encapsulation { violations })
        });
        if let Err(failure) = &outcome {
            self.stats.record_failure(failure);
        }
        outcome
    }

    /// Run every slot of the sequence.
    pub fn run_slots<T: Table>(&mut self, ctx: &mut RunContext<T>) -> TableReport {
        let mut report = TableReport::new(ctx);
        if let Some(failure) = &ctx.construction {
            report.failures.push(UnitFailure {
                slot: None,
                label: "construct".to_owned(),
                kind: failure.kind(),
                message: failure.to_string(),
            });
        }

        let mut schedule = Schedule::new(&ctx.schema, self.config.mix, self.config.ops_per_table);
        while let Some(slot) = schedule.next_slot(&mut ctx.rng) {
            report.slots += 1;
            let label = self.label(ctx, &slot.op);
            match self.run_unit(ctx, &slot) {
                Ok(()) => {
                    report.passed += 1;
                    self.stats.record_pass();
                    debug!(slot = slot.index, label = %label, "unit passed");
                }
                Err(failure) => {
                    warn!(
                        table = ctx.schema.name(),
                        slot = slot.index,
                        operation = slot.op.name(),
                        label = %label,
                        failure = %failure,
                        "unit failed"
                    );
                    self.stats.record_failure(&failure);
                    report.failures.push(UnitFailure {
                        slot: Some(slot.index),
                        label,
                        kind: failure.kind(),
                        message: failure.to_string(),
                    });
                }
            }
        }
        ctx.replay.flush();

        info!(
            table = %report.table,
            seed = report.seed,
            passed = report.passed,
            slots = report.slots,
            "table sequence finished"
        );
        report
    }

    /// Construct, audit, and run one table. The audit always runs; without a
    /// subject it fails its prerequisite and is reported first.
    pub fn run_table<T>(&mut self, schema: Schema, allow: &AllowList) -> TableReport
    where
        T: Table + Encapsulated,
    {
        let mut ctx = self.begin_table::<T>(schema);
        let audited = self.audit(&mut ctx, allow).err();
        let mut report = self.run_slots(&mut ctx);
        if let Some(failure) = audited {
            report.failures.insert(
                0,
                UnitFailure {
                    slot: None,
                    label: "encapsulation audit".to_owned(),
                    kind: failure.kind(),
                    message: failure.to_string(),
                },
            );
        }
        report
    }

    /// Final report. Planned units are slots per table times tables.
    #[must_use]
    pub fn finish(&self) -> RunSummary {
        let tables = self.planned_tables.unwrap_or(self.tables_started);
        let per_table = u64::try_from(self.config.ops_per_table).unwrap_or(u64::MAX);
        let summary = self
            .stats
            .summary(&self.config.suite, self.base_seed, per_table.saturating_mul(tables));
        info!(
            suite = %summary.suite,
            seed = summary.seed,
            passed = summary.passed,
            planned = summary.planned,
            failed = self.stats.failed(),
            "run finished"
        );
        summary
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    /// Run one unit: shadow update, guarded call, comparison.
    ///
    /// [`Self::run_slots`] calls this for every scheduled slot; it is public
    /// so fixed scenarios can be driven without the scheduler.
    pub fn run_unit<T: Table>(
        &mut self,
        ctx: &mut RunContext<T>,
        slot: &Slot,
    ) -> std::result::Result<(), HarnessFailure> {
        let call = slot.op.to_string();
        let subject = ctx.require_subject(&call)?;
        ctx.replay.record(Some(slot.index), ReplayCall::from(&slot.op));
        let single = self.budgets.single();
        let budget = if slot.op.is_full_scan() {
            self.budgets.full_scan()
        } else {
            single
        };

        match &slot.op {
            Operation::TableName => {
                let actual = measured(&*subject, "table_name", single, Table::table_name)?;
                expect_eq("table name", ctx.schema.name(), actual.as_str())
            }
            Operation::ColumnNames => {
                let actual = measured(&*subject, "column_names", single, Table::column_names)?;
                expect_eq("column names", ctx.schema.column_names(), actual.as_slice())
            }
            Operation::ColumnTypes => {
                let actual = measured(&*subject, "column_types", single, Table::column_types)?;
                expect_eq("column types", ctx.schema.column_types(), actual.as_slice())
            }
            Operation::PrimaryIndex => {
                let actual = measured(&*subject, "primary_index", single, Table::primary_index)?;
                expect_eq("primary index", &ctx.schema.primary_index(), &actual)
            }
            Operation::Clear => {
                ctx.oracle.clear();
                ctx.fingerprint.reset();
                bounded(&subject, "clear", budget, |t| {
                    t.clear();
                    Ok(())
                })?;
                check_size(ctx, &subject, &call, single)
            }
            Operation::Iterate => {
                let expected = ctx.oracle.size();
                bounded(&subject, "iterate", budget, move |t| traverse(t, expected))
            }
            Operation::Fingerprint => {
                let expected = ctx.fingerprint.value();
                let actual = bounded(&subject, "fingerprint", budget, |t| Ok(t.fingerprint()))?;
                if actual == expected {
                    Ok(())
                } else {
                    Err(HarnessFailure::off_by(
                        "fingerprint",
                        i64::from(expected),
                        i64::from(actual),
                    ))
                }
            }
            Operation::Put(row) => self.put(ctx, &subject, row.clone(), &call, budget),
            Operation::Remove(key) => self.remove(ctx, &subject, key.clone(), &call, budget),
            Operation::Get(key) => self.get(ctx, &subject, key.clone(), &call, budget),
        }
    }

    fn put<T: Table>(
        &mut self,
        ctx: &mut RunContext<T>,
        subject: &SharedSubject<T>,
        row: Row,
        call: &str,
        budget: Duration,
    ) -> std::result::Result<(), HarnessFailure> {
        let previous = ctx.oracle.put(row.clone());
        let hit = previous.is_some();
        if let Some(previous) = &previous {
            ctx.fingerprint.remove(previous);
        }
        ctx.fingerprint.add(&row);
        self.stats.record_keyed(KeyedKind::Put, hit);

        let key = key_text(&row, ctx.schema.primary_index());
        let returned = bounded(subject, "put", budget, move |t| Ok(t.put(row)))?;
        expect_hit(call, &key, hit, returned)?;
        check_size(ctx, subject, call, budget)
    }

    fn remove<T: Table>(
        &mut self,
        ctx: &mut RunContext<T>,
        subject: &SharedSubject<T>,
        key: Value,
        call: &str,
        budget: Duration,
    ) -> std::result::Result<(), HarnessFailure> {
        let removed = ctx.oracle.remove(&key);
        let hit = removed.is_some();
        if let Some(row) = &removed {
            ctx.fingerprint.remove(row);
        }
        self.stats.record_keyed(KeyedKind::Remove, hit);

        let key_text = key.to_string();
        let returned = bounded(subject, "remove", budget, move |t| {
            Ok(t.remove(&key))
        })?;
        expect_hit(call, &key_text, hit, returned)?;
        check_size(ctx, subject, call, budget)
    }

    fn get<T: Table>(
        &mut self,
        ctx: &mut RunContext<T>,
        subject: &SharedSubject<T>,
        key: Value,
        call: &str,
        budget: Duration,
    ) -> std::result::Result<(), HarnessFailure> {
        let expected = ctx.oracle.get(&key).cloned();
        self.stats.record_keyed(KeyedKind::Get, expected.is_some());

        let key_text = key.to_string();
        let actual = bounded(subject, "get", budget, move |t| Ok(t.get(&key)))?;
        match (&expected, &actual) {
            (Some(e), Some(a)) if e == a => {}
            (None, None) => {}
            (Some(_), _) => {
                return Err(HarnessFailure::mismatch(
                    format!("{call} hit for key {key_text}"),
                    render(expected.as_ref()),
                    render(actual.as_ref()),
                ));
            }
            (None, Some(_)) => {
                return Err(HarnessFailure::mismatch(
                    format!("{call} miss for key {key_text}"),
                    "null",
                    render(actual.as_ref()),
                ));
            }
        }
        check_size(ctx, subject, call, budget)
    }

    /// Diagnostic label: the call, hit or miss for keyed calls, and the
    /// subject's load triple. Drops the triple when the load read fails.
    fn label<T: Table>(&self, ctx: &RunContext<T>, op: &Operation) -> String {
        let call = op.to_string();
        let Some(subject) = ctx.subject.as_ref() else {
            return call;
        };
        let head = match op.key(ctx.schema.primary_index()) {
            Some(key) if ctx.oracle.contains_key(key) => format!("{call} hits"),
            Some(_) => format!("{call} misses"),
            None => call.clone(),
        };
        let load = measured(&**subject, "load_factor", self.budgets.single(), |t| {
            (t.size(), t.capacity(), t.load_factor())
        });
        match load {
            Ok((size, capacity, factor)) => {
                format!("{head} when α={size}/{capacity}={factor:.3}")
            }
            Err(_) => head,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn expect_eq<V>(check: &str, expected: &V, actual: &V) -> std::result::Result<(), HarnessFailure>
where
    V: PartialEq + std::fmt::Debug + ?Sized,
{
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessFailure::mismatch(
            check,
            format!("{expected:?}"),
            format!("{actual:?}"),
        ))
    }
}

fn expect_hit(
    call: &str,
    key: &str,
    expected: bool,
    returned: bool,
) -> std::result::Result<(), HarnessFailure> {
    if expected == returned {
        return Ok(());
    }
    let verb = if expected { "hit" } else { "miss" };
    Err(HarnessFailure::mismatch(
        format!("{call} to {verb} for key {key}"),
        expected,
        returned,
    ))
}

/// Inline size cross-check after a mutating or keyed call.
fn check_size<T: Table>(
    ctx: &RunContext<T>,
    subject: &Mutex<T>,
    after: &str,
    budget: Duration,
) -> std::result::Result<(), HarnessFailure> {
    let actual = measured(subject, "size", budget, Table::size).map_err(|failure| match failure {
        HarnessFailure::Timeout { budget, .. } => {
            HarnessFailure::timeout(format!("size after {after}"), budget)
        }
        other => other,
    })?;
    let expected = ctx.oracle.size();
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessFailure::off_by(
            format!("after {after}, table size"),
            as_i64(expected),
            as_i64(actual),
        ))
    }
}

/// Full traversal through the two cursor primitives, each guarded on its own.
fn traverse<T: Table>(table: &mut T, expected: usize) -> std::result::Result<(), HarnessFailure> {
    let table: &T = table;
    let mut cursor = primitive("cursor", || table.cursor())?;
    let mut produced = 0_usize;
    loop {
        if !primitive("cursor has_next", || cursor.has_next())? {
            break;
        }
        if produced == expected {
            return Err(HarnessFailure::off_by(
                "iterator row count",
                as_i64(expected),
                as_i64(produced + 1),
            ));
        }
        if primitive("cursor next_row", || cursor.next_row())?.is_none() {
            return Err(HarnessFailure::mismatch(
                format!("iterator element {produced}"),
                "a row",
                "null",
            ));
        }
        produced += 1;
    }
    if produced == expected {
        Ok(())
    } else {
        Err(HarnessFailure::off_by(
            "iterator row count",
            as_i64(expected),
            as_i64(produced),
        ))
    }
}

fn primitive<R>(operation: &str, call: impl FnOnce() -> R) -> std::result::Result<R, HarnessFailure> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| HarnessFailure::Panicked {
        operation: operation.to_owned(),
        message: panic_message(payload.as_ref()),
    })
}

fn key_text(row: &Row, primary_index: usize) -> String {
    row.key(primary_index)
        .map_or_else(|| "null".to_owned(), ToString::to_string)
}

fn render(row: Option<&Row>) -> String {
    row.map_or_else(|| "null".to_owned(), ToString::to_string)
}

fn as_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
