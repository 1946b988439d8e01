//! Each injected fault is caught at exactly the slots it can affect.
//!
//! Failing slots are cross-checked against the schedule, which is a pure
//! function of the table seed.

mod common;

use common::{Faults, Faulty, config, schema};
use rowcheck_harness::logging::init_test_logging;
use rowcheck_harness::rng::derive_table_seed;
use rowcheck_harness::{
    FailureKind, Harness, Operation, OperationMix, RandomSource, Schedule, Slot, TableReport,
};

const SEED: u64 = 20_240_601;
const OPS: usize = 400;

fn run_faulty(name: &str, faults: Faults) -> (TableReport, Vec<Slot>) {
    init_test_logging();
    let mut harness = Harness::new(config(SEED, OPS, 200)).expect("config");
    let mut ctx = harness.begin_table_with(schema(name), Faulty::factory(faults));
    let report = harness.run_slots(&mut ctx);

    let mut rng = RandomSource::seeded(Some(derive_table_seed(SEED, name)));
    let plan = Schedule::new(&schema(name), OperationMix::default(), OPS).collect_all(&mut rng);
    (report, plan)
}

fn failing_slots(report: &TableReport) -> Vec<usize> {
    report.slot_failures().filter_map(|f| f.slot).collect()
}

fn slots_where(plan: &[Slot], pred: impl Fn(&Operation) -> bool) -> Vec<usize> {
    plan.iter().filter(|s| pred(&s.op)).map(|s| s.index).collect()
}

#[test]
fn test_panicking_get_fails_every_get_only() {
    let (report, plan) = run_faulty(
        "panic_get",
        Faults {
            panic_on_get: true,
            ..Faults::default()
        },
    );
    let gets = slots_where(&plan, |op| matches!(op, Operation::Get(_)));
    assert!(!gets.is_empty());
    assert_eq!(failing_slots(&report), gets);
    for failure in report.slot_failures() {
        assert_eq!(failure.kind, FailureKind::UnexpectedPanic);
        assert!(failure.message.contains("bucket index out of range"), "{}", failure.message);
    }
    assert_eq!(report.passed, OPS - gets.len());
    println!("[PASS] panicking get: {} gets failed, rest passed", gets.len());
}

#[test]
fn test_skewed_fingerprint_fails_fingerprint_slots_only() {
    let (report, plan) = run_faulty(
        "skewed",
        Faults {
            skew_fingerprint: true,
            ..Faults::default()
        },
    );
    let checks = slots_where(&plan, |op| matches!(op, Operation::Fingerprint));
    assert!(!checks.is_empty());
    assert_eq!(failing_slots(&report), checks);
    for failure in report.slot_failures() {
        assert_eq!(failure.kind, FailureKind::ContractViolation);
        assert!(failure.label.starts_with("fingerprint()"), "{}", failure.label);
        assert!(failure.message.ends_with("(off by 1)"), "{}", failure.message);
    }
}

#[test]
fn test_miscounted_size_is_cross_checked_after_keyed_calls() {
    let (report, _) = run_faulty(
        "miscount",
        Faults {
            size_off_by_one: true,
            ..Faults::default()
        },
    );
    assert!(report.failures_of(FailureKind::ContractViolation) > 0);
    for failure in report.slot_failures() {
        assert_eq!(failure.kind, FailureKind::ContractViolation);
        assert!(failure.message.contains(", table size: expected <"), "{}", failure.message);
        assert!(failure.message.ends_with("(off by 1)"), "{}", failure.message);
    }
    // Echoes and the leading clear see an empty table.
    assert!(failing_slots(&report).iter().all(|&s| s > 4));
}

#[test]
fn test_denied_put_hits_fail_overwrites() {
    let (report, plan) = run_faulty(
        "deny_hits",
        Faults {
            deny_put_hits: true,
            ..Faults::default()
        },
    );
    let puts = slots_where(&plan, |op| matches!(op, Operation::Put(_)));
    let failing = failing_slots(&report);
    assert!(!failing.is_empty(), "some put must overwrite an existing key");
    assert!(failing.iter().all(|s| puts.contains(s)));
    for failure in report.slot_failures() {
        assert!(failure.label.contains(" hits when α="), "{}", failure.label);
        assert!(failure.message.contains(" to hit for key "), "{}", failure.message);
        assert!(failure.message.ends_with("expected <true> but was <false>"));
    }
}

#[test]
fn test_cursor_gap_fails_traversals_of_two_or_more_rows() {
    let (report, plan) = run_faulty(
        "gappy",
        Faults {
            drop_second_row: true,
            ..Faults::default()
        },
    );
    let traversals = slots_where(&plan, |op| matches!(op, Operation::Iterate));
    let failing = failing_slots(&report);
    assert!(!failing.is_empty());
    assert!(failing.iter().all(|s| traversals.contains(s)));
    for failure in report.slot_failures() {
        assert_eq!(failure.message, "iterator element 1: expected <a row> but was <null>");
    }
}

#[test]
fn test_panicking_cursor_is_reported_per_primitive() {
    let (report, plan) = run_faulty(
        "cursor_panic",
        Faults {
            panic_in_has_next: true,
            ..Faults::default()
        },
    );
    let traversals = slots_where(&plan, |op| matches!(op, Operation::Iterate));
    assert_eq!(failing_slots(&report), traversals);
    for failure in report.slot_failures() {
        assert_eq!(failure.kind, FailureKind::UnexpectedPanic);
        assert!(failure.message.contains("cursor has_next"), "{}", failure.message);
    }
}

#[test]
fn test_failure_histogram_matches_reports() {
    init_test_logging();
    let mut harness = Harness::new(config(SEED, 100, 200)).expect("config");
    let mut total = 0;
    for (name, faults) in [
        ("h1", Faults { panic_on_get: true, ..Faults::default() }),
        ("h2", Faults { skew_fingerprint: true, ..Faults::default() }),
    ] {
        let mut ctx = harness.begin_table_with(schema(name), Faulty::factory(faults));
        total += harness.run_slots(&mut ctx).failures.len();
    }
    let stats = harness.statistics();
    assert_eq!(usize::try_from(stats.failed()).expect("fits"), total);
    assert_eq!(stats.passed + stats.failed(), 200);
    let text = harness.finish().to_string();
    assert!(text.contains("Failures: "), "{text}");
    assert!(text.contains("unexpected_panic"), "{text}");
}
