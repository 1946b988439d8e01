//! Hangs and stalls become failures; the run always continues.
//!
//!   1. A mutator that never returns is abandoned at its budget
//!   2. A slow accessor is flagged after it returns
//!   3. A constructor that never returns fails every dependent slot
//!   4. Full-scan calls get the wider budget

mod common;

use std::time::{Duration, Instant};

use common::{Faults, Faulty, HashArrayTable, allow_list, config, schema};
use rowcheck_harness::logging::init_test_logging;
use rowcheck_harness::{FailureKind, Harness, HarnessFailure, Operation, Slot};
use rowcheck_types::Schema;

// ---------------------------------------------------------------------------
// Test 1: Hung mutator
// ---------------------------------------------------------------------------

#[test]
fn test_hung_put_is_abandoned_and_run_continues() {
    init_test_logging();
    let ops = 30;
    let mut harness = Harness::new(config(12345, ops, 20)).expect("config");
    let started = Instant::now();
    let mut ctx = harness.begin_table_with(
        schema("hang_table"),
        Faulty::factory(Faults {
            hang_on_put: true,
            ..Faults::default()
        }),
    );
    let report = harness.run_slots(&mut ctx);
    let elapsed = started.elapsed();

    assert_eq!(report.slots, ops, "every slot still runs");
    assert!(elapsed < Duration::from_secs(30), "run stalled for {elapsed:?}");

    // Schema echoes and the leading clear run before any put.
    for failure in report.slot_failures() {
        assert!(failure.slot >= Some(5), "{failure:?}");
        assert_eq!(failure.kind, FailureKind::Timeout, "{failure:?}");
    }
    let first = report.slot_failures().next().expect("at least one put is scheduled");
    assert!(first.label.starts_with("put("), "{first:?}");
    assert!(
        first.message.contains("infinite loop/recursion likely"),
        "{}",
        first.message
    );
    assert!(report.passed >= 5);
    println!("[PASS] hung put abandoned after {elapsed:?}");
}

// ---------------------------------------------------------------------------
// Test 2: Slow accessor
// ---------------------------------------------------------------------------

#[test]
fn test_slow_accessor_fails_after_returning() {
    init_test_logging();
    let mut harness = Harness::new(config(12345, 40, 20)).expect("config");
    let mut ctx = harness.begin_table_with(
        schema("slow_name"),
        Faulty::factory(Faults {
            slow_table_name: Some(Duration::from_millis(80)),
            ..Faults::default()
        }),
    );
    let report = harness.run_slots(&mut ctx);

    let failures: Vec<_> = report.slot_failures().collect();
    assert_eq!(failures.len(), 1, "{failures:#?}");
    assert_eq!(failures[0].slot, Some(0));
    assert_eq!(failures[0].kind, FailureKind::Timeout);
    assert!(failures[0].message.contains("table_name"), "{}", failures[0].message);
    assert_eq!(report.passed, 39);
}

// ---------------------------------------------------------------------------
// Test 3: Hung constructor
// ---------------------------------------------------------------------------

#[test]
fn test_hung_constructor_fails_every_slot() {
    init_test_logging();
    let ops = 12;
    // Construction budget is 100x the base: one second here.
    let mut harness = Harness::new(config(7, ops, 10)).expect("config");
    let started = Instant::now();
    let mut ctx = harness.begin_table_with(schema("never_built"), |_: &Schema| -> HashArrayTable {
        loop {
            std::thread::sleep(Duration::from_millis(5));
        }
    });
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(matches!(
        ctx.construction_failure(),
        Some(HarnessFailure::Timeout { operation, .. }) if operation == "construct"
    ));

    let report = harness.run_slots(&mut ctx);
    assert_eq!(report.passed, 0);
    assert_eq!(report.failures_of(FailureKind::Prerequisite), ops);
    assert_eq!(report.failures[0].label, "construct");
    assert_eq!(report.failures[0].slot, None);

    let summary = harness.finish();
    assert_eq!(summary.pass_percentage, Some(0));
    assert_eq!(summary.failures[&FailureKind::Timeout], 1);
    assert_eq!(summary.failures[&FailureKind::Prerequisite], 12);

    // A later table in the same run is unaffected.
    let next = harness.run_table::<HashArrayTable>(schema("built_fine"), &allow_list());
    assert!(next.failures.is_empty(), "{:#?}", next.failures);
}

// ---------------------------------------------------------------------------
// Test 4: Full-scan budget
// ---------------------------------------------------------------------------

#[test]
fn test_slow_fingerprint_fits_full_scan_budget() {
    init_test_logging();
    // Single-call budget 20ms, full-scan budget 200ms.
    let mut harness = Harness::new(config(12345, 20, 20)).expect("config");
    let mut ctx = harness.begin_table_with(
        schema("slow_scan"),
        Faulty::factory(Faults {
            slow_fingerprint: Some(Duration::from_millis(60)),
            ..Faults::default()
        }),
    );
    harness
        .run_unit(&mut ctx, &Slot { index: 10, op: Operation::Fingerprint })
        .expect("60ms is within the full-scan budget");
    harness
        .run_unit(&mut ctx, &Slot { index: 0, op: Operation::TableName })
        .expect("accessors are unaffected");
    println!("[PASS] full-scan call outlives the single-call budget");
}
