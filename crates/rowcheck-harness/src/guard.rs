//! Timeout-guarded invocation of subject calls.
//!
//! Two disciplines:
//!
//! - [`bounded`] runs the call on a fresh isolation thread and races it
//!   against `recv_timeout`. On timeout the thread is abandoned, not killed:
//!   it keeps running (and keeps the subject locked) until it returns on its
//!   own, and whatever it eventually produces is discarded.
//! - [`measured`] runs the call on the caller's thread and compares elapsed
//!   time against the budget only after the call returns. A call that never
//!   returns stalls the run. Accessors are expected to be trivial, so a long
//!   inline stall is itself the diagnosis.
//!
//! Both convert panics into [`HarnessFailure::Panicked`]. A subject still
//! held by an abandoned call surfaces as [`HarnessFailure::SubjectBusy`]
//! instead of blocking.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::failure::{HarnessFailure, panic_message};

/// A subject shared between the harness and its isolation threads.
pub type SharedSubject<T> = Arc<Mutex<T>>;

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Run `call` on an isolation thread with a hard wall-clock budget.
///
/// The call may itself report a failure; that failure is returned as-is.
pub fn run_isolated<R, F>(operation: &str, budget: Duration, call: F) -> Result<R, HarnessFailure>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, HarnessFailure> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let thread_operation = operation.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("rowcheck-{operation}"))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
                Err(HarnessFailure::Panicked {
                    operation: thread_operation,
                    message: panic_message(payload.as_ref()),
                })
            });
            // The receiver is gone if the call was abandoned.
            let _ = tx.send(outcome);
        });
    if let Err(err) = spawned {
        return Err(HarnessFailure::Isolation {
            operation: operation.to_owned(),
            detail: err.to_string(),
        });
    }

    let started = Instant::now();
    match rx.recv_timeout(budget) {
        Ok(outcome) => {
            trace!(
                operation,
                elapsed_ms = millis(started.elapsed()),
                "isolated call returned"
            );
            outcome
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                operation,
                budget_ms = millis(budget),
                "abandoning isolated call past its budget"
            );
            Err(HarnessFailure::timeout(operation, budget))
        }
        Err(RecvTimeoutError::Disconnected) => Err(HarnessFailure::Isolation {
            operation: operation.to_owned(),
            detail: "isolation thread exited without reporting".to_owned(),
        }),
    }
}

/// Bounded/isolated discipline for a call against a shared subject.
///
/// The isolation thread waits at most `budget` for the subject lock before
/// giving up with [`HarnessFailure::SubjectBusy`].
pub fn bounded<T, R, F>(
    subject: &SharedSubject<T>,
    operation: &str,
    budget: Duration,
    call: F,
) -> Result<R, HarnessFailure>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> Result<R, HarnessFailure> + Send + 'static,
{
    let shared = Arc::clone(subject);
    let busy_operation = operation.to_owned();
    run_isolated(operation, budget, move || match shared.try_lock_for(budget) {
        Some(mut guard) => call(&mut *guard),
        None => Err(HarnessFailure::SubjectBusy {
            operation: busy_operation,
            budget,
        }),
    })
}

/// Measured/inline discipline: run now, check the clock afterwards.
pub fn measured<T, R, F>(
    subject: &Mutex<T>,
    operation: &str,
    budget: Duration,
    call: F,
) -> Result<R, HarnessFailure>
where
    F: FnOnce(&T) -> R,
{
    let Some(guard) = subject.try_lock_for(budget) else {
        return Err(HarnessFailure::SubjectBusy {
            operation: operation.to_owned(),
            budget,
        });
    };
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(&*guard)));
    let elapsed = started.elapsed();
    drop(guard);

    let value = outcome.map_err(|payload| HarnessFailure::Panicked {
        operation: operation.to_owned(),
        message: panic_message(payload.as_ref()),
    })?;
    if elapsed > budget {
        warn!(
            operation,
            budget_ms = millis(budget),
            elapsed_ms = millis(elapsed),
            "inline call overran its budget"
        );
        return Err(HarnessFailure::timeout(operation, budget));
    }
    Ok(value)
}
