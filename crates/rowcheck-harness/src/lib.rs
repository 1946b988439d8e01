//! Differential fuzz harness for keyed row containers.
//!
//! A subject implementing [`rowcheck_types::Table`] is driven through a
//! seeded, fixed-shape sequence of calls and checked against a
//! [`oracle::ShadowOracle`] after every one. Mutating calls run isolated
//! under a hard deadline; accessors run inline and are timed afterwards.
//! Misbehavior of any kind (wrong answers, panics, hangs) becomes a
//! [`failure::HarnessFailure`] on that unit, and the run continues.
//!
//! ```no_run
//! use rowcheck_harness::{AllowList, Harness, HarnessConfig};
//! # use rowcheck_types::Schema;
//! # fn demo<T: rowcheck_types::Table + rowcheck_types::Encapsulated>() -> rowcheck_error::Result<()> {
//! let mut harness = Harness::new(HarnessConfig::from_env()?)?.with_planned_tables(1);
//! let schema = Schema::new("m1_table01", ["a", "b", "c"], ["string", "integer", "boolean"], 0)?;
//! harness.run_table::<T>(schema, &AllowList::language_core());
//! println!("{}", harness.finish());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod failure;
pub mod fingerprint;
pub mod guard;
pub mod logging;
pub mod oracle;
pub mod replay;
pub mod rng;
pub mod runner;
pub mod scheduler;
pub mod stats;

pub use audit::AllowList;
pub use config::{HarnessConfig, OperationMix, TimeoutBudgets};
pub use failure::{FailureKind, HarnessFailure};
pub use fingerprint::FingerprintTracker;
pub use oracle::ShadowOracle;
pub use replay::{ReplayCall, ReplayHeader, ReplayLog, ReplayScript, ReplayStep};
pub use rng::RandomSource;
pub use runner::{Harness, RunContext, TableReport, UnitFailure};
pub use scheduler::{Operation, Schedule, Slot};
pub use stats::{OpCounter, RunStatistics, RunSummary};
