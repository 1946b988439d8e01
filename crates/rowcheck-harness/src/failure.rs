//! Harness-level failures: subject misbehavior as values.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single test unit did not pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessFailure {
    /// The call exceeded its budget.
    #[error("timeout in {operation} after {} ms (infinite loop/recursion likely)", budget.as_millis())]
    Timeout {
        operation: String,
        budget: Duration,
    },

    /// An earlier abandoned call still holds the subject.
    #[error(
        "subject still busy with an abandoned call; {operation} could not start within {} ms",
        budget.as_millis()
    )]
    SubjectBusy {
        operation: String,
        budget: Duration,
    },

    /// The subject's answer disagrees with the oracle.
    #[error("{check}: expected <{expected}> but was <{actual}>{}", fmt_delta(*delta))]
    ContractViolation {
        check: String,
        expected: String,
        actual: String,
        delta: Option<i64>,
    },

    /// The subject panicked where no panic is allowed.
    #[error("unexpected panic in {operation}: {message}")]
    Panicked { operation: String, message: String },

    /// The isolation thread could not run the call.
    #[error("could not isolate {operation}: {detail}")]
    Isolation { operation: String, detail: String },

    /// A dependent check ran without a usable subject.
    #[error("{check} depends on unmet prerequisite: {missing}")]
    Prerequisite { check: String, missing: String },

    /// The subject retains disallowed types.
    #[error("unexpected forbidden types <{}>", violations.join(", "))]
    Encapsulation { violations: Vec<String> },
}

fn fmt_delta(delta: Option<i64>) -> String {
    delta.map_or_else(String::new, |d| format!(" (off by {d})"))
}

impl HarnessFailure {
    pub fn timeout(operation: impl Into<String>, budget: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            budget,
        }
    }

    pub fn mismatch(
        check: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::ContractViolation {
            check: check.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            delta: None,
        }
    }

    /// A numeric mismatch that also reports `actual - expected`.
    pub fn off_by(check: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::ContractViolation {
            check: check.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            delta: Some(actual.wrapping_sub(expected)),
        }
    }

    pub fn prerequisite(check: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::Prerequisite {
            check: check.into(),
            missing: missing.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } | Self::SubjectBusy { .. } => FailureKind::Timeout,
            Self::ContractViolation { .. } => FailureKind::ContractViolation,
            Self::Panicked { .. } | Self::Isolation { .. } => FailureKind::UnexpectedPanic,
            Self::Prerequisite { .. } => FailureKind::Prerequisite,
            Self::Encapsulation { .. } => FailureKind::Encapsulation,
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind(), FailureKind::Timeout)
    }
}

/// Coarse failure classes for aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ContractViolation,
    UnexpectedPanic,
    Prerequisite,
    Encapsulation,
}

impl FailureKind {
    pub const ALL: &[Self] = &[
        Self::Timeout,
        Self::ContractViolation,
        Self::UnexpectedPanic,
        Self::Prerequisite,
        Self::Encapsulation,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ContractViolation => "contract_violation",
            Self::UnexpectedPanic => "unexpected_panic",
            Self::Prerequisite => "prerequisite",
            Self::Encapsulation => "encapsulation",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
