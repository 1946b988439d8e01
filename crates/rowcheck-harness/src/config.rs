//! Harness configuration with `ROWCHECK_*` environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use rowcheck_error::{Result, RowcheckError};
use serde::{Deserialize, Serialize};

pub const ENV_SUITE: &str = "ROWCHECK_SUITE";
pub const ENV_SEED: &str = "ROWCHECK_SEED";
pub const ENV_TIMEOUT_MS: &str = "ROWCHECK_TIMEOUT_MS";
pub const ENV_OPS_PER_TABLE: &str = "ROWCHECK_OPS_PER_TABLE";
pub const ENV_LOG_DIR: &str = "ROWCHECK_LOG_DIR";

/// Default base budget for a single subject call.
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// Default number of slots per table sequence.
pub const DEFAULT_OPS_PER_TABLE: usize = 2500;

/// Slots 0..=4 plus the trailing clear.
pub const MIN_OPS_PER_TABLE: usize = 6;

/// Weighted choice between put, remove, and get for random slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMix {
    pub put_weight: u32,
    pub remove_weight: u32,
    pub get_weight: u32,
}

impl OperationMix {
    #[must_use]
    pub fn total_weight(self) -> u32 {
        self.put_weight
            .saturating_add(self.remove_weight)
            .saturating_add(self.get_weight)
    }

    /// Cumulative cut points in `[0, 1]`: `p < put_cut` is a put,
    /// `p < remove_cut` a remove, anything else a get.
    #[must_use]
    pub fn cut_points(self) -> (f64, f64) {
        let total = f64::from(self.total_weight().max(1));
        let put_cut = f64::from(self.put_weight) / total;
        let remove_cut = f64::from(self.put_weight.saturating_add(self.remove_weight)) / total;
        (put_cut, remove_cut)
    }
}

impl Default for OperationMix {
    fn default() -> Self {
        Self {
            put_weight: 70,
            remove_weight: 20,
            get_weight: 10,
        }
    }
}

/// Per-call time budgets derived from one base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudgets {
    base: Duration,
}

impl TimeoutBudgets {
    #[must_use]
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Accessors and single-row mutators.
    #[must_use]
    pub const fn single(self) -> Duration {
        self.base
    }

    /// Calls expected to touch every row: clear, traversal, fingerprint.
    #[must_use]
    pub fn full_scan(self) -> Duration {
        self.base.saturating_mul(10)
    }

    /// The constructor.
    #[must_use]
    pub fn construction(self) -> Duration {
        self.base.saturating_mul(100)
    }
}

/// Top-level knobs for a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Tag printed in the final report line.
    pub suite: String,
    /// Base seed; `None` draws one and reports it.
    pub seed: Option<u64>,
    /// Base time budget in milliseconds.
    pub timeout_ms: u64,
    /// Slots per table sequence.
    pub ops_per_table: usize,
    /// Directory for per-table replay logs. Disabled when `None`.
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub mix: OperationMix,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            suite: "rowcheck".to_owned(),
            seed: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            ops_per_table: DEFAULT_OPS_PER_TABLE,
            log_dir: None,
            mix: OperationMix::default(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by any `ROWCHECK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(suite) = lookup(ENV_SUITE) {
            config.suite = suite;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            config.seed = Some(parse_number(ENV_SEED, &raw)?);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OPS_PER_TABLE) {
            config.ops_per_table = parse_number(ENV_OPS_PER_TABLE, &raw)?;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|d| !d.trim().is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ops_per_table < MIN_OPS_PER_TABLE {
            return Err(RowcheckError::config(
                "ops_per_table",
                format!(
                    "{} is below the minimum of {MIN_OPS_PER_TABLE}",
                    self.ops_per_table
                ),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(RowcheckError::config("timeout_ms", "must be positive"));
        }
        if self.mix.total_weight() == 0 {
            return Err(RowcheckError::config("mix", "at least one weight must be non-zero"));
        }
        if self.suite.trim().is_empty() {
            return Err(RowcheckError::config("suite", "must be non-empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn budgets(&self) -> TimeoutBudgets {
        TimeoutBudgets::new(Duration::from_millis(self.timeout_ms))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| RowcheckError::config(key, format!("cannot parse {raw:?}: {err}")))
}
