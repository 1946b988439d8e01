//! Deterministic slot assignment for one table sequence.
//!
//! Layout for `N` slots:
//!
//! | Slot | Operation |
//! |---|---|
//! | 0..=3 | table name, column names, column types, primary index |
//! | 4, N-1 | clear |
//! | other multiples of 5 | traversal or fingerprint, by a fresh coin flip |
//! | everything else | put / remove / get by [`OperationMix`] |
//!
//! Values are drawn lazily, slot by slot, from the table's
//! [`RandomSource`]. The sequence is a pure function of the seed.

use std::fmt;

use rowcheck_types::{ColumnType, Row, Schema, Value};
use serde::{Deserialize, Serialize};

use crate::config::OperationMix;
use crate::rng::RandomSource;

/// First slot after the fixed schema checks; also the leading clear.
pub const LEADING_CLEAR_SLOT: usize = 4;

/// Period of the structural checks.
pub const STRUCTURAL_PERIOD: usize = 5;

/// What one slot does to the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TableName,
    ColumnNames,
    ColumnTypes,
    PrimaryIndex,
    Clear,
    Iterate,
    Fingerprint,
    Put(Row),
    Remove(Value),
    Get(Value),
}

impl Operation {
    /// Short name used for timeouts and log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TableName => "table_name",
            Self::ColumnNames => "column_names",
            Self::ColumnTypes => "column_types",
            Self::PrimaryIndex => "primary_index",
            Self::Clear => "clear",
            Self::Iterate => "iterate",
            Self::Fingerprint => "fingerprint",
            Self::Put(_) => "put",
            Self::Remove(_) => "remove",
            Self::Get(_) => "get",
        }
    }

    /// Calls that are expected to visit every row.
    #[must_use]
    pub const fn is_full_scan(&self) -> bool {
        matches!(self, Self::Clear | Self::Iterate | Self::Fingerprint)
    }

    /// The key a keyed operation targets.
    #[must_use]
    pub fn key(&self, primary_index: usize) -> Option<&Value> {
        match self {
            Self::Put(row) => row.key(primary_index),
            Self::Remove(key) | Self::Get(key) => Some(key),
            _ => None,
        }
    }
}

/// Renders the call as it would be written against the subject.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put(row) => write!(f, "put({row})"),
            Self::Remove(key) => write!(f, "remove({key})"),
            Self::Get(key) => write!(f, "get({key})"),
            other => write!(f, "{}()", other.name()),
        }
    }
}

/// One scheduled test unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub op: Operation,
}

/// Lazily yields the slots of one table sequence.
#[derive(Debug, Clone)]
pub struct Schedule {
    len: usize,
    next: usize,
    column_types: Vec<ColumnType>,
    primary_index: usize,
    key_type: ColumnType,
    put_cut: f64,
    remove_cut: f64,
}

impl Schedule {
    #[must_use]
    pub fn new(schema: &Schema, mix: OperationMix, len: usize) -> Self {
        let (put_cut, remove_cut) = mix.cut_points();
        Self {
            len,
            next: 0,
            column_types: schema.column_types().to_vec(),
            primary_index: schema.primary_index(),
            key_type: schema.key_type().clone(),
            put_cut,
            remove_cut,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The next slot, drawing any random values it needs from `rng`.
    pub fn next_slot(&mut self, rng: &mut RandomSource) -> Option<Slot> {
        if self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let op = self.assign(index, rng);
        Some(Slot { index, op })
    }

    /// Every remaining slot, eagerly.
    pub fn collect_all(mut self, rng: &mut RandomSource) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(self.len.saturating_sub(self.next));
        while let Some(slot) = self.next_slot(rng) {
            slots.push(slot);
        }
        slots
    }

    fn assign(&self, index: usize, rng: &mut RandomSource) -> Operation {
        match index {
            0 => Operation::TableName,
            1 => Operation::ColumnNames,
            2 => Operation::ColumnTypes,
            3 => Operation::PrimaryIndex,
            LEADING_CLEAR_SLOT => Operation::Clear,
            i if i + 1 == self.len => Operation::Clear,
            i if i % STRUCTURAL_PERIOD == 0 => {
                if rng.boolean() {
                    Operation::Iterate
                } else {
                    Operation::Fingerprint
                }
            }
            _ => self.keyed(rng),
        }
    }

    fn keyed(&self, rng: &mut RandomSource) -> Operation {
        let p = rng.unit();
        if p < self.put_cut {
            Operation::Put(rng.row(&self.column_types, self.primary_index))
        } else if p < self.remove_cut {
            Operation::Remove(rng.value(&self.key_type))
        } else {
            Operation::Get(rng.value(&self.key_type))
        }
    }
}
