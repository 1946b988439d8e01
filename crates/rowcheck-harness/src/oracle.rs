//! Trusted in-memory reference for the subject.

use std::collections::HashMap;

use rowcheck_types::{Row, Value, hash_sum};

/// Key-to-row map that predicts every subject answer.
///
/// Updated before the matching subject call, so it always reflects what the
/// harness issued regardless of what the subject did with it.
#[derive(Debug, Clone)]
pub struct ShadowOracle {
    primary_index: usize,
    rows: HashMap<Value, Row>,
}

impl ShadowOracle {
    #[must_use]
    pub fn new(primary_index: usize) -> Self {
        Self {
            primary_index,
            rows: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Insert or overwrite `row` under its key. Returns the row it replaced;
    /// `Some` means the put is a hit.
    ///
    /// A row without a usable key is ignored and reported as a miss; the
    /// generator never produces one.
    pub fn put(&mut self, row: Row) -> Option<Row> {
        let key = row.key(self.primary_index)?.clone();
        self.rows.insert(key, row)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Row> {
        self.rows.remove(key)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.rows.contains_key(key)
    }

    /// Additive hash over every stored row, computed from scratch.
    #[must_use]
    pub fn hash_sum(&self) -> i32 {
        self.rows
            .values()
            .fold(0_i32, |acc, row| acc.wrapping_add(hash_sum(row)))
    }
}
