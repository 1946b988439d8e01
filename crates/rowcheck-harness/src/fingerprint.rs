//! Incremental additive checksum over the rows believed present.

use rowcheck_types::Row;

/// Running hash-sum kept in lockstep with the shadow oracle.
///
/// An overwrite must be applied as `remove(old)` then `add(new)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerprintTracker {
    value: i32,
}

impl FingerprintTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    pub fn add(&mut self, row: &Row) {
        self.value = self.value.wrapping_add(row.hash_sum());
    }

    pub fn remove(&mut self, row: &Row) {
        self.value = self.value.wrapping_sub(row.hash_sum());
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }
}
