//! Capability contract a container must expose to be tested.

use std::iter::Peekable;

use crate::row::Row;
use crate::schema::Schema;
use crate::value::{ColumnType, Value};

/// A keyed row container under test.
///
/// Implementations are untrusted: the harness calls every method through a
/// timeout guard and treats panics, wrong answers, and hangs as reportable
/// failures. `Send + 'static` is required because mutating calls run on an
/// isolation thread.
pub trait Table: Send + 'static {
    /// Construct an empty table for `schema`.
    fn create(schema: &Schema) -> Self
    where
        Self: Sized;

    fn table_name(&self) -> String;

    fn column_names(&self) -> Vec<String>;

    fn column_types(&self) -> Vec<ColumnType>;

    fn primary_index(&self) -> usize;

    /// Number of live rows.
    fn size(&self) -> usize;

    /// Number of slots currently allocated. Diagnostic only.
    fn capacity(&self) -> usize;

    /// `size / capacity`. Diagnostic only.
    #[allow(clippy::cast_precision_loss)]
    fn load_factor(&self) -> f64 {
        let capacity = self.capacity();
        if capacity == 0 {
            0.0
        } else {
            self.size() as f64 / capacity as f64
        }
    }

    /// Insert or overwrite by key. Returns `true` iff the key already existed.
    fn put(&mut self, row: Row) -> bool;

    /// Returns `true` iff the key existed and was removed.
    fn remove(&mut self, key: &Value) -> bool;

    /// The row stored under `key`, or `None`.
    fn get(&self, key: &Value) -> Option<Row>;

    fn clear(&mut self);

    /// Cursor over every live row, in any order.
    fn cursor(&self) -> Box<dyn RowCursor + '_>;

    /// Additive hash over all live rows; see [`crate::hash_sum`].
    fn fingerprint(&self) -> i32;
}

/// Two-primitive traversal: "is there more" and "produce next".
///
/// Kept separate so the harness can check each primitive on its own: a
/// cursor must not claim exhaustion early, must not panic in either call,
/// and must never hand out a missing row mid-traversal.
pub trait RowCursor {
    fn has_next(&mut self) -> bool;

    /// The next row, or `None` if the cursor has nothing to give.
    fn next_row(&mut self) -> Option<Row>;
}

/// Adapts any row iterator to [`RowCursor`].
pub struct IterCursor<I: Iterator<Item = Row>> {
    inner: Peekable<I>,
}

impl<I: Iterator<Item = Row>> IterCursor<I> {
    pub fn new(iter: I) -> Self {
        Self {
            inner: iter.peekable(),
        }
    }
}

impl<I: Iterator<Item = Row>> RowCursor for IterCursor<I> {
    fn has_next(&mut self) -> bool {
        self.inner.peek().is_some()
    }

    fn next_row(&mut self) -> Option<Row> {
        self.inner.next()
    }
}
