use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An ordered sequence of values whose length equals the schema arity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Value>);

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// The key at `primary_index`, if present and non-null.
    #[must_use]
    pub fn key(&self, primary_index: usize) -> Option<&Value> {
        self.0.get(primary_index).filter(|v| !v.is_null())
    }

    /// Additive hash over every field.
    #[must_use]
    pub fn hash_sum(&self) -> i32 {
        hash_sum(&self.0)
    }
}

/// Wrapping sum of [`Value::stable_hash`] over `values`.
///
/// Nested sequences are summed by calling this per row and adding the
/// results, which is the same as hashing the flattened sequence.
#[must_use]
pub fn hash_sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> i32 {
    values
        .into_iter()
        .fold(0_i32, |acc, v| acc.wrapping_add(v.stable_hash()))
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

/// Build a [`Row`] from heterogeneous literals.
///
/// ```
/// use rowcheck_types::{row, Value};
/// let r = row!["k1", 5, true];
/// assert_eq!(r[1], Value::Integer(5));
/// ```
#[macro_export]
macro_rules! row {
    ($($v:expr),* $(,)?) => {
        $crate::Row::new(vec![$($crate::Value::from($v)),*])
    };
}
