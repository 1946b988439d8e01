use std::fmt;

use serde::{Deserialize, Serialize};

/// Hash contributed by `true`.
pub const TRUE_HASH: i32 = 1231;
/// Hash contributed by `false`.
pub const FALSE_HASH: i32 = 1237;

/// A single field of a row.
///
/// The closed set of scalar kinds a generated row can hold. `Null` only ever
/// appears at non-key positions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Absent field.
    Null,
    /// A UTF-8 string.
    Text(String),
    /// A 32-bit signed integer.
    Integer(i32),
    /// A boolean.
    Boolean(bool),
}

impl Value {
    /// Stable scalar hash used by every fingerprint computation.
    ///
    /// Text hashes as the 31-multiplier polynomial over its UTF-16 code
    /// units, integers hash to themselves, booleans to 1231/1237, and null
    /// contributes nothing. All arithmetic wraps.
    #[must_use]
    pub fn stable_hash(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Text(s) => text_hash(s),
            Self::Integer(i) => *i,
            Self::Boolean(true) => TRUE_HASH,
            Self::Boolean(false) => FALSE_HASH,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The column type this value inhabits, or `None` for null.
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(ColumnType::String),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Boolean(_) => Some(ColumnType::Boolean),
        }
    }
}

fn text_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0_i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Declared type of a column.
///
/// Serialized as its lowercase name; any name outside the known three is
/// kept verbatim in `Other` so schemas echo back exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    String,
    Integer,
    Boolean,
    Other(String),
}

impl ColumnType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Other(name) => name,
        }
    }

    /// Whether generated values of this type can serve as a primary key.
    #[must_use]
    pub const fn is_keyable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_hash_matches_polynomial() {
        assert_eq!(Value::from("").stable_hash(), 0);
        assert_eq!(Value::from("a").stable_hash(), 97);
        // 'k' * 31 + '1'
        assert_eq!(Value::from("k1").stable_hash(), 107 * 31 + 49);
        assert_eq!(Value::from("hello").stable_hash(), 99_162_322);
    }

    #[test]
    fn test_text_hash_wraps() {
        let long = "z".repeat(64);
        // Must not panic on overflow in debug builds.
        let _ = Value::Text(long).stable_hash();
    }

    #[test]
    fn test_scalar_hashes() {
        assert_eq!(Value::Integer(5).stable_hash(), 5);
        assert_eq!(Value::Integer(-9).stable_hash(), -9);
        assert_eq!(Value::Boolean(true).stable_hash(), TRUE_HASH);
        assert_eq!(Value::Boolean(false).stable_hash(), FALSE_HASH);
        assert_eq!(Value::Null.stable_hash(), 0);
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(Value::from("k1").to_string(), "\"k1\"");
        assert_eq!(Value::Integer(5).to_string(), "5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_column_type_round_trip_names() {
        for name in ["string", "integer", "boolean", "decimal"] {
            let ty = ColumnType::from(name);
            assert_eq!(ty.as_str(), name);
            assert_eq!(String::from(ty), name);
        }
        assert!(!ColumnType::from("decimal").is_keyable());
        assert!(ColumnType::Integer.is_keyable());
    }

    #[test]
    fn test_column_type_serde_as_string() {
        let json = serde_json::to_string(&vec![ColumnType::String, ColumnType::from("blob")])
            .expect("serialize");
        assert_eq!(json, r#"["string","blob"]"#);
        let back: Vec<ColumnType> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, vec![ColumnType::String, ColumnType::Other("blob".to_owned())]);
    }

    #[test]
    fn test_value_column_type() {
        assert_eq!(Value::from(3).column_type(), Some(ColumnType::Integer));
        assert_eq!(Value::Null.column_type(), None);
        assert_eq!(Value::from(None::<bool>), Value::Null);
    }
}
