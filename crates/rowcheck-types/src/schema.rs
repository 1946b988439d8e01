use serde::{Deserialize, Serialize};

use rowcheck_error::{Result, RowcheckError};

use crate::value::ColumnType;

/// Table schema: name, parallel column names and types, and the primary key
/// position. Fixed for the lifetime of the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    column_names: Vec<String>,
    column_types: Vec<ColumnType>,
    primary_index: usize,
}

impl Schema {
    /// Build a validated schema.
    ///
    /// Rejects empty names, mismatched arity, an out-of-range primary index,
    /// and a primary column whose type cannot produce non-null keys.
    pub fn new<N, T>(
        name: impl Into<String>,
        column_names: impl IntoIterator<Item = N>,
        column_types: impl IntoIterator<Item = T>,
        primary_index: usize,
    ) -> Result<Self>
    where
        N: Into<String>,
        T: Into<ColumnType>,
    {
        let name = name.into();
        let column_names: Vec<String> = column_names.into_iter().map(Into::into).collect();
        let column_types: Vec<ColumnType> = column_types.into_iter().map(Into::into).collect();

        if name.trim().is_empty() {
            return Err(RowcheckError::InvalidSchema {
                detail: "table name must be non-empty".to_owned(),
            });
        }
        if column_names.len() != column_types.len() {
            return Err(RowcheckError::SchemaArity {
                names: column_names.len(),
                types: column_types.len(),
            });
        }
        if primary_index >= column_names.len() {
            return Err(RowcheckError::PrimaryIndexOutOfRange {
                index: primary_index,
                arity: column_names.len(),
            });
        }
        let key_type = &column_types[primary_index];
        if !key_type.is_keyable() {
            return Err(RowcheckError::InvalidSchema {
                detail: format!("primary column type {key_type} cannot hold a non-null key"),
            });
        }

        Ok(Self {
            name,
            column_names,
            column_types,
            primary_index,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    #[must_use]
    pub const fn primary_index(&self) -> usize {
        self.primary_index
    }

    #[must_use]
    pub fn key_type(&self) -> &ColumnType {
        &self.column_types[self.primary_index]
    }

    /// Short signature such as `[s*, i, b]`, starring the key column.
    #[must_use]
    pub fn signature(&self) -> String {
        let parts: Vec<String> = self
            .column_types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                let abbrev: String = ty.as_str().chars().take(1).collect();
                if i == self.primary_index {
                    format!("{abbrev}*")
                } else {
                    abbrev
                }
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}
