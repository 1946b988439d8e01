//! Shared data model for rowcheck: values, schemas, rows, and the capability
//! traits a container implements to be tested.

pub mod retained;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use retained::{Encapsulated, Retained, TypeIdentity};
pub use row::{Row, hash_sum};
pub use schema::Schema;
pub use table::{IterCursor, RowCursor, Table};
pub use value::{ColumnType, Value};
