//! The columnar type vocabulary the schema accumulator infers.

use std::fmt;

/// An inferred column type. `List` is recursive: its element type is
/// inferred from the first non-null element observed in an array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Float,
    List(Box<ColumnType>),
}

impl fmt::Display for ColumnType {
    /// The human-facing type string returned by `column_types()`:
    /// `string`, `float`, or `list(T)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::List(inner) => write!(f, "list({inner})"),
        }
    }
}
