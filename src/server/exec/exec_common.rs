use chrono::NaiveDateTime;

use crate::server::schema::ColumnType;

/// A single field of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    /// `timestamp` (without time zone); store instants are rendered in UTC.
    Timestamp(NaiveDateTime),
    Double(f64),
    Int4(i32),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub column_type: ColumnType,
}

impl ResultColumn {
    pub fn new<S: Into<String>>(name: S, column_type: ColumnType) -> Self {
        Self { name: name.into(), column_type }
    }
}

/// Column metadata plus rows, in emission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize { self.rows.len() }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultSet),
    /// Utility statement; the payload is the CommandComplete tag.
    Command(&'static str),
    Empty,
}
